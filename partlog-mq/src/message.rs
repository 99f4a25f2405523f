use bytes::{BufMut, Bytes, BytesMut};
use partlog_core::{common::error::Error, data::Record};

/// length(4) + offset(8)
pub const MESSAGE_PREFIX_LEN: usize = 12;

/// A record as it is laid out in a partition log:
///
/// message = length(4) + offset(8) + payload(length)
///
/// Integers are native-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub offset: i64,
    pub payload: Bytes,
}

impl Message {
    pub fn new(offset: i64, payload: Bytes) -> Self {
        Self { offset, payload }
    }

    /// Size of the whole frame on disk
    pub fn len(&self) -> usize {
        MESSAGE_PREFIX_LEN + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<Message> for Bytes {
    fn from(message: Message) -> Self {
        let mut buf = BytesMut::with_capacity(message.len());
        buf.put_i32_ne(message.payload.len() as i32);
        buf.put_i64_ne(message.offset);
        buf.extend(message.payload);

        buf.into()
    }
}

impl From<Message> for Record {
    fn from(message: Message) -> Self {
        Record::new(message.offset, message.payload)
    }
}

/// The fixed-size prefix of a message frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub length: i32,
    pub offset: i64,
}

impl MessageHeader {
    pub fn payload_len(&self) -> usize {
        self.length.max(0) as usize
    }

    pub fn frame_len(&self) -> u64 {
        (MESSAGE_PREFIX_LEN + self.payload_len()) as u64
    }
}

impl TryFrom<&[u8]> for MessageHeader {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < MESSAGE_PREFIX_LEN {
            Err(Error::new_decode(&format!(
                "Data is too short to decode message header: {}",
                data.len()
            )))?;
        }

        let length = i32::from_ne_bytes(data[0..4].try_into().expect("data[0..4] is not satisfy"));
        let offset = i64::from_ne_bytes(data[4..12].try_into().expect("data[4..12] is not satisfy"));

        if length < 0 {
            Err(Error::new_decode(&format!("Negative message length: {}", length)))?;
        }

        Ok(MessageHeader { length, offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let message = Message::new(7, Bytes::from_static(b"hello"));
        let msg_len = message.len();
        let data: Bytes = message.into();

        assert_eq!(msg_len, data.len());
        assert_eq!(5, i32::from_ne_bytes(data[0..4].try_into().unwrap()));
        assert_eq!(b"hello", &data[12..]);

        let header = MessageHeader::try_from(&data[..]).unwrap();
        assert_eq!(7, header.offset);
        assert_eq!(5, header.payload_len());
        assert_eq!(msg_len as u64, header.frame_len());
    }

    #[test]
    fn test_bad_header() {
        assert!(MessageHeader::try_from(&[0u8; 5][..]).is_err());

        let mut data = vec![];
        data.extend((-3i32).to_ne_bytes());
        data.extend(0i64.to_ne_bytes());
        assert!(MessageHeader::try_from(&data[..]).is_err());
    }
}
