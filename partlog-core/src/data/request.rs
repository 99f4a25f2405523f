use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tokio::io::AsyncRead;

use crate::{
    common::error::Error,
    net::tcp::{read, read_i32, read_i64},
};

pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Width of the NUL-padded `group_id` and `consumer_id` fields
pub const ID_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum MessageType {
    Produce = 1,
    Fetch = 2,
    JoinGroup = 3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceRequest {
    pub key: i32,
    pub payload: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGroupRequest {
    pub group_id: String,
    pub consumer_id: String,
}

/// Request = total_length(4) + type(4) + body
///
/// PRODUCE    body = key(4) + payload_len(4) + payload
/// FETCH      body = partition(4) + offset(8)
/// JOIN_GROUP body = group_id(32) + consumer_id(32)
///
/// Integers are native-endian. `total_length` counts everything after itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Produce(ProduceRequest),
    Fetch(FetchRequest),
    JoinGroup(JoinGroupRequest),
}

impl Request {
    pub fn message_type(&self) -> MessageType {
        match self {
            Request::Produce(_) => MessageType::Produce,
            Request::Fetch(_) => MessageType::Fetch,
            Request::JoinGroup(_) => MessageType::JoinGroup,
        }
    }

    /// Reads exactly one request from the stream.
    ///
    /// A PRODUCE payload length outside `1..=max_payload_size` is rejected
    /// before any payload byte is read.
    pub async fn read_from<S>(
        stream: &mut S,
        max_payload_size: usize,
        duration: Duration,
    ) -> Result<Request, Error>
    where
        S: AsyncRead + Unpin,
    {
        // presence only, the value is not checked
        let _total_length = read_i32(stream, duration).await?;

        let message_type = read_i32(stream, duration).await?;
        let message_type = MessageType::try_from(message_type).map_err(|_| {
            Error::new_frame(None, Some(format!("Unknown message type: {}", message_type)))
        })?;

        match message_type {
            MessageType::Produce => {
                let key = read_i32(stream, duration).await?;
                let payload_len = read_i32(stream, duration).await?;

                if payload_len <= 0 || payload_len as usize > max_payload_size {
                    Err(Error::new_validation(&format!(
                        "Invalid payload length: {}",
                        payload_len
                    )))?
                }

                let mut payload = vec![0; payload_len as usize];
                read(stream, &mut payload, duration).await?;

                Ok(Request::Produce(ProduceRequest {
                    key,
                    payload: payload.into(),
                }))
            }
            MessageType::Fetch => {
                let partition = read_i32(stream, duration).await?;
                let offset = read_i64(stream, duration).await?;

                Ok(Request::Fetch(FetchRequest { partition, offset }))
            }
            MessageType::JoinGroup => {
                let mut group_id = [0; ID_LEN];
                read(stream, &mut group_id, duration).await?;
                let mut consumer_id = [0; ID_LEN];
                read(stream, &mut consumer_id, duration).await?;

                Ok(Request::JoinGroup(JoinGroupRequest {
                    group_id: decode_id(&group_id),
                    consumer_id: decode_id(&consumer_id),
                }))
            }
        }
    }
}

impl From<&Request> for Bytes {
    fn from(request: &Request) -> Self {
        let message_type: i32 = request.message_type().into();

        let body = {
            let mut body = BytesMut::new();
            match request {
                Request::Produce(produce) => {
                    body.put_i32_ne(produce.key);
                    body.put_i32_ne(produce.payload.len() as i32);
                    body.put_slice(&produce.payload);
                }
                Request::Fetch(fetch) => {
                    body.put_i32_ne(fetch.partition);
                    body.put_i64_ne(fetch.offset);
                }
                Request::JoinGroup(join) => {
                    body.put_slice(&encode_id(&join.group_id));
                    body.put_slice(&encode_id(&join.consumer_id));
                }
            }
            body
        };

        let mut buf = BytesMut::with_capacity(8 + body.len());
        buf.put_i32_ne((4 + body.len()) as i32);
        buf.put_i32_ne(message_type);
        buf.extend(body);

        buf.into()
    }
}

impl From<Request> for Bytes {
    fn from(request: Request) -> Self {
        (&request).into()
    }
}

/// Text up to the first NUL; invalid UTF-8 is replaced.
pub fn decode_id(data: &[u8]) -> String {
    let end = data.iter().position(|b| *b == 0).unwrap_or(data.len());

    String::from_utf8_lossy(&data[..end]).into_owned()
}

/// NUL-padded to `ID_LEN`, keeping room for the terminating NUL.
pub fn encode_id(id: &str) -> [u8; ID_LEN] {
    let mut buf = [0; ID_LEN];
    let len = id.len().min(ID_LEN - 1);
    buf[..len].copy_from_slice(&id.as_bytes()[..len]);

    buf
}
