use bytes::Bytes;

/// One produced payload and the offset it was assigned within its partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub offset: i64,
    pub payload: Bytes,
}

impl Record {
    pub fn new(offset: i64, payload: Bytes) -> Self {
        Self { offset, payload }
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
