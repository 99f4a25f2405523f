use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::AsyncRead;

use crate::{
    common::error::Error,
    net::tcp::{read, read_i32, read_i64},
};

use super::Record;

/// JOIN_GROUP answer when the group has no room for another member
pub const GROUP_FULL: i32 = -1;

/// partition(4) + offset(8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProduceResponse {
    pub partition: i32,
    pub offset: i64,
}

/// count(4) + [ offset(8) + len(4) + payload .. ]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    pub records: Vec<Record>,
}

/// partition(4), or `GROUP_FULL`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinGroupResponse {
    pub partition: i32,
}

impl ProduceResponse {
    pub async fn read_from<S>(stream: &mut S, duration: Duration) -> Result<Self, Error>
    where
        S: AsyncRead + Unpin,
    {
        let partition = read_i32(stream, duration).await?;
        let offset = read_i64(stream, duration).await?;

        Ok(ProduceResponse { partition, offset })
    }
}

impl FetchResponse {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub async fn read_from<S>(
        stream: &mut S,
        max_payload_size: usize,
        duration: Duration,
    ) -> Result<Self, Error>
    where
        S: AsyncRead + Unpin,
    {
        let count = read_i32(stream, duration).await?;
        if count < 0 {
            Err(Error::new_frame(None, Some(format!("Negative record count: {}", count))))?
        }

        // the count is untrusted until the records actually arrive
        let mut records = Vec::with_capacity((count as usize).min(64));
        for _ in 0..count {
            let offset = read_i64(stream, duration).await?;
            let len = read_i32(stream, duration).await?;
            if len < 0 || len as usize > max_payload_size {
                Err(Error::new_frame(None, Some(format!("Invalid record length: {}", len))))?
            }

            let mut payload = vec![0; len as usize];
            read(stream, &mut payload, duration).await?;

            records.push(Record::new(offset, payload.into()));
        }

        Ok(FetchResponse { records })
    }
}

impl JoinGroupResponse {
    pub fn is_rejected(&self) -> bool {
        self.partition == GROUP_FULL
    }

    pub async fn read_from<S>(stream: &mut S, duration: Duration) -> Result<Self, Error>
    where
        S: AsyncRead + Unpin,
    {
        let partition = read_i32(stream, duration).await?;

        Ok(JoinGroupResponse { partition })
    }
}

impl From<ProduceResponse> for Bytes {
    fn from(response: ProduceResponse) -> Self {
        let mut buf = BytesMut::with_capacity(12);
        buf.put_i32_ne(response.partition);
        buf.put_i64_ne(response.offset);

        buf.into()
    }
}

impl From<FetchResponse> for Bytes {
    fn from(response: FetchResponse) -> Self {
        let size = 4 + response.records.iter().map(|r| 12 + r.len()).sum::<usize>();

        let mut buf = BytesMut::with_capacity(size);
        buf.put_i32_ne(response.records.len() as i32);
        for record in response.records {
            buf.put_i64_ne(record.offset);
            buf.put_i32_ne(record.len() as i32);
            buf.extend(record.payload);
        }

        buf.into()
    }
}

impl From<JoinGroupResponse> for Bytes {
    fn from(response: JoinGroupResponse) -> Self {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_i32_ne(response.partition);

        buf.into()
    }
}
