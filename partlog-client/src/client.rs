use std::time::Duration;

use bytes::Bytes;
use partlog_core::{
    common::error::Error,
    data::{
        FetchRequest, FetchResponse, JoinGroupRequest, JoinGroupResponse, ProduceRequest,
        ProduceResponse, Record, Request, MAX_PAYLOAD_SIZE,
    },
    net::tcp::write_all,
};
use tokio::{net::TcpStream, time::timeout};

/// Talks to one broker. Every request uses a fresh connection, which the
/// broker closes after answering.
#[derive(Debug, Clone)]
pub struct Client {
    broker_addr: String,
    timeout: Duration,
}

impl Client {
    pub fn new(broker_addr: &str, timeout: Duration) -> Self {
        Client {
            broker_addr: broker_addr.to_owned(),
            timeout,
        }
    }

    pub fn broker_addr(&self) -> &str {
        &self.broker_addr
    }

    async fn send(&self, request: Request) -> Result<TcpStream, Error> {
        let mut stream = timeout(self.timeout, TcpStream::connect(&self.broker_addr))
            .await
            .map_err(|_| Error::new_timeout(&format!("connect {} timed out", self.broker_addr)))?
            .map_err(|error| {
                Error::new_net(
                    Some(error.into()),
                    Some(format!("connect {} failed", self.broker_addr)),
                    None,
                )
            })?;

        let data: Bytes = request.into();
        write_all(&mut stream, &data, self.timeout).await?;

        Ok(stream)
    }

    pub async fn produce<B: Into<Bytes>>(
        &self,
        key: i32,
        payload: B,
    ) -> Result<ProduceResponse, Error> {
        let request = Request::Produce(ProduceRequest {
            key,
            payload: payload.into(),
        });
        let mut stream = self.send(request).await?;

        ProduceResponse::read_from(&mut stream, self.timeout).await
    }

    pub async fn fetch(&self, partition: i32, offset: i64) -> Result<Vec<Record>, Error> {
        let mut stream = self
            .send(Request::Fetch(FetchRequest { partition, offset }))
            .await?;

        let response = FetchResponse::read_from(&mut stream, MAX_PAYLOAD_SIZE, self.timeout).await?;

        Ok(response.records)
    }

    pub async fn join_group(
        &self,
        group_id: &str,
        consumer_id: &str,
    ) -> Result<JoinGroupResponse, Error> {
        let request = Request::JoinGroup(JoinGroupRequest {
            group_id: group_id.to_owned(),
            consumer_id: consumer_id.to_owned(),
        });
        let mut stream = self.send(request).await?;

        JoinGroupResponse::read_from(&mut stream, self.timeout).await
    }
}
