use std::sync::Arc;

use bytes::Bytes;
use partlog_core::{
    common::error::Error,
    data::Request,
    net::tcp::write_all,
};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::broker::Broker;

/// Serves exactly one request on `stream` and closes it.
///
/// Any error means the peer gets no response bytes at all; the caller
/// decides how loudly to log it.
pub async fn handle_connection<S>(
    mut stream: S,
    broker: Arc<Broker>,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let server_config = &broker.config().server;
    let read_timeout = server_config.read_timeout();
    let write_timeout = server_config.write_timeout();

    let request =
        Request::read_from(&mut stream, server_config.max_payload_size, read_timeout).await?;

    let data = dispatch(request, &broker).await?;

    write_all(&mut stream, &data, write_timeout).await?;

    let _ = stream.shutdown().await;

    Ok(())
}

pub async fn dispatch(request: Request, broker: &Arc<Broker>) -> Result<Bytes, Error> {
    let data = match request {
        Request::Produce(produce) => broker.produce(produce).await?.into(),
        Request::Fetch(fetch) => broker.fetch(fetch).await?.into(),
        Request::JoinGroup(join) => broker.join_group(&join)?.into(),
    };

    Ok(data)
}
