use std::{io, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::timeout,
};

use crate::common::error::Error;

/// Fills `buf` from the stream, failing with `Timeout` if the peer stalls.
pub async fn read<S>(stream: &mut S, buf: &mut [u8], duration: Duration) -> Result<usize, Error>
where
    S: AsyncRead + Unpin,
{
    let n = timeout(duration, stream.read_exact(buf))
        .await
        .map_err(|_| Error::new_timeout("read from stream timed out"))?
        .map_err(|error| Error::new_io(Some(error.into()), None))?;

    Ok(n)
}

pub async fn read_i32<S>(stream: &mut S, duration: Duration) -> Result<i32, Error>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0; 4];
    read(stream, &mut buf, duration).await?;

    Ok(i32::from_ne_bytes(buf))
}

pub async fn read_i64<S>(stream: &mut S, duration: Duration) -> Result<i64, Error>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0; 8];
    read(stream, &mut buf, duration).await?;

    Ok(i64::from_ne_bytes(buf))
}

pub async fn write_all<S>(stream: &mut S, data: &[u8], duration: Duration) -> Result<(), Error>
where
    S: AsyncWrite + Unpin,
{
    timeout(duration, async {
        stream.write_all(data).await?;
        stream.flush().await
    })
    .await
    .map_err(|_| Error::new_timeout("write to stream timed out"))?
    .map_err(|error: io::Error| Error::new_io(Some(error.into()), None))
}
