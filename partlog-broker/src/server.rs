use std::{net::SocketAddr, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt;
use partlog_core::common::{
    error::{trace_panic, Error},
    shutdown::ShutdownReceiver,
};
use tokio::net::{TcpListener, ToSocketAddrs};

use crate::{broker::Broker, handler::handle_connection};

type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    broker: Arc<Broker>,
}

impl Server {
    pub async fn bind<A: ToSocketAddrs>(addr: A, broker: Arc<Broker>) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::new_bind(Some(Box::new(e))))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::new_bind(Some(Box::new(e))))?;

        Ok(Server {
            listener,
            local_addr,
            broker,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts until shutdown. Every connection is served in its own task
    /// and carries exactly one request.
    pub async fn run_loop(&self, shutdown_rx: ShutdownReceiver) {
        log::info!(target: "partlog_broker::server", "listening on {}", self.local_addr);

        let shutdown = shutdown_rx.watch();
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, remote_addr) = match accepted {
                Ok(accepted) => accepted,
                Err(error) => {
                    log::warn!(target: "partlog_broker::server", "accept error: {}", error);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            let broker = self.broker.clone();

            tokio::spawn(async move {
                let rst = AssertUnwindSafe(handle_connection(stream, broker))
                    .catch_unwind()
                    .await;

                match rst {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) if error.is_protocol() => {
                        log::debug!(
                            target: "partlog_broker::server",
                            "connection closed: [{}] {}",
                            remote_addr, error
                        );
                    }
                    Ok(Err(error)) => {
                        log::error!(
                            target: "partlog_broker::server",
                            "request failed: [{}] {}",
                            remote_addr, error
                        );
                    }
                    Err(error) => {
                        let (b, err) = trace_panic(&error);
                        log::error!(
                            target: "partlog_broker::server",
                            "connection task panic: [{}] {}\ntrace:\n{:?}",
                            remote_addr, err, b
                        );
                    }
                }
            });
        }

        log::info!(target: "partlog_broker::server", "stopped accepting on {}", self.local_addr);
    }
}
