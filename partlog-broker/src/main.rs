use std::process::exit;

use partlog_broker::{broker::Broker, common::Config, server::Server};
use partlog_core::common::{
    error::hook_panic, logging::set_up_logging_from_file, shutdown::create_shutdown,
};
use tokio::signal::unix::{signal, SignalKind};

#[tokio::main]
async fn main() {
    if let Err(error) = set_up_logging_from_file::<&str>(None) {
        eprintln!("logging setup failed: {}", error);
    }
    hook_panic();

    let cfg_file = std::env::args().nth(1);
    let config = match Config::load(cfg_file.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            log::error!(target: "partlog_broker::main", "{}", error);
            exit(1);
        }
    };

    let bind = config.server.bind.clone();
    let broker = match Broker::open(config) {
        Ok(broker) => broker,
        Err(error) => {
            log::error!(target: "partlog_broker::main", "recovery failed: {}", error);
            exit(1);
        }
    };

    let server = match Server::bind(&bind, broker).await {
        Ok(server) => server,
        Err(error) => {
            log::error!(target: "partlog_broker::main", "bind {} failed: {}", bind, error);
            exit(1);
        }
    };

    let (mut shutdown_tx, shutdown_rx) = create_shutdown();
    let server_task = tokio::spawn(async move { server.run_loop(shutdown_rx).await });

    let mut term_sig = match signal(SignalKind::terminate()) {
        Ok(term_sig) => term_sig,
        Err(error) => {
            log::error!(target: "partlog_broker::main", "install SIGTERM handler failed: {}", error);
            exit(1);
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!(target: "partlog_broker::main", "Ctrl + c shutdown");
        },
        _ = term_sig.recv() => {
            log::info!(target: "partlog_broker::main", "SIGTERM shutdown");
        },
    };

    shutdown_tx.shutdown().await;
    let _ = server_task.await;
}
