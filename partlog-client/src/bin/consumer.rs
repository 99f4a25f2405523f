use std::process::exit;

use partlog_client::{
    config::{ClientConfig, DEFAULT_CONSUMER_CONFIG_FILE},
    consumer::Consumer,
};
use partlog_core::common::{logging::set_up_logging_from_file, shutdown::create_shutdown};

#[tokio::main]
async fn main() {
    if let Err(error) = set_up_logging_from_file::<&str>(None) {
        eprintln!("logging setup failed: {}", error);
    }

    let consumer_id = match std::env::args().nth(1) {
        Some(consumer_id) => consumer_id,
        None => {
            eprintln!("Usage: partlog-consumer <consumer_id>");
            exit(1);
        }
    };

    let config = match ClientConfig::load_or_default(DEFAULT_CONSUMER_CONFIG_FILE) {
        Ok(config) => config,
        Err(error) => {
            log::error!(target: "partlog_client::consumer", "{}", error);
            exit(1);
        }
    };

    let mut consumer = Consumer::new(&config, &consumer_id);
    if let Err(error) = consumer.join().await {
        log::error!(target: "partlog_client::consumer", "join failed: {}", error);
        exit(1);
    }

    let (mut shutdown_tx, shutdown_rx) = create_shutdown();
    let consumer_task = tokio::spawn(async move { consumer.run_loop(shutdown_rx).await });

    let _ = tokio::signal::ctrl_c().await;
    log::info!(target: "partlog_client::consumer", "Ctrl + c shutdown");

    shutdown_tx.shutdown().await;
    if let Ok(Err(error)) = consumer_task.await {
        log::error!(target: "partlog_client::consumer", "{}", error);
    }
}
