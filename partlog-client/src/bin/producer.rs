use std::process::exit;

use partlog_client::{
    client::Client,
    config::{ClientConfig, DEFAULT_PRODUCER_CONFIG_FILE},
    producer::{produce_orders, DEMO_ORDER_IDS},
};
use partlog_core::common::logging::set_up_logging_from_file;

#[tokio::main]
async fn main() {
    if let Err(error) = set_up_logging_from_file::<&str>(None) {
        eprintln!("logging setup failed: {}", error);
    }

    let config = match ClientConfig::load_or_default(DEFAULT_PRODUCER_CONFIG_FILE) {
        Ok(config) => config,
        Err(error) => {
            log::error!(target: "partlog_client::producer", "{}", error);
            exit(1);
        }
    };

    let client = Client::new(&config.broker_addr, config.timeout());
    if let Err(error) = produce_orders(&client, DEMO_ORDER_IDS).await {
        log::error!(target: "partlog_client::producer", "produce failed: {}", error);
        exit(1);
    }
}
