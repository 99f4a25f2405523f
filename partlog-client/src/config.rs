use std::{fs, path::Path, path::PathBuf, time::Duration};

use partlog_core::common::error::Error;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PRODUCER_CONFIG_FILE: &str = "producer.yml";
pub const DEFAULT_CONSUMER_CONFIG_FILE: &str = "consumer.yml";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub broker_addr: String,
    pub group_id: String,
    pub offset_root: PathBuf,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            broker_addr: "127.0.0.1:9092".to_owned(),
            group_id: "orders-group".to_owned(),
            offset_root: PathBuf::from("./offsets"),
            poll_interval_ms: 2000,
            timeout_secs: 15,
        }
    }
}

impl ClientConfig {
    pub fn from_file<P: AsRef<Path>>(cfg_file: P) -> Result<Self, Error> {
        let cfg_file = cfg_file.as_ref();
        let cfg = fs::read_to_string(cfg_file).map_err(|error| {
            Error::new_config(Some(error.into()), Some(format!("read {:?} failed", cfg_file)))
        })?;

        serde_yaml::from_str(&cfg).map_err(|error| {
            Error::new_config(Some(error.into()), Some(format!("parse {:?} failed", cfg_file)))
        })
    }

    /// Defaults when `cfg_file` does not exist.
    pub fn load_or_default<P: AsRef<Path>>(cfg_file: P) -> Result<Self, Error> {
        if cfg_file.as_ref().exists() {
            ClientConfig::from_file(cfg_file)
        } else {
            Ok(ClientConfig::default())
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");

        let config = ClientConfig::load_or_default(dir.path().join("missing.yml")).unwrap();
        assert_eq!(ClientConfig::default(), config);

        let cfg_file = dir.path().join("consumer.yml");
        fs::write(&cfg_file, "broker_addr: \"10.0.0.1:9092\"\npoll_interval_ms: 50\n").unwrap();

        let config = ClientConfig::load_or_default(&cfg_file).unwrap();
        assert_eq!("10.0.0.1:9092", config.broker_addr);
        assert_eq!(Duration::from_millis(50), config.poll_interval());
        assert_eq!("orders-group", config.group_id);
    }
}
