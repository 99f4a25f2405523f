use std::{fs, path::Path, time::Duration};

use partlog_core::{common::error::Error, data::MAX_PAYLOAD_SIZE};
use partlog_mq::config::StorageConfig;
use serde::{Deserialize, Serialize};

use crate::group::MAX_CONSUMERS;

pub const DEFAULT_CONFIG_FILE: &str = "broker.yml";
pub const DEFAULT_BIND: &str = "0.0.0.0:9092";

#[derive(Deserialize, Serialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub group: GroupConfig,
}

impl Config {
    pub fn new() -> Self {
        Config::default()
    }

    pub fn from_file<P: AsRef<Path>>(cfg_file: P) -> Result<Self, Error> {
        let cfg_file = cfg_file.as_ref();
        let cfg = fs::read_to_string(cfg_file).map_err(|error| {
            Error::new_config(Some(error.into()), Some(format!("read {:?} failed", cfg_file)))
        })?;

        Config::from_yaml(&cfg)
    }

    pub fn from_yaml(cfg: &str) -> Result<Self, Error> {
        serde_yaml::from_str(cfg).map_err(|error| {
            Error::new_config(Some(error.into()), Some("parse config failed".to_owned()))
        })
    }

    /// An explicit path must exist; otherwise `broker.yml` is used when
    /// present and the defaults when not.
    pub fn load(cfg_file: Option<&str>) -> Result<Self, Error> {
        match cfg_file {
            Some(cfg_file) => Config::from_file(cfg_file),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Config::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Config::default()),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub max_payload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: DEFAULT_BIND.to_owned(),
            read_timeout_secs: 15,
            write_timeout_secs: 15,
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GroupConfig {
    pub max_members: usize,
}

impl Default for GroupConfig {
    fn default() -> Self {
        GroupConfig {
            max_members: MAX_CONSUMERS,
        }
    }
}
