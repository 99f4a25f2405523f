use std::path::Path;

use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

use super::error::Error;

pub const DEFAULT_LOG_CONFIG_FILE: &str = "log4rs.yml";

const CONSOLE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l})} {t} - {m}{n}";

/// Initialises log4rs from `file_path` (or `log4rs.yml`). Falls back to a
/// console logger at `info` when the file does not exist.
pub fn set_up_logging_from_file<P: AsRef<Path>>(file_path: Option<&P>) -> Result<(), Error> {
    let file_path = file_path
        .map(|p| p.as_ref().to_path_buf())
        .unwrap_or_else(|| DEFAULT_LOG_CONFIG_FILE.into());

    if file_path.exists() {
        log4rs::init_file(&file_path, Default::default()).map_err(|error| {
            Error::new_config(
                Some(error.into()),
                Some(format!("load log config {:?} failed", file_path)),
            )
        })
    } else {
        set_up_console_logging(LevelFilter::Info)
    }
}

pub fn set_up_console_logging(level: LevelFilter) -> Result<(), Error> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))
        .map_err(|error| {
            Error::new_config(Some(error.into()), Some("build log config failed".to_owned()))
        })?;

    log4rs::init_config(config)
        .map(|_| ())
        .map_err(|error| Error::new_config(Some(error.into()), Some("init logger failed".to_owned())))
}
