use std::{
    fs,
    path::{Path, PathBuf},
};

use partlog_core::common::error::Error;

/// Committed consumer positions, one decimal text file per partition:
/// `<root>/<group_id>/partition-<p>.offset`.
#[derive(Debug, Clone)]
pub struct OffsetStore {
    group_dir: PathBuf,
}

impl OffsetStore {
    pub fn new<P: AsRef<Path>>(root: P, group_id: &str) -> Self {
        OffsetStore {
            group_dir: root.as_ref().join(group_id),
        }
    }

    pub fn path(&self, partition: i32) -> PathBuf {
        self.group_dir.join(format!("partition-{}.offset", partition))
    }

    /// Next offset to fetch; 0 when nothing usable was saved.
    pub fn load(&self, partition: i32) -> i64 {
        let path = self.path(partition);

        match fs::read_to_string(&path) {
            Ok(text) => match text.trim().parse::<i64>() {
                Ok(offset) if offset >= 0 => offset,
                _ => {
                    log::warn!(
                        target: "partlog_client::offset_store",
                        "ignore unreadable offset file {:?}",
                        path
                    );
                    0
                }
            },
            Err(_) => 0,
        }
    }

    pub fn save(&self, partition: i32, offset: i64) -> Result<(), Error> {
        fs::create_dir_all(&self.group_dir).map_err(|error| {
            Error::new_path(
                Some(error.into()),
                Some(format!("create {:?} failed", self.group_dir)),
            )
        })?;

        let path = self.path(partition);
        fs::write(&path, offset.to_string()).map_err(|error| {
            Error::new_file(Some(error.into()), Some(format!("write {:?} failed", path)))
        })
    }
}
