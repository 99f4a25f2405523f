use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use bytes::{BufMut, Bytes, BytesMut};
use partlog_core::common::error::{Error, Kind};

pub const LOG_INDEX_ITEM_LEN: usize = 16;

/// LogIndex = [ message_offset(8) + message_pos(8) .. ]
///
/// Dense: one item per record, in log order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogIndexItem {
    message_offset: i64,
    message_pos: u64,
}

impl LogIndexItem {
    pub fn new(message_offset: i64, message_pos: u64) -> Self {
        LogIndexItem {
            message_offset,
            message_pos,
        }
    }

    pub fn message_offset(&self) -> i64 {
        self.message_offset
    }

    pub fn message_pos(&self) -> u64 {
        self.message_pos
    }
}

impl From<LogIndexItem> for Bytes {
    fn from(value: LogIndexItem) -> Self {
        let mut rst = BytesMut::with_capacity(LOG_INDEX_ITEM_LEN);
        rst.put_i64_ne(value.message_offset);
        rst.put_i64_ne(value.message_pos as i64);

        rst.into()
    }
}

impl TryFrom<&[u8]> for LogIndexItem {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        if data.len() < LOG_INDEX_ITEM_LEN {
            Err(Error::new_decode(&format!(
                "Data is too short to decode LogIndexItem: {:?}",
                data.len()
            )))?;
        }

        let message_offset = i64::from_ne_bytes(data[0..8].try_into().expect("data[0..8] is not satisfy"));
        let message_pos = i64::from_ne_bytes(data[8..16].try_into().expect("data[8..16] is not satisfy"));

        if message_pos < 0 {
            Err(Error::new_decode(&format!("Negative message position: {}", message_pos)))?;
        }

        Ok(LogIndexItem::new(message_offset, message_pos as u64))
    }
}

/// Sequential reader over a partition index.
pub struct LogIndexFile {
    reader: BufReader<File>,
}

impl LogIndexFile {
    /// `None` when the index has not been created yet.
    pub fn open(path: &Path) -> Result<Option<Self>, Error> {
        match File::open(path) {
            Ok(file) => Ok(Some(LogIndexFile {
                reader: BufReader::new(file),
            })),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(Error::new_file(
                Some(error.into()),
                Some(format!("open {:?} for reading failed", path)),
            )),
        }
    }

    /// The next complete item, `None` at the end. A trailing partial item
    /// (an append still in flight) counts as the end.
    pub fn next(&mut self) -> Result<Option<LogIndexItem>, Error> {
        let mut buf = [0; LOG_INDEX_ITEM_LEN];
        match self.reader.read_exact(&mut buf) {
            Ok(_) => LogIndexItem::try_from(&buf[..]).map(Some),
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(error) => Err(Error::new_file(Some(error.into()), None)),
        }
    }
}

/// Log position of the first item whose offset is `>= target_offset`.
///
/// Falls back to position 0 (start of the log) when there is no such item,
/// when the index is missing or empty, or when an item can't be decoded; the
/// caller rescans and skips records below the target.
pub fn locate(path: &Path, target_offset: i64) -> Result<u64, Error> {
    let mut index = match LogIndexFile::open(path)? {
        Some(index) => index,
        None => return Ok(0),
    };

    loop {
        match index.next() {
            Ok(Some(item)) if item.message_offset() >= target_offset => {
                return Ok(item.message_pos())
            }
            Ok(Some(_)) => continue,
            Ok(None) => return Ok(0),
            Err(error) if error.get_kind() == Kind::Decode => {
                log::warn!(
                    target: "partlog_mq::log_index",
                    "undecodable item in {:?}, scanning from the start: {}",
                    path, error
                );
                return Ok(0);
            }
            Err(error) => return Err(error),
        }
    }
}

/// Whether every complete item decodes. A missing index counts as decodable.
pub fn is_decodable(path: &Path) -> Result<bool, Error> {
    let mut index = match LogIndexFile::open(path)? {
        Some(index) => index,
        None => return Ok(true),
    };

    loop {
        match index.next() {
            Ok(Some(_)) => continue,
            Ok(None) => return Ok(true),
            Err(error) if error.get_kind() == Kind::Decode => return Ok(false),
            Err(error) => return Err(error),
        }
    }
}

/// Number of complete items, and whether the file length is a whole
/// number of items.
pub fn count(path: &Path) -> Result<(u64, bool), Error> {
    match fs::metadata(path) {
        Ok(metadata) => {
            let len = metadata.len();
            let item_len = LOG_INDEX_ITEM_LEN as u64;
            Ok((len / item_len, len % item_len == 0))
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok((0, true)),
        Err(error) => Err(Error::new_file(Some(error.into()), None)),
    }
}

/// Replaces the index at `path` with `items`, through a temporary file that
/// is synced and then renamed over the old one.
pub fn rewrite(path: &Path, items: &[LogIndexItem]) -> Result<(), Error> {
    let tmp_path = path.with_extension("idx.tmp");

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|error| {
            Error::new_file(
                Some(error.into()),
                Some(format!("create {:?} failed", tmp_path)),
            )
        })?;

    let mut writer = BufWriter::new(file);
    for item in items {
        let data: Bytes = (*item).into();
        writer
            .write_all(&data)
            .map_err(|error| Error::new_file(Some(error.into()), None))?;
    }

    let file = writer
        .into_inner()
        .map_err(|error| Error::new_file(Some(error.into_error().into()), None))?;
    file.sync_all()
        .map_err(|error| Error::new_file(Some(error.into()), None))?;

    fs::rename(&tmp_path, path).map_err(|error| {
        Error::new_file(
            Some(error.into()),
            Some(format!("rename {:?} failed", tmp_path)),
        )
    })
}
