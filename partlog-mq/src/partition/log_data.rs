use std::{
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::Path,
};

use bytes::Bytes;
use partlog_core::common::error::Error;

use crate::message::{MessageHeader, MESSAGE_PREFIX_LEN};

/// Sequential reader over a partition log.
///
/// LogData = [ length(4) + offset(8) + payload .. ]
///
/// The file length is taken once at open, so bytes appended afterwards are
/// not visible to this reader.
#[derive(Debug)]
pub struct LogDataFile {
    reader: BufReader<File>,
    pos: u64,
    file_len: u64,
}

impl LogDataFile {
    /// `None` when the log has not been created yet.
    pub fn open(path: &Path) -> Result<Option<Self>, Error> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => Err(Error::new_file(
                Some(error.into()),
                Some(format!("open {:?} for reading failed", path)),
            ))?,
        };

        let file_len = file
            .metadata()
            .map_err(|error| Error::new_file(Some(error.into()), None))?
            .len();

        Ok(Some(LogDataFile {
            reader: BufReader::new(file),
            pos: 0,
            file_len,
        }))
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    pub fn seek(&mut self, pos: u64) -> Result<(), Error> {
        self.reader
            .seek(SeekFrom::Start(pos))
            .map_err(|error| Error::new_file(Some(error.into()), None))?;
        self.pos = pos;

        Ok(())
    }

    /// Reads the header at the current position and moves past it.
    ///
    /// Returns `None` at the end of the log, and also when the frame at the
    /// current position is incomplete or its length is invalid; the position
    /// is left at the start of that frame.
    pub fn next_header(&mut self) -> Result<Option<MessageHeader>, Error> {
        if self.pos + MESSAGE_PREFIX_LEN as u64 > self.file_len {
            return Ok(None);
        }

        let mut buf = [0; MESSAGE_PREFIX_LEN];
        self.reader
            .read_exact(&mut buf)
            .map_err(|error| Error::new_file(Some(error.into()), None))?;

        let header = match MessageHeader::try_from(&buf[..]) {
            Ok(header) if self.pos + header.frame_len() <= self.file_len => header,
            _ => {
                self.seek(self.pos)?;
                return Ok(None);
            }
        };

        self.pos += MESSAGE_PREFIX_LEN as u64;

        Ok(Some(header))
    }

    pub fn read_payload(&mut self, header: &MessageHeader) -> Result<Bytes, Error> {
        let mut payload = vec![0; header.payload_len()];
        self.reader
            .read_exact(&mut payload)
            .map_err(|error| Error::new_file(Some(error.into()), None))?;
        self.pos += payload.len() as u64;

        Ok(payload.into())
    }

    pub fn skip_payload(&mut self, header: &MessageHeader) -> Result<(), Error> {
        self.reader
            .seek_relative(header.payload_len() as i64)
            .map_err(|error| Error::new_file(Some(error.into()), None))?;
        self.pos += header.payload_len() as u64;

        Ok(())
    }
}
