use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use bytes::Bytes;
use partlog_core::{common::error::Error, data::Record};

use crate::{
    config::FetchLimits,
    message::Message,
    partition::{
        log_data::LogDataFile,
        log_index::{LogIndexItem, LOG_INDEX_ITEM_LEN},
    },
};

pub mod log_data;
pub mod log_index;

pub const LOG_DATA_FILE_NAME: &str = "orders.log";
pub const LOG_INDEX_FILE_NAME: &str = "orders.idx";

pub fn gen_partition_dir_name(id: i32) -> String {
    format!("partition-{}", id)
}

/// One independent, totally ordered log: `<data_root>/partition-<id>/`.
#[derive(Debug)]
pub struct Partition {
    id: i32,
    log_path: PathBuf,
    index_path: PathBuf,
    /// Guards the log file, the index file and the append cursor together.
    state: Mutex<PartitionState>,
}

#[derive(Debug, Default)]
pub(crate) struct PartitionState {
    next_offset: i64,
    /// Set when a failed append could not be undone; appends are refused
    /// until the log is replayed again.
    needs_recovery: bool,
    #[cfg(test)]
    faults: Faults,
}

/// Test-only write failures for the append path.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct Faults {
    /// Write half of the next index item, then fail
    pub index_write: bool,
    /// Fail every cut-back instead of truncating
    pub rollback: bool,
}

/// Outcome of replaying one partition log at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    pub next_offset: i64,
    pub records: u64,
    /// Bytes of an incomplete trailing frame that were cut off
    pub truncated: u64,
    pub index_rebuilt: bool,
}

impl Partition {
    /// Provisions the partition directory. The append cursor starts at 0
    /// until [`Partition::recover`] runs.
    pub fn new(id: i32, data_root: &Path) -> Result<Self, Error> {
        let path = data_root.join(gen_partition_dir_name(id));

        fs::create_dir_all(&path).map_err(|error| {
            Error::new_path(Some(error.into()), Some(format!("create {:?} failed", path)))
        })?;

        Ok(Partition {
            id,
            log_path: path.join(LOG_DATA_FILE_NAME),
            index_path: path.join(LOG_INDEX_FILE_NAME),
            state: Mutex::new(PartitionState::default()),
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, PartitionState>, Error> {
        self.state
            .lock()
            .map_err(|_| Error::new_general("partition lock is poisoned"))
    }

    pub fn next_offset(&self) -> Result<i64, Error> {
        Ok(self.lock()?.next_offset)
    }

    /// Replays the log from the start and sets the append cursor to one past
    /// the highest offset seen, or 0 for an empty or absent log.
    ///
    /// An incomplete trailing frame is cut off. With `rebuild_index`, an index
    /// whose item count disagrees with the log, or that holds an undecodable
    /// item, is rewritten from the log. A partition that refused appends after
    /// a failed rollback accepts them again.
    pub fn recover(&self, rebuild_index: bool) -> Result<Recovery, Error> {
        let mut state = self.lock()?;

        let mut last_offset: Option<i64> = None;
        let mut records = 0;
        let mut truncated = 0;

        if let Some(mut log) = LogDataFile::open(&self.log_path)? {
            while let Some(header) = log.next_header()? {
                last_offset = Some(last_offset.map_or(header.offset, |o| o.max(header.offset)));
                records += 1;
                log.skip_payload(&header)?;
            }

            if log.pos() < log.file_len() {
                truncated = log.file_len() - log.pos();
                log::warn!(
                    target: "partlog_mq::partition",
                    "partition {} has an incomplete trailing frame, cutting {} bytes at {}",
                    self.id, truncated, log.pos()
                );
                truncate(&self.log_path, log.pos())?;
            }
        }

        let (count, aligned) = log_index::count(&self.index_path)?;
        let mut index_rebuilt = false;
        if rebuild_index
            && (count != records || !aligned || !log_index::is_decodable(&self.index_path)?)
        {
            log::warn!(
                target: "partlog_mq::partition",
                "partition {} index has {} items for {} records, rebuilding",
                self.id, count, records
            );
            self.rebuild_index()?;
            index_rebuilt = true;
        } else if !aligned {
            // later items must start on a 16-byte boundary
            log::warn!(
                target: "partlog_mq::partition",
                "partition {} index ends with a partial item, cutting it",
                self.id
            );
            truncate(&self.index_path, count * LOG_INDEX_ITEM_LEN as u64)?;
        }

        state.next_offset = last_offset.map_or(0, |o| o + 1);
        state.needs_recovery = false;

        Ok(Recovery {
            next_offset: state.next_offset,
            records,
            truncated,
            index_rebuilt,
        })
    }

    fn rebuild_index(&self) -> Result<(), Error> {
        let mut items = vec![];

        if let Some(mut log) = LogDataFile::open(&self.log_path)? {
            loop {
                let pos = log.pos();
                match log.next_header()? {
                    Some(header) => {
                        items.push(LogIndexItem::new(header.offset, pos));
                        log.skip_payload(&header)?;
                    }
                    None => break,
                }
            }
        }

        log_index::rewrite(&self.index_path, &items)
    }

    /// Appends one record and returns its `(offset, position)`.
    ///
    /// The log frame is synced before the index item is written, and the
    /// cursor only moves once both are on stable storage. On failure the
    /// files are cut back to their previous length and the cursor stays put.
    /// If a cut-back fails too, the partition refuses appends until
    /// [`Partition::recover`] has replayed the log, so no offset is reused.
    pub fn append(&self, payload: Bytes) -> Result<(i64, u64), Error> {
        let mut state = self.lock()?;
        if state.needs_recovery {
            Err(Error::new_file(
                None,
                Some(format!("partition {} must be recovered before appending", self.id)),
            ))?
        }

        let mut log_file = open_append(&self.log_path)?;
        let mut index_file = open_append(&self.index_path)?;

        let position = file_len(&log_file)?;
        let index_len = file_len(&index_file)?;
        let offset = state.next_offset;

        let frame: Bytes = Message::new(offset, payload).into();
        if let Err(error) = write_durable(&mut log_file, &frame) {
            let undone = rollback(&state, &log_file, position);
            return Err(self.undo_failed(&mut state, error, undone));
        }

        let item: Bytes = LogIndexItem::new(offset, position).into();
        if let Err(error) = write_index_item(&mut state, &mut index_file, &item) {
            let undone = rollback(&state, &index_file, index_len)
                .and(rollback(&state, &log_file, position));
            return Err(self.undo_failed(&mut state, error, undone));
        }

        state.next_offset += 1;

        Ok((offset, position))
    }

    fn undo_failed(
        &self,
        state: &mut PartitionState,
        error: Error,
        undone: Result<(), Error>,
    ) -> Error {
        if let Err(rollback_error) = undone {
            log::error!(
                target: "partlog_mq::partition",
                "partition {} append could not be undone, refusing appends until recovery: {}",
                self.id, rollback_error
            );
            state.needs_recovery = true;
        }

        error
    }

    /// Log position to start scanning from for `target_offset`.
    pub fn locate(&self, target_offset: i64) -> Result<u64, Error> {
        log_index::locate(&self.index_path, target_offset)
    }

    /// Records at or after `target_offset`, bounded by `limits`. Takes no
    /// lock; a record still being appended is simply not returned.
    pub fn fetch(&self, target_offset: i64, limits: &FetchLimits) -> Result<Vec<Record>, Error> {
        let start = self.locate(target_offset)?;

        let mut log = match LogDataFile::open(&self.log_path)? {
            Some(log) => log,
            None => return Ok(vec![]),
        };
        // a damaged index may point past the end of the log
        log.seek(if start <= log.file_len() { start } else { 0 })?;

        let mut records = vec![];
        let mut bytes = 0;
        while let Some(header) = log.next_header()? {
            if header.offset < target_offset {
                log.skip_payload(&header)?;
                continue;
            }

            if records.len() >= limits.max_msgs || bytes + header.payload_len() > limits.max_bytes {
                break;
            }

            let payload = log.read_payload(&header)?;
            bytes += payload.len();
            records.push(Record::new(header.offset, payload));
        }

        Ok(records)
    }

    #[cfg(test)]
    pub(crate) fn hold(&self) -> MutexGuard<'_, PartitionState> {
        self.state.lock().unwrap()
    }
}

fn open_append(path: &Path) -> Result<File, Error> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|error| {
            Error::new_file(
                Some(error.into()),
                Some(format!("open {:?} for append failed", path)),
            )
        })
}

fn file_len(file: &File) -> Result<u64, Error> {
    file.metadata()
        .map(|metadata| metadata.len())
        .map_err(|error| Error::new_file(Some(error.into()), None))
}

fn write_durable(file: &mut File, data: &[u8]) -> Result<(), Error> {
    file.write_all(data)
        .and_then(|_| file.flush())
        .and_then(|_| file.sync_all())
        .map_err(|error| Error::new_file(Some(error.into()), Some("durable write failed".to_owned())))
}

fn write_index_item(
    #[allow(unused_variables)] state: &mut PartitionState,
    file: &mut File,
    data: &[u8],
) -> Result<(), Error> {
    #[cfg(test)]
    if std::mem::take(&mut state.faults.index_write) {
        let _ = file.write_all(&data[..data.len() / 2]);
        Err(Error::new_file(None, Some("index write failed".to_owned())))?
    }

    write_durable(file, data)
}

fn rollback(
    #[allow(unused_variables)] state: &PartitionState,
    file: &File,
    len: u64,
) -> Result<(), Error> {
    #[cfg(test)]
    if state.faults.rollback {
        Err(Error::new_file(None, Some(format!("cut back to {} bytes failed", len))))?
    }

    file.set_len(len)
        .and_then(|_| file.sync_all())
        .map_err(|error| {
            Error::new_file(Some(error.into()), Some(format!("cut back to {} bytes failed", len)))
        })
}

fn truncate(path: &Path, len: u64) -> Result<(), Error> {
    let file = OpenOptions::new().write(true).open(path).map_err(|error| {
        Error::new_file(Some(error.into()), Some(format!("open {:?} failed", path)))
    })?;

    file.set_len(len)
        .and_then(|_| file.sync_all())
        .map_err(|error| Error::new_file(Some(error.into()), Some(format!("truncate {:?} failed", path))))
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread, time::Duration};

    use super::*;

    const LIMITS: FetchLimits = FetchLimits {
        max_msgs: 5,
        max_bytes: 1024,
    };

    fn payload(i: usize) -> Bytes {
        format!("orderId={}", 100 + i).into()
    }

    #[test]
    fn test_append_offsets() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(1, dir.path()).unwrap();

        let (offset, pos) = partition.append(payload(0)).unwrap();
        assert_eq!((0, 0), (offset, pos));
        let (offset, pos) = partition.append(payload(1)).unwrap();
        assert_eq!((1, 12 + 11), (offset, pos));
        assert_eq!(2, partition.next_offset().unwrap());

        assert!(dir.path().join("partition-1").join("orders.log").exists());
        assert_eq!(
            2 * LOG_INDEX_ITEM_LEN as u64,
            fs::metadata(partition.index_path()).unwrap().len()
        );
    }

    #[test]
    fn test_fetch_round_trip() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        for i in 0..3 {
            partition.append(payload(i)).unwrap();
        }

        let records = partition.fetch(1, &LIMITS).unwrap();
        assert_eq!(2, records.len());
        assert_eq!(Record::new(1, payload(1)), records[0]);
        assert_eq!(2, records[1].offset);
    }

    #[test]
    fn test_fetch_bounds() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        for i in 0..8 {
            partition.append(payload(i)).unwrap();
        }

        let records = partition.fetch(0, &LIMITS).unwrap();
        assert_eq!(5, records.len());
        assert_eq!(vec![0, 1, 2, 3, 4], records.iter().map(|r| r.offset).collect::<Vec<_>>());

        let limits = FetchLimits {
            max_msgs: 5,
            max_bytes: 25,
        };
        let records = partition.fetch(3, &limits).unwrap();
        assert_eq!(2, records.len());
        assert!(records.iter().map(|r| r.len()).sum::<usize>() <= 25);
    }

    #[test]
    fn test_fetch_record_over_budget() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        partition.append(Bytes::from(vec![b'x'; 2000])).unwrap();
        partition.append(payload(1)).unwrap();

        assert!(partition.fetch(0, &LIMITS).unwrap().is_empty());
        assert_eq!(1, partition.fetch(1, &LIMITS).unwrap()[0].offset);
    }

    #[test]
    fn test_fetch_out_of_range() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        assert!(partition.fetch(0, &LIMITS).unwrap().is_empty());

        for i in 0..3 {
            partition.append(payload(i)).unwrap();
        }
        assert_eq!(0, partition.locate(10).unwrap());
        assert!(partition.fetch(10, &LIMITS).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_without_index() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        for i in 0..4 {
            partition.append(payload(i)).unwrap();
        }
        fs::remove_file(partition.index_path()).unwrap();

        let records = partition.fetch(2, &LIMITS).unwrap();
        assert_eq!(vec![2, 3], records.iter().map(|r| r.offset).collect::<Vec<_>>());
    }

    #[test]
    fn test_recover() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        {
            let partition = Partition::new(2, dir.path()).unwrap();
            for i in 0..4 {
                partition.append(payload(i)).unwrap();
            }
        }

        let partition = Partition::new(2, dir.path()).unwrap();
        let recovery = partition.recover(false).unwrap();
        assert_eq!(4, recovery.next_offset);
        assert_eq!(4, recovery.records);
        assert_eq!(0, recovery.truncated);

        assert_eq!(4, partition.append(payload(4)).unwrap().0);
    }

    #[test]
    fn test_recover_empty() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        assert_eq!(0, partition.recover(true).unwrap().next_offset);

        File::create(partition.log_path()).unwrap();
        let recovery = partition.recover(false).unwrap();
        assert_eq!((0, 0), (recovery.next_offset, recovery.records));
    }

    #[test]
    fn test_recover_torn_tail() {
        let _ = env_logger::builder().is_test(true).try_init();

        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        for i in 0..2 {
            partition.append(payload(i)).unwrap();
        }
        let good_len = fs::metadata(partition.log_path()).unwrap().len();

        let torn: Bytes = Message::new(2, payload(2)).into();
        let mut file = OpenOptions::new().append(true).open(partition.log_path()).unwrap();
        file.write_all(&torn[..16]).unwrap();
        drop(file);

        let recovery = partition.recover(false).unwrap();
        assert_eq!(2, recovery.next_offset);
        assert_eq!(16, recovery.truncated);
        assert_eq!(good_len, fs::metadata(partition.log_path()).unwrap().len());

        assert_eq!(2, partition.append(payload(2)).unwrap().0);
        assert_eq!(3, partition.fetch(0, &LIMITS).unwrap().len());
    }

    #[test]
    fn test_recover_rebuilds_index() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        for i in 0..3 {
            partition.append(payload(i)).unwrap();
        }
        let expected = fs::read(partition.index_path()).unwrap();

        fs::write(partition.index_path(), &expected[..20]).unwrap();
        let recovery = partition.recover(false).unwrap();
        assert!(!recovery.index_rebuilt);
        assert_eq!(16, fs::metadata(partition.index_path()).unwrap().len());

        let recovery = partition.recover(true).unwrap();
        assert!(recovery.index_rebuilt);
        assert_eq!(3, recovery.next_offset);
        assert_eq!(expected, fs::read(partition.index_path()).unwrap());

        assert!(!partition.recover(true).unwrap().index_rebuilt);
    }

    #[test]
    fn test_append_fails_without_directory() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        partition.append(payload(0)).unwrap();

        fs::remove_dir_all(dir.path().join("partition-0")).unwrap();

        assert!(partition.append(payload(1)).is_err());
        assert_eq!(1, partition.next_offset().unwrap());
    }

    #[test]
    fn test_append_rolls_back_failed_index_write() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        partition.append(payload(0)).unwrap();
        let log_len = fs::metadata(partition.log_path()).unwrap().len();
        let index_len = fs::metadata(partition.index_path()).unwrap().len();

        partition.hold().faults.index_write = true;
        assert!(partition.append(payload(1)).is_err());

        assert_eq!(1, partition.next_offset().unwrap());
        assert_eq!(log_len, fs::metadata(partition.log_path()).unwrap().len());
        assert_eq!(index_len, fs::metadata(partition.index_path()).unwrap().len());

        assert_eq!(1, partition.append(payload(1)).unwrap().0);
        let offsets: Vec<i64> = partition.fetch(0, &LIMITS).unwrap().iter().map(|r| r.offset).collect();
        assert_eq!(vec![0, 1], offsets);
    }

    #[test]
    fn test_failed_rollback_blocks_appends_until_recovery() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        partition.append(payload(0)).unwrap();

        {
            let mut state = partition.hold();
            state.faults.index_write = true;
            state.faults.rollback = true;
        }
        assert!(partition.append(payload(1)).is_err());

        partition.hold().faults.rollback = false;
        assert!(partition.append(payload(2)).is_err());
        assert_eq!(1, partition.next_offset().unwrap());

        // the frame for offset 1 stayed in the log, so replay moves past it
        let recovery = partition.recover(false).unwrap();
        assert_eq!(2, recovery.next_offset);
        assert_eq!(2, partition.append(payload(2)).unwrap().0);

        let offsets: Vec<i64> = partition.fetch(0, &LIMITS).unwrap().iter().map(|r| r.offset).collect();
        assert_eq!(vec![0, 1, 2], offsets);
    }

    #[test]
    fn test_fetch_with_undecodable_index() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        for i in 0..3 {
            partition.append(payload(i)).unwrap();
        }

        let mut data = fs::read(partition.index_path()).unwrap();
        data[8..16].copy_from_slice(&(-1i64).to_ne_bytes());
        fs::write(partition.index_path(), &data).unwrap();

        assert_eq!(3, partition.fetch(0, &LIMITS).unwrap().len());
        assert_eq!(2, partition.fetch(2, &LIMITS).unwrap()[0].offset);

        let recovery = partition.recover(true).unwrap();
        assert!(recovery.index_rebuilt);
        assert!(log_index::is_decodable(partition.index_path()).unwrap());
    }

    #[test]
    fn test_fetch_with_index_past_log_end() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Partition::new(0, dir.path()).unwrap();
        for i in 0..3 {
            partition.append(payload(i)).unwrap();
        }

        let mut data = fs::read(partition.index_path()).unwrap();
        data[40..48].copy_from_slice(&1_000_000i64.to_ne_bytes());
        fs::write(partition.index_path(), &data).unwrap();

        let records = partition.fetch(2, &LIMITS).unwrap();
        assert_eq!(vec![2], records.iter().map(|r| r.offset).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_appends() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Arc::new(Partition::new(0, dir.path()).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let partition = partition.clone();
                thread::spawn(move || {
                    (0..10)
                        .map(|i| partition.append(payload(i)).unwrap().0)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut offsets: Vec<i64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        offsets.sort();
        assert_eq!((0..40).collect::<Vec<i64>>(), offsets);

        let mut next = 0;
        loop {
            let records = partition.fetch(next, &LIMITS).unwrap();
            if records.is_empty() {
                break;
            }
            for record in records {
                assert_eq!(next, record.offset);
                next += 1;
            }
        }
        assert_eq!(40, next);
    }

    #[test]
    fn test_fetch_does_not_wait_for_lock() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let partition = Arc::new(Partition::new(0, dir.path()).unwrap());
        partition.append(payload(0)).unwrap();

        let _guard = partition.hold();
        let reader = partition.clone();
        let handle = thread::spawn(move || reader.fetch(0, &LIMITS).unwrap().len());

        thread::sleep(Duration::from_millis(20));
        assert_eq!(1, handle.join().unwrap());
    }
}
