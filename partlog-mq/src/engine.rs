use bytes::Bytes;
use partlog_core::{common::error::Error, data::Record};
use std::fs;

use crate::{
    config::{FetchLimits, StorageConfig},
    partition::{Partition, Recovery},
};

/// The fixed table of partitions under one data root.
#[derive(Debug)]
pub struct Engine {
    partitions: Vec<Partition>,
    limits: FetchLimits,
}

impl Engine {
    /// Provisions every partition directory and replays every log, one
    /// partition after the other. Must finish before any request is served.
    pub fn open(config: &StorageConfig) -> Result<Self, Error> {
        if config.partitions == 0 || config.partitions > i32::MAX as u32 {
            Err(Error::new_config(
                None,
                Some(format!("Invalid partition count: {}", config.partitions)),
            ))?
        }

        fs::create_dir_all(&config.data_root).map_err(|error| {
            Error::new_path(
                Some(error.into()),
                Some(format!("create {:?} failed", config.data_root)),
            )
        })?;

        let mut partitions = Vec::with_capacity(config.partitions as usize);
        for id in 0..config.partitions as i32 {
            let partition = Partition::new(id, &config.data_root)?;
            let Recovery {
                next_offset,
                records,
                truncated,
                index_rebuilt,
            } = partition.recover(config.rebuild_index)?;

            log::info!(
                target: "partlog_mq::engine",
                "partition {} recovered: next_offset={} records={} truncated={} index_rebuilt={}",
                id, next_offset, records, truncated, index_rebuilt
            );

            partitions.push(partition);
        }

        Ok(Engine {
            partitions,
            limits: config.fetch_limits(),
        })
    }

    pub fn partition_count(&self) -> i32 {
        self.partitions.len() as i32
    }

    /// `key mod P`, always in `[0, P)` even for negative keys.
    pub fn partition_for_key(&self, key: i32) -> i32 {
        key.rem_euclid(self.partition_count())
    }

    pub fn partition(&self, id: i32) -> Result<&Partition, Error> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.partitions.get(index))
            .ok_or_else(|| Error::new_validation(&format!("Partition out of range: {}", id)))
    }

    pub fn limits(&self) -> FetchLimits {
        self.limits
    }

    /// Routes `payload` by key and appends it. Returns `(partition, offset)`.
    pub fn produce(&self, key: i32, payload: Bytes) -> Result<(i32, i64), Error> {
        let partition = self.partition_for_key(key);
        let (offset, _) = self.append(partition, payload)?;

        Ok((partition, offset))
    }

    pub fn append(&self, partition: i32, payload: Bytes) -> Result<(i64, u64), Error> {
        self.partition(partition)?.append(payload)
    }

    pub fn locate(&self, partition: i32, target_offset: i64) -> Result<u64, Error> {
        self.partition(partition)?.locate(target_offset)
    }

    pub fn fetch(&self, partition: i32, offset: i64) -> Result<Vec<Record>, Error> {
        if offset < 0 {
            Err(Error::new_validation(&format!("Negative fetch offset: {}", offset)))?
        }

        self.partition(partition)?.fetch(offset, &self.limits)
    }

    pub fn next_offset(&self, partition: i32) -> Result<i64, Error> {
        self.partition(partition)?.next_offset()
    }
}
