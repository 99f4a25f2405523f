use std::time::Duration;

use partlog_core::{
    common::{error::Error, shutdown::ShutdownReceiver},
    data::Record,
};

use crate::{client::Client, config::ClientConfig, offset_store::OffsetStore};

/// A group member that reads its assigned partition from the committed
/// offset onward.
#[derive(Debug)]
pub struct Consumer {
    client: Client,
    store: OffsetStore,
    group_id: String,
    consumer_id: String,
    poll_interval: Duration,
    partition: Option<i32>,
    offset: i64,
}

impl Consumer {
    pub fn new(config: &ClientConfig, consumer_id: &str) -> Self {
        Consumer {
            client: Client::new(&config.broker_addr, config.timeout()),
            store: OffsetStore::new(&config.offset_root, &config.group_id),
            group_id: config.group_id.clone(),
            consumer_id: consumer_id.to_owned(),
            poll_interval: config.poll_interval(),
            partition: None,
            offset: 0,
        }
    }

    pub fn partition(&self) -> Option<i32> {
        self.partition
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Joins the group and resumes from the committed offset of the
    /// assigned partition.
    pub async fn join(&mut self) -> Result<i32, Error> {
        let response = self.client.join_group(&self.group_id, &self.consumer_id).await?;
        if response.is_rejected() {
            Err(Error::new_capacity(&format!(
                "group {} is full, {} was not admitted",
                self.group_id, self.consumer_id
            )))?
        }

        let partition = response.partition;
        self.partition = Some(partition);
        self.offset = self.store.load(partition);

        log::info!(
            target: "partlog_client::consumer",
            "consumer {} assigned partition {} from offset {}",
            self.consumer_id, partition, self.offset
        );

        Ok(partition)
    }

    /// One fetch from the current offset. The offset moves past the last
    /// returned record and is committed.
    pub async fn poll_once(&mut self) -> Result<Vec<Record>, Error> {
        let partition = self
            .partition
            .ok_or_else(|| Error::new_general("consumer has not joined a group"))?;

        let records = self.client.fetch(partition, self.offset).await?;

        for record in &records {
            log::info!(
                target: "partlog_client::consumer",
                "[consumer {}] p{} offset {} -> {}",
                self.consumer_id, partition, record.offset, String::from_utf8_lossy(&record.payload)
            );
        }

        if let Some(last) = records.last() {
            self.offset = last.offset + 1;
        }
        self.store.save(partition, self.offset)?;

        Ok(records)
    }

    /// Polls every `poll_interval` until shutdown. A failed poll is logged
    /// and retried on the next tick.
    pub async fn run_loop(&mut self, shutdown_rx: ShutdownReceiver) -> Result<(), Error> {
        if self.partition.is_none() {
            self.join().await?;
        }

        let shutdown = shutdown_rx.watch();
        tokio::pin!(shutdown);

        loop {
            if let Err(error) = self.poll_once().await {
                log::warn!(target: "partlog_client::consumer", "poll failed: {}", error);
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.poll_interval) => {},
            }
        }

        Ok(())
    }
}
