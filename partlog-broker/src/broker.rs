use std::sync::Arc;

use partlog_core::{
    common::error::{Error, Kind},
    data::{
        FetchRequest, FetchResponse, JoinGroupRequest, JoinGroupResponse, ProduceRequest,
        ProduceResponse, GROUP_FULL,
    },
};
use partlog_mq::engine::Engine;
use tokio::task::spawn_blocking;

use crate::{common::Config, group::Coordinator};

/// Everything a connection needs to answer a request: the partition table
/// and the consumer group.
#[derive(Debug)]
pub struct Broker {
    engine: Engine,
    coordinator: Coordinator,
    config: Config,
}

impl Broker {
    /// Recovers every partition before returning.
    pub fn open(config: Config) -> Result<Arc<Broker>, Error> {
        let engine = Engine::open(&config.storage)?;
        let coordinator = Coordinator::new(engine.partition_count(), config.group.max_members);

        Ok(Arc::new(Broker {
            engine,
            coordinator,
            config,
        }))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn produce(
        self: &Arc<Self>,
        request: ProduceRequest,
    ) -> Result<ProduceResponse, Error> {
        let broker = self.clone();
        let ProduceRequest { key, payload } = request;

        let (partition, offset) = spawn_blocking(move || broker.engine.produce(key, payload))
            .await
            .map_err(|error| Error::new_general(&format!("produce task failed: {}", error)))??;

        log::debug!(
            target: "partlog_broker::broker",
            "PRODUCE key={} -> partition={} offset={}",
            key, partition, offset
        );

        Ok(ProduceResponse { partition, offset })
    }

    pub async fn fetch(self: &Arc<Self>, request: FetchRequest) -> Result<FetchResponse, Error> {
        let broker = self.clone();
        let FetchRequest { partition, offset } = request;

        let records = spawn_blocking(move || broker.engine.fetch(partition, offset))
            .await
            .map_err(|error| Error::new_general(&format!("fetch task failed: {}", error)))??;

        Ok(FetchResponse::new(records))
    }

    /// A full group is answered with `GROUP_FULL` rather than an error.
    pub fn join_group(&self, request: &JoinGroupRequest) -> Result<JoinGroupResponse, Error> {
        match self.coordinator.join(&request.group_id, &request.consumer_id) {
            Ok(partition) => {
                log::info!(
                    target: "partlog_broker::broker",
                    "consumer {} joined group {} -> partition {}",
                    request.consumer_id, request.group_id, partition
                );

                Ok(JoinGroupResponse { partition })
            }
            Err(error) if error.get_kind() == Kind::Capacity => {
                log::warn!(
                    target: "partlog_broker::broker",
                    "consumer {} rejected: {}",
                    request.consumer_id, error
                );

                Ok(JoinGroupResponse {
                    partition: GROUP_FULL,
                })
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use partlog_core::data::Record;

    use super::*;

    fn open(dir: &std::path::Path, max_members: usize) -> Arc<Broker> {
        let mut config = Config::new();
        config.storage.data_root = dir.to_path_buf();
        config.group.max_members = max_members;

        Broker::open(config).unwrap()
    }

    #[tokio::test]
    async fn test_produce_then_fetch() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let broker = open(dir.path(), 10);

        let response = broker
            .produce(ProduceRequest {
                key: 104,
                payload: Bytes::from_static(b"orderId=104"),
            })
            .await
            .unwrap();
        assert_eq!((2, 0), (response.partition, response.offset));

        let response = broker
            .fetch(FetchRequest {
                partition: 2,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(
            vec![Record::new(0, Bytes::from_static(b"orderId=104"))],
            response.records
        );
    }

    #[tokio::test]
    async fn test_fetch_bad_partition() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let broker = open(dir.path(), 10);

        let error = broker
            .fetch(FetchRequest {
                partition: 9,
                offset: 0,
            })
            .await
            .unwrap_err();
        assert!(error.is_validation());
    }

    #[test]
    fn test_join_group_full() {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let broker = open(dir.path(), 1);

        let join = |consumer_id: &str| {
            broker
                .join_group(&JoinGroupRequest {
                    group_id: "orders-group".to_owned(),
                    consumer_id: consumer_id.to_owned(),
                })
                .unwrap()
        };

        assert_eq!(0, join("c1").partition);
        assert!(join("c2").is_rejected());
    }
}
