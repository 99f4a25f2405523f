use std::sync::{Mutex, MutexGuard};

use partlog_core::common::error::Error;

pub const MAX_CONSUMERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub consumer_id: String,
    pub partition: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    /// Nobody has joined yet
    Unformed,
    /// The first join fixed the group id; stays so until restart
    Formed,
}

#[derive(Debug, Default)]
struct ConsumerGroup {
    group_id: Option<String>,
    members: Vec<GroupMember>,
}

/// In-memory assignment of consumers to partitions.
///
/// There is exactly one group. The first member to join names it; later
/// joins are added to it whatever group id they carry. The `i`-th member
/// (zero-based join order) gets partition `i mod P`. Members never leave.
#[derive(Debug)]
pub struct Coordinator {
    partitions: i32,
    max_members: usize,
    group: Mutex<ConsumerGroup>,
}

impl Coordinator {
    pub fn new(partitions: i32, max_members: usize) -> Self {
        Coordinator {
            partitions,
            max_members,
            group: Mutex::new(ConsumerGroup::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ConsumerGroup>, Error> {
        self.group
            .lock()
            .map_err(|_| Error::new_general("consumer group lock is poisoned"))
    }

    /// Adds a member and returns its partition, or a `Capacity` error when
    /// the group already holds `max_members`.
    pub fn join(&self, group_id: &str, consumer_id: &str) -> Result<i32, Error> {
        let mut group = self.lock()?;

        if group.members.len() >= self.max_members {
            Err(Error::new_capacity(&format!(
                "Consumer group is full: {} members",
                group.members.len()
            )))?
        }

        if group.group_id.is_none() {
            group.group_id = Some(group_id.to_owned());
        }

        let partition = assign_partition(group.members.len(), self.partitions);
        group.members.push(GroupMember {
            consumer_id: consumer_id.to_owned(),
            partition,
        });

        Ok(partition)
    }

    pub fn state(&self) -> Result<GroupState, Error> {
        let group = self.lock()?;

        Ok(if group.group_id.is_some() {
            GroupState::Formed
        } else {
            GroupState::Unformed
        })
    }

    pub fn group_id(&self) -> Result<Option<String>, Error> {
        Ok(self.lock()?.group_id.clone())
    }

    pub fn members(&self) -> Result<Vec<GroupMember>, Error> {
        Ok(self.lock()?.members.clone())
    }
}

fn assign_partition(member_index: usize, partitions: i32) -> i32 {
    (member_index % partitions as usize) as i32
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc, thread};

    use partlog_core::common::error::Kind;

    use super::*;

    #[test]
    fn test_assignment_order() {
        let coordinator = Coordinator::new(3, MAX_CONSUMERS);
        assert_eq!(GroupState::Unformed, coordinator.state().unwrap());

        let partitions: Vec<i32> = (0..7)
            .map(|i| coordinator.join("orders-group", &format!("c{}", i)).unwrap())
            .collect();

        assert_eq!(vec![0, 1, 2, 0, 1, 2, 0], partitions);
        assert_eq!(GroupState::Formed, coordinator.state().unwrap());
    }

    #[test]
    fn test_first_join_names_group() {
        let coordinator = Coordinator::new(3, MAX_CONSUMERS);
        coordinator.join("orders-group", "c1").unwrap();
        assert_eq!(1, coordinator.join("other-group", "c2").unwrap());

        assert_eq!(Some("orders-group".to_owned()), coordinator.group_id().unwrap());
        let members = coordinator.members().unwrap();
        assert_eq!(
            GroupMember {
                consumer_id: "c2".to_owned(),
                partition: 1
            },
            members[1]
        );
    }

    #[test]
    fn test_group_full() {
        let coordinator = Coordinator::new(3, 2);
        coordinator.join("g", "c1").unwrap();
        coordinator.join("g", "c2").unwrap();

        let error = coordinator.join("g", "c3").unwrap_err();
        assert_eq!(Kind::Capacity, error.get_kind());
        assert_eq!(2, coordinator.members().unwrap().len());
    }

    #[test]
    fn test_concurrent_joins() {
        let coordinator = Arc::new(Coordinator::new(64, 64));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let coordinator = coordinator.clone();
                thread::spawn(move || {
                    (0..8)
                        .map(|i| coordinator.join("g", &format!("c{}-{}", t, i)).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let partitions: HashSet<i32> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();

        assert_eq!(64, partitions.len());
        assert!(coordinator.join("g", "late").is_err());
    }
}
