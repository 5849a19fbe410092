use crate::{
    ActionQueueList, ActionRef, ClusterConfig, Context, Database, DatabaseId, DatabaseRef,
    Driver, Error, QueueStats, Result,
};
use indexmap::IndexMap;
use std::fmt::{self, Display};
use url::Url;

/// Synchronization state of a member, derived from its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    /// The queue is not running, nothing will be applied.
    Stopped,
    /// The queue is paused, actions accumulate.
    Paused,
    /// Actions are pending or executing.
    Synchronizing,
    /// Up to date with every action queued so far.
    Ready,
}

impl From<&QueueStats> for MemberState {
    fn from(stats: &QueueStats) -> Self {
        if !stats.running {
            MemberState::Stopped
        } else if stats.paused {
            MemberState::Paused
        } else if stats.is_ready() {
            MemberState::Ready
        } else {
            MemberState::Synchronizing
        }
    }
}

impl Display for MemberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MemberState::Stopped => "stopped",
            MemberState::Paused => "paused",
            MemberState::Synchronizing => "synchronizing",
            MemberState::Ready => "ready",
        })
    }
}

#[derive(Debug, Clone)]
pub struct MemberStatus {
    pub id: DatabaseId,
    pub state: MemberState,
    pub stats: QueueStats,
}

/// A named cluster of databases and the action queues replicating writes to them.
///
/// Membership is the set of queues: adding a member starts its queue,
/// removing it stops the queue. Closing (or dropping) the cluster stops
/// every queue.
#[derive(Debug)]
pub struct ClusterDetails {
    name: String,
    queues: ActionQueueList,
}

impl ClusterDetails {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queues: ActionQueueList::new(),
        }
    }

    /// Connect every member of `config` through `driver`.
    ///
    /// Two urls resolving to the same member are an error.
    pub fn connect<D: Driver>(driver: &D, config: &ClusterConfig) -> Result<Self> {
        let cluster = Self::new(config.name.clone());
        let mut connected = IndexMap::<DatabaseId, &Url>::new();
        for url in &config.members {
            let database = driver.connect(url).with_context(|| {
                format!(
                    "While connecting member `{}` of cluster `{}`",
                    url, config.name
                )
            })?;
            let id = database.id().clone();
            if let Some(previous) = connected.get(&id) {
                let error = Error::msg(format!(
                    "Urls `{}` and `{}` both name member `{}` of cluster `{}`",
                    previous, url, id, config.name
                ));
                log::error!("{:#}", error);
                return Err(error);
            }
            cluster.add_member(database)?;
            connected.insert(id, url);
        }
        log::debug!(
            "Cluster `{}` connected with {} members",
            cluster.name,
            cluster.queues.size()
        );
        Ok(cluster)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queues(&self) -> &ActionQueueList {
        &self.queues
    }

    /// Add a member, does nothing if it already is one.
    pub fn add_member(&self, database: DatabaseRef) -> Result<()> {
        self.queues.add([database])
    }

    /// Add back a member, bringing it up to date with the actions still pending on `from`.
    ///
    /// Returns the number of actions copied from `from`.
    pub fn rejoin(&self, database: DatabaseRef, from: &DatabaseId) -> Result<usize> {
        let id = database.id().clone();
        self.queues.add_from(database, from).with_context(|| {
            format!(
                "While `{}` was rejoining cluster `{}` from `{}`",
                id, self.name, from
            )
        })
    }

    /// Remove a member, its pending actions are not executed.
    pub fn remove_member(&self, id: &DatabaseId) -> Option<DatabaseRef> {
        self.queues.remove(id).map(|queue| queue.database().clone())
    }

    pub fn contains(&self, id: &DatabaseId) -> bool {
        self.queues.contains(id)
    }

    pub fn member(&self, id: &DatabaseId) -> Option<DatabaseRef> {
        self.queues.queue(id).map(|queue| queue.database().clone())
    }

    pub fn members(&self) -> Vec<DatabaseRef> {
        self.queues
            .queues()
            .iter()
            .map(|queue| queue.database().clone())
            .collect()
    }

    pub fn member_status(&self, id: &DatabaseId) -> Option<MemberStatus> {
        self.queues.queue(id).map(|queue| {
            let stats = queue.stats();
            MemberStatus {
                id: id.clone(),
                state: (&stats).into(),
                stats,
            }
        })
    }

    pub fn statuses(&self) -> Vec<MemberStatus> {
        self.queues
            .queues()
            .iter()
            .map(|queue| {
                let stats = queue.stats();
                MemberStatus {
                    id: queue.id().clone(),
                    state: (&stats).into(),
                    stats,
                }
            })
            .collect()
    }

    /// Queue an action for every member. Returns the number of members reached.
    pub fn execute_on_all(&self, action: ActionRef) -> usize {
        self.queues.queue_action_for_all_databases([action])
    }

    /// Stop and drop every queue, pending actions are not executed.
    pub fn close(&self) {
        if !self.queues.is_empty() {
            log::debug!("Closing cluster `{}`", self.name);
        }
        self.queues.clear();
    }
}

impl Drop for ClusterDetails {
    fn drop(&mut self) {
        self.close();
    }
}
