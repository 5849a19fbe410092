use crate::{
    ActionQueue, ActionRef, DatabaseId, DatabaseRef, Error, QueueOptions, Result,
    signal::Signal, util::deadline,
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::{
    fmt::{self, Debug},
    sync::Arc,
    time::Duration,
};

/// The action queues of a cluster, one per member.
///
/// Lock order is map then queue. Blocking waits never hold the map lock, they
/// work on a snapshot of the queue handles.
pub struct ActionQueueList {
    queues: RwLock<IndexMap<DatabaseId, Arc<ActionQueue>>>,
    ready: Arc<Signal>,
}

impl ActionQueueList {
    pub fn new() -> Self {
        Self {
            queues: Default::default(),
            ready: Arc::new(Signal::new()),
        }
    }

    /// Create and start a queue for each member that does not have one yet.
    pub fn add(&self, databases: impl IntoIterator<Item = DatabaseRef>) -> Result<()> {
        for database in databases {
            self.add_with_options(database, QueueOptions::default())?;
        }
        Ok(())
    }

    /// Create and start the queue of a member, returns the existing one if the member is already known.
    pub fn add_with_options(
        &self,
        database: DatabaseRef,
        options: QueueOptions,
    ) -> Result<Arc<ActionQueue>> {
        let id = database.id().clone();
        let queue = {
            let mut queues = self.queues.write();
            if let Some(queue) = queues.get(&id) {
                return Ok(queue.clone());
            }
            let queue = Arc::new(ActionQueue::build(
                database,
                options,
                Some(self.ready.clone()),
            ));
            queues.insert(id.clone(), queue.clone());
            queue
        };
        if let Err(e) = queue.start() {
            self.queues.write().shift_remove(&id);
            return Err(e);
        }
        log::debug!("Added the action queue of `{}`", id);
        Ok(queue)
    }

    /// Register a member whose queue starts with a copy of the pending actions of `source`.
    ///
    /// The copy and the registration happen at once with respect to
    /// broadcasts: every action broadcast to the cluster reaches the new
    /// member exactly once. Returns the number of copied actions.
    pub fn add_from(&self, database: DatabaseRef, source: &DatabaseId) -> Result<usize> {
        let id = database.id().clone();
        let (queue, count) = {
            let mut queues = self.queues.write();
            if queues.contains_key(&id) {
                return Err(Error::msg(format!("`{}` is already a member", id)));
            }
            let from = Self::member_queue(&queues, source)?;
            let queue = Arc::new(ActionQueue::build(
                database,
                QueueOptions::default(),
                Some(self.ready.clone()),
            ));
            let count = queue.add_all(from);
            queues.insert(id.clone(), queue.clone());
            (queue, count)
        };
        if let Err(e) = queue.start() {
            self.queues.write().shift_remove(&id);
            return Err(e);
        }
        log::debug!(
            "Added the action queue of `{}` with {} actions copied from `{}`",
            id,
            count,
            source
        );
        Ok(count)
    }

    /// Detach and stop the queue of a member.
    pub fn remove(&self, id: &DatabaseId) -> Option<Arc<ActionQueue>> {
        let queue = self.queues.write().shift_remove(id)?;
        queue.stop();
        log::debug!("Removed the action queue of `{}`", id);
        Some(queue)
    }

    /// Stop and discard every queue.
    pub fn clear(&self) {
        let queues = self
            .queues
            .write()
            .drain(..)
            .map(|(_, v)| v)
            .collect::<Vec<_>>();
        for queue in &queues {
            queue.stop();
        }
        if !queues.is_empty() {
            log::debug!("Removed {} action queues", queues.len());
        }
    }

    pub fn size(&self) -> usize {
        self.queues.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.read().is_empty()
    }

    pub fn contains(&self, id: &DatabaseId) -> bool {
        self.queues.read().contains_key(id)
    }

    /// Member identities, in the order they were added.
    pub fn members(&self) -> Vec<DatabaseId> {
        self.queues.read().keys().cloned().collect()
    }

    /// Snapshot of the queues, in the order they were added.
    pub fn queues(&self) -> Vec<Arc<ActionQueue>> {
        self.queues.read().values().cloned().collect()
    }

    pub fn queue(&self, id: &DatabaseId) -> Option<Arc<ActionQueue>> {
        self.queues.read().get(id).cloned()
    }

    /// Queues of the requested members, in request order. Unknown members give `None`.
    pub fn get_queue_for_database<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a DatabaseId>,
    ) -> Vec<Option<Arc<ActionQueue>>> {
        let queues = self.queues.read();
        ids.into_iter().map(|id| queues.get(id).cloned()).collect()
    }

    /// Queue an action for one member. Returns false if the member is unknown.
    pub fn queue_action(&self, id: &DatabaseId, action: ActionRef) -> bool {
        let Some(queue) = self.queue(id) else {
            log::warn!("Cannot queue an action for `{}`, not a member", id);
            return false;
        };
        queue.add([action]);
        true
    }

    /// Queue the same actions, in the same order, for every member. Returns the number of queues reached.
    pub fn queue_action_for_all_databases(
        &self,
        actions: impl IntoIterator<Item = ActionRef>,
    ) -> usize {
        let actions = actions.into_iter().collect::<Vec<_>>();
        // Holding the map lock orders the broadcast with `add_from` and `copy_from_to`
        let queues = self.queues.read();
        for queue in queues.values() {
            queue.add(actions.iter().cloned());
        }
        queues.len()
    }

    pub fn pause<'a>(&self, ids: impl IntoIterator<Item = &'a DatabaseId>) {
        for (id, queue) in self.lookup(ids) {
            match queue {
                Some(queue) => queue.pause(),
                None => log::warn!("Cannot pause `{}`, not a member", id),
            }
        }
    }

    pub fn unpause<'a>(&self, ids: impl IntoIterator<Item = &'a DatabaseId>) {
        for (id, queue) in self.lookup(ids) {
            match queue {
                Some(queue) => queue.unpause(),
                None => log::warn!("Cannot unpause `{}`, not a member", id),
            }
        }
    }

    fn lookup<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a DatabaseId>,
    ) -> Vec<(&'a DatabaseId, Option<Arc<ActionQueue>>)> {
        let queues = self.queues.read();
        ids.into_iter()
            .map(|id| (id, queues.get(id).cloned()))
            .collect()
    }

    pub fn wait_until_all_queues_are_empty(&self) {
        self.wait_until_all_queues_are_empty_for(Duration::ZERO);
    }

    /// Wait for each queue to be empty in turn, all sharing the same deadline.
    pub fn wait_until_all_queues_are_empty_for(&self, timeout: Duration) -> bool {
        let deadline = deadline(timeout);
        self.queues()
            .iter()
            .all(|queue| queue.wait_until_empty_deadline(deadline))
    }

    pub fn wait_until_a_queue_is_ready(&self) {
        self.wait_until_a_queue_is_ready_for(Duration::ZERO);
    }

    /// Wait for at least one queue to be ready. Returns false if the timeout elapsed first.
    pub fn wait_until_a_queue_is_ready_for(&self, timeout: Duration) -> bool {
        let deadline = deadline(timeout);
        loop {
            let seen = self.ready.epoch();
            if self.any_ready() {
                return true;
            }
            if !self.ready.wait_past(seen, deadline) {
                return self.any_ready();
            }
        }
    }

    fn any_ready(&self) -> bool {
        self.queues().iter().any(|queue| queue.is_ready())
    }

    /// Wait for the queue of a member to be ready. Returns false for unknown members.
    pub fn wait_until_ready(&self, id: &DatabaseId) -> bool {
        self.wait_until_ready_for(id, Duration::ZERO)
    }

    pub fn wait_until_ready_for(&self, id: &DatabaseId, timeout: Duration) -> bool {
        match self.queue(id) {
            Some(queue) => queue.wait_until_ready_for(timeout),
            None => {
                log::warn!("Cannot wait for `{}`, not a member", id);
                false
            }
        }
    }

    /// Append the pending actions of `source` to the queue of `destination`, keeping them in `source`.
    ///
    /// Returns the number of actions copied.
    pub fn copy_from_to(&self, source: &DatabaseId, destination: &DatabaseId) -> Result<usize> {
        if source == destination {
            return Err(Error::msg(format!(
                "Cannot copy the actions of `{}` onto itself",
                source
            )));
        }
        let queues = self.queues.read();
        let from = Self::member_queue(&queues, source)?;
        let to = Self::member_queue(&queues, destination)?;
        let count = to.add_all(from);
        log::debug!(
            "Copied {} pending actions from `{}` to `{}`",
            count,
            source,
            destination
        );
        Ok(count)
    }

    fn member_queue<'q>(
        queues: &'q IndexMap<DatabaseId, Arc<ActionQueue>>,
        id: &DatabaseId,
    ) -> Result<&'q Arc<ActionQueue>> {
        queues.get(id).ok_or_else(|| {
            let error = Error::msg(format!("Unknown cluster member `{}`", id));
            log::warn!("{:#}", error);
            error
        })
    }
}

impl Default for ActionQueueList {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ActionQueueList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.queues()).finish()
    }
}
