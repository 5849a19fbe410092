use crate::{
    ActionMessage, ActionRef, DatabaseId, DatabaseRef, Error, Result, signal::Signal,
    util::deadline,
};
use parking_lot::{Condvar, Mutex};
use std::{
    any::Any,
    collections::VecDeque,
    fmt::{self, Debug},
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

/// How a queue is created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueOptions {
    /// Create the queue already paused, nothing runs until `unpause`.
    pub paused: bool,
}

/// Point in time view of a queue.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Actions waiting in the queue.
    pub pending: usize,
    /// Actions that ran successfully.
    pub executed: u64,
    /// Actions that returned an error or panicked.
    pub failed: u64,
    pub paused: bool,
    /// `start` was called and `stop` was not.
    pub running: bool,
    /// A worker thread is alive.
    pub started: bool,
    /// An action was dequeued and did not complete yet.
    pub executing: bool,
}

impl QueueStats {
    pub fn is_ready(&self) -> bool {
        self.running && !self.paused && self.pending == 0 && !self.executing
    }
}

#[derive(Debug, Default)]
struct State {
    actions: VecDeque<ActionMessage>,
    next_sequence: u64,
    paused: bool,
    running: bool,
    generation: u64,
    workers: usize,
    executing: bool,
    executed: u64,
    failed: u64,
}

impl State {
    fn push(&mut self, action: ActionRef) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.actions.push_back(ActionMessage::new(action, sequence));
    }

    /// Nothing pending nor executing.
    fn is_drained(&self) -> bool {
        self.actions.is_empty() && !self.executing
    }

    fn is_ready(&self) -> bool {
        self.running && !self.paused && self.is_drained()
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.actions.len(),
            executed: self.executed,
            failed: self.failed,
            paused: self.paused,
            running: self.running,
            started: self.workers > 0,
            executing: self.executing,
        }
    }
}

struct Shared {
    database: DatabaseRef,
    state: Mutex<State>,
    actions_available: Condvar,
    unpaused: Condvar,
    emptied: Condvar,
    ready: Condvar,
    listener: Option<Arc<Signal>>,
}

impl Shared {
    fn notify_actions_available(&self) {
        self.actions_available.notify_all();
    }

    fn notify_queue_is_empty(&self) {
        self.emptied.notify_all();
    }

    fn notify_queue_is_ready(&self) {
        self.ready.notify_all();
        if let Some(listener) = &self.listener {
            listener.notify();
        }
    }

    fn notify_unpaused(&self) {
        self.unpaused.notify_all();
    }

    /// Blocks while `blocked` holds. Returns false if the deadline passed first.
    fn wait_while(
        &self,
        condvar: &Condvar,
        deadline: Option<Instant>,
        blocked: impl Fn(&State) -> bool,
    ) -> bool {
        let mut state = self.state.lock();
        while blocked(&state) {
            match deadline {
                Some(deadline) => {
                    if condvar.wait_until(&mut state, deadline).timed_out() {
                        return !blocked(&state);
                    }
                }
                None => condvar.wait(&mut state),
            }
        }
        true
    }

    fn take_head(&self, deadline: Option<Instant>) -> Option<ActionMessage> {
        let mut state = self.state.lock();
        loop {
            if let Some(message) = state.actions.pop_front() {
                if state.is_drained() {
                    self.notify_queue_is_empty();
                    if state.is_ready() {
                        self.notify_queue_is_ready();
                    }
                }
                return Some(message);
            }
            match deadline {
                Some(deadline) => {
                    if self
                        .actions_available
                        .wait_until(&mut state, deadline)
                        .timed_out()
                        && state.actions.is_empty()
                    {
                        return None;
                    }
                }
                None => self.actions_available.wait(&mut state),
            }
        }
    }

    /// Next action for the worker of `generation`, `None` once that worker must exit.
    fn next_message(&self, generation: u64) -> Option<ActionMessage> {
        let mut state = self.state.lock();
        loop {
            if !state.running || state.generation != generation {
                return None;
            }
            if state.paused {
                self.unpaused.wait(&mut state);
                continue;
            }
            // A worker of a previous generation may still be completing its action
            if state.executing || state.actions.is_empty() {
                self.actions_available.wait(&mut state);
                continue;
            }
            let message = state.actions.pop_front();
            state.executing = true;
            return message;
        }
    }

    fn execute(&self, message: ActionMessage) {
        let database = &*self.database;
        let action = message.action();
        log::trace!(
            "Executing {} action #{} on `{}`",
            action.intent(),
            message.sequence(),
            database.id()
        );
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| action.execute(database)));
        let failed = match outcome {
            Ok(Ok(..)) => false,
            Ok(Err(e)) => {
                let e = e.context(format!(
                    "Action #{} failed on `{}`, continuing with the next one",
                    message.sequence(),
                    database.id()
                ));
                log::error!("{:#}", e);
                true
            }
            Err(payload) => {
                log::error!(
                    "Action #{} panicked on `{}`: {}",
                    message.sequence(),
                    database.id(),
                    panic_message(&*payload)
                );
                true
            }
        };
        let mut state = self.state.lock();
        state.executing = false;
        if failed {
            state.failed += 1;
        } else {
            state.executed += 1;
        }
        self.notify_actions_available();
        if state.is_drained() {
            self.notify_queue_is_empty();
        }
        if state.is_ready() {
            self.notify_queue_is_ready();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

/// Decrements the live workers count even if the worker unwinds.
struct WorkerGuard<'s>(&'s Shared);

impl Drop for WorkerGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        state.workers -= 1;
        log::debug!("Action queue of `{}` stopped", self.0.database.id());
    }
}

fn work(shared: Arc<Shared>, generation: u64) {
    let _guard = WorkerGuard(&shared);
    log::debug!(
        "Action queue of `{}` started (generation {})",
        shared.database.id(),
        generation
    );
    while let Some(message) = shared.next_message(generation) {
        shared.execute(message);
    }
}

/// Serializes the write actions of one member database.
///
/// Actions are executed in insertion order by one dedicated thread, started
/// with [`ActionQueue::start`]. Every blocking wait has a variant taking a
/// timeout, returning `false` when the timeout elapsed first. A zero timeout
/// means no timeout.
pub struct ActionQueue {
    shared: Arc<Shared>,
}

impl ActionQueue {
    pub fn new(database: DatabaseRef) -> Self {
        Self::with_options(database, QueueOptions::default())
    }

    pub fn with_options(database: DatabaseRef, options: QueueOptions) -> Self {
        Self::build(database, options, None)
    }

    pub(crate) fn build(
        database: DatabaseRef,
        options: QueueOptions,
        listener: Option<Arc<Signal>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                database,
                state: Mutex::new(State {
                    paused: options.paused,
                    ..Default::default()
                }),
                actions_available: Condvar::new(),
                unpaused: Condvar::new(),
                emptied: Condvar::new(),
                ready: Condvar::new(),
                listener,
            }),
        }
    }

    pub fn database(&self) -> &DatabaseRef {
        &self.shared.database
    }

    pub fn id(&self) -> &DatabaseId {
        self.shared.database.id()
    }

    /// Append actions to the tail of the queue.
    pub fn add(&self, actions: impl IntoIterator<Item = ActionRef>) {
        let mut state = self.shared.state.lock();
        let before = state.actions.len();
        for action in actions {
            state.push(action);
        }
        if state.actions.len() > before {
            self.shared.notify_actions_available();
        }
    }

    /// Append the pending actions of `other`, in order. Returns how many were added.
    pub fn add_all(&self, other: &ActionQueue) -> usize {
        let actions = other.pending_actions();
        let count = actions.len();
        self.add(actions);
        count
    }

    /// Snapshot of the actions waiting to be executed.
    pub fn pending_actions(&self) -> Vec<ActionRef> {
        self.shared
            .state
            .lock()
            .actions
            .iter()
            .map(|v| v.action().clone())
            .collect()
    }

    /// Spawn the worker thread. Does nothing if the queue is already running.
    pub fn start(&self) -> Result<()> {
        let generation = {
            let mut state = self.shared.state.lock();
            if state.running {
                return Ok(());
            }
            state.running = true;
            state.generation += 1;
            state.workers += 1;
            if state.is_ready() {
                self.shared.notify_queue_is_ready();
            }
            state.generation
        };
        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name(format!("flotilla-{}", self.id()))
            .spawn(move || work(shared, generation));
        if let Err(e) = spawned {
            let mut state = self.shared.state.lock();
            state.workers -= 1;
            if state.generation == generation {
                state.running = false;
            }
            let error = Error::new(e).context(format!(
                "Could not spawn the action queue thread of `{}`",
                self.id()
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(())
    }

    /// Ask the worker to exit once its current action completes. Pending actions are kept.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        if !state.running {
            return;
        }
        state.running = false;
        self.shared.notify_actions_available();
        self.shared.notify_unpaused();
    }

    pub fn is_running(&self) -> bool {
        self.shared.state.lock().running
    }

    /// True while a worker thread is alive, this may lag behind `stop`.
    pub fn has_started(&self) -> bool {
        self.shared.state.lock().workers > 0
    }

    pub fn pause(&self) {
        self.shared.state.lock().paused = true;
    }

    pub fn unpause(&self) {
        let mut state = self.shared.state.lock();
        if !state.paused {
            return;
        }
        state.paused = false;
        self.shared.notify_unpaused();
        if state.is_ready() {
            self.shared.notify_queue_is_ready();
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.state.lock().paused
    }

    /// Discard every pending action without executing it. Returns how many were discarded.
    pub fn clear(&self) -> usize {
        let mut state = self.shared.state.lock();
        let discarded = state.actions.len();
        state.actions.clear();
        if state.is_drained() {
            self.shared.notify_queue_is_empty();
        }
        if state.is_ready() {
            self.shared.notify_queue_is_ready();
        }
        if discarded > 0 {
            log::debug!(
                "Discarded {} pending actions of `{}`",
                discarded,
                self.id()
            );
        }
        discarded
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.shared.state.lock().actions.len()
    }

    /// No action is pending, one might still be executing.
    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().actions.is_empty()
    }

    pub fn has_actions_available(&self) -> bool {
        !self.is_empty()
    }

    /// Running, unpaused, with nothing pending nor executing.
    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().is_ready()
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.state.lock().stats()
    }

    /// Remove the first pending action, blocking until there is one.
    pub fn get_head_of_queue(&self) -> ActionMessage {
        loop {
            if let Some(message) = self.shared.take_head(None) {
                return message;
            }
        }
    }

    pub fn get_head_of_queue_for(&self, timeout: Duration) -> Option<ActionMessage> {
        self.shared.take_head(deadline(timeout))
    }

    /// Wait until nothing is pending and the last dequeued action completed.
    pub fn wait_until_empty(&self) {
        self.wait_until_empty_deadline(None);
    }

    pub fn wait_until_empty_for(&self, timeout: Duration) -> bool {
        self.wait_until_empty_deadline(deadline(timeout))
    }

    pub(crate) fn wait_until_empty_deadline(&self, deadline: Option<Instant>) -> bool {
        self.shared
            .wait_while(&self.shared.emptied, deadline, |v| !v.is_drained())
    }

    pub fn wait_until_actions_available(&self) {
        self.wait_until_actions_available_for(Duration::ZERO);
    }

    pub fn wait_until_actions_available_for(&self, timeout: Duration) -> bool {
        self.shared
            .wait_while(&self.shared.actions_available, deadline(timeout), |v| {
                v.actions.is_empty()
            })
    }

    pub fn wait_until_unpause(&self) {
        self.wait_until_unpause_for(Duration::ZERO);
    }

    pub fn wait_until_unpause_for(&self, timeout: Duration) -> bool {
        self.shared
            .wait_while(&self.shared.unpaused, deadline(timeout), |v| v.paused)
    }

    pub fn wait_until_ready(&self) {
        self.wait_until_ready_for(Duration::ZERO);
    }

    pub fn wait_until_ready_for(&self, timeout: Duration) -> bool {
        self.shared
            .wait_while(&self.shared.ready, deadline(timeout), |v| !v.is_ready())
    }
}

impl Drop for ActionQueue {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Debug for ActionQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionQueue")
            .field("database", self.id())
            .field("stats", &self.stats())
            .finish()
    }
}
