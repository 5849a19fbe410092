use parking_lot::{Condvar, Mutex};
use std::time::Instant;

/// Broadcast notification shared by many queues.
///
/// Every notification bumps an epoch. A waiter reads the epoch, checks its
/// condition, then waits for the epoch to move: a notification landing
/// between the check and the wait is never lost.
#[derive(Debug, Default)]
pub(crate) struct Signal {
    epoch: Mutex<u64>,
    changed: Condvar,
}

impl Signal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn epoch(&self) -> u64 {
        *self.epoch.lock()
    }

    pub(crate) fn notify(&self) {
        let mut epoch = self.epoch.lock();
        *epoch = epoch.wrapping_add(1);
        self.changed.notify_all();
    }

    /// Blocks until the epoch differs from `seen`. Returns false if the deadline passed first.
    pub(crate) fn wait_past(&self, seen: u64, deadline: Option<Instant>) -> bool {
        let mut epoch = self.epoch.lock();
        while *epoch == seen {
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut epoch, deadline).timed_out() {
                        return *epoch != seen;
                    }
                }
                None => self.changed.wait(&mut epoch),
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::Signal;
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    #[test]
    fn wait_past_times_out() {
        let signal = Signal::new();
        let seen = signal.epoch();
        let start = Instant::now();
        assert!(!signal.wait_past(seen, Some(start + Duration::from_millis(20))));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn notification_before_wait_is_not_lost() {
        let signal = Signal::new();
        let seen = signal.epoch();
        signal.notify();
        assert!(signal.wait_past(seen, None));
    }

    #[test]
    fn notification_from_other_thread() {
        let signal = Arc::new(Signal::new());
        let seen = signal.epoch();
        let notifier = {
            let signal = signal.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                signal.notify();
            })
        };
        assert!(signal.wait_past(seen, Some(Instant::now() + Duration::from_secs(5))));
        assert_ne!(signal.epoch(), seen);
        notifier.join().expect("Notifier thread panicked");
    }
}
