#[cfg(test)]
mod tests {
    use flotilla_core::{
        Action, ActionQueue, ActionRef, Database, DatabaseId, Error, Intent, NoOpAction,
        QueueOptions, Result, RowsAffected, SqlAction,
    };
    use std::{
        sync::{
            Arc, Mutex,
            mpsc::{Receiver, Sender, channel},
        },
        thread,
        time::{Duration, Instant},
    };

    struct Recorder {
        id: DatabaseId,
        statements: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.into(),
                statements: Default::default(),
            })
        }
    }

    impl Database for Recorder {
        fn id(&self) -> &DatabaseId {
            &self.id
        }
        fn execute(&self, sql: &str) -> Result<RowsAffected> {
            self.statements.lock().unwrap().push(sql.into());
            Ok(RowsAffected {
                rows_affected: 1,
                last_affected_id: None,
            })
        }
    }

    #[derive(Debug)]
    struct Labeled {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Action for Labeled {
        fn intent(&self) -> Intent {
            Intent::Update
        }
        fn sql_statements(&self, _database: &dyn Database) -> Vec<String> {
            Vec::new()
        }
        fn execute(&self, _database: &dyn Database) -> Result<RowsAffected> {
            self.log.lock().unwrap().push(self.label);
            Ok(Default::default())
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl Action for Failing {
        fn intent(&self) -> Intent {
            Intent::Insert
        }
        fn sql_statements(&self, _database: &dyn Database) -> Vec<String> {
            Vec::new()
        }
        fn execute(&self, _database: &dyn Database) -> Result<RowsAffected> {
            Err(Error::msg("Expected failure"))
        }
    }

    #[derive(Debug)]
    struct Panicking;

    impl Action for Panicking {
        fn intent(&self) -> Intent {
            Intent::Delete
        }
        fn sql_statements(&self, _database: &dyn Database) -> Vec<String> {
            Vec::new()
        }
        fn execute(&self, _database: &dyn Database) -> Result<RowsAffected> {
            panic!("Expected panic")
        }
    }

    /// Blocks inside `execute` until released.
    #[derive(Debug)]
    struct Gated {
        entered: Sender<()>,
        release: Mutex<Receiver<()>>,
    }

    impl Gated {
        fn new() -> (Arc<Self>, Receiver<()>, Sender<()>) {
            let (entered, entered_rx) = channel();
            let (release_tx, release) = channel();
            (
                Arc::new(Self {
                    entered,
                    release: Mutex::new(release),
                }),
                entered_rx,
                release_tx,
            )
        }
    }

    impl Action for Gated {
        fn intent(&self) -> Intent {
            Intent::NoOp
        }
        fn sql_statements(&self, _database: &dyn Database) -> Vec<String> {
            Vec::new()
        }
        fn execute(&self, _database: &dyn Database) -> Result<RowsAffected> {
            let _ = self.entered.send(());
            let _ = self.release.lock().unwrap().recv();
            Ok(Default::default())
        }
    }

    fn labeled(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> ActionRef {
        Arc::new(Labeled {
            label,
            log: log.clone(),
        })
    }

    fn no_op(millis: u64) -> ActionRef {
        Arc::new(NoOpAction::with_delay(Duration::from_millis(millis)))
    }

    #[test]
    fn start_unstarted_queue() {
        let queue = ActionQueue::new(Recorder::new("alpha"));
        queue.pause();
        queue.add([no_op(0)]);
        assert!(!queue.is_empty());
        assert!(queue.has_actions_available());
        assert!(!queue.has_started());
        assert!(!queue.is_running());
        queue.start().expect("Could not start the queue");
        assert!(queue.has_started());
        assert!(queue.is_running());
        queue.start().expect("Starting twice must be harmless");
        assert!(!queue.is_empty(), "Paused queue must not consume actions");
    }

    #[test]
    fn unstarted_queue_keeps_actions() {
        let queue = ActionQueue::new(Recorder::new("alpha"));
        queue.add([no_op(0)]);
        assert!(!queue.is_empty());
        assert!(!queue.has_started());
        assert!(!queue.wait_until_empty_for(Duration::from_millis(30)));
        queue.start().expect("Could not start the queue");
        assert!(queue.has_started());
        assert!(queue.wait_until_empty_for(Duration::from_secs(5)));
    }

    #[test]
    fn wait_until_empty_takes_the_time_of_the_actions() {
        let queue = ActionQueue::new(Recorder::new("alpha"));
        queue.start().expect("Could not start the queue");
        let start = Instant::now();
        queue.add([no_op(100), no_op(100), no_op(100)]);
        queue.wait_until_empty();
        let elapsed = start.elapsed();
        assert!(elapsed > Duration::from_millis(300), "Took {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(2000), "Took {:?}", elapsed);
        assert_eq!(queue.stats().executed, 3);
    }

    #[test]
    fn fifo_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = ActionQueue::new(Recorder::new("alpha"));
        let labels = ["a1", "a2", "a3", "a4", "a5", "a6", "a7", "a8"];
        queue.add(labels.into_iter().map(|v| labeled(v, &log)));
        queue.start().expect("Could not start the queue");
        assert!(queue.wait_until_ready_for(Duration::from_secs(5)));
        assert_eq!(*log.lock().unwrap(), labels);
    }

    #[test]
    fn paused_queue_is_never_ready() {
        let queue = ActionQueue::new(Recorder::new("alpha"));
        queue.start().expect("Could not start the queue");
        queue.pause();
        queue.add((0..5).map(|_| no_op(0)));
        assert!(!queue.wait_until_ready_for(Duration::from_millis(10)));
        assert!(!queue.is_empty());
        assert_eq!(queue.len(), 5);
        queue.unpause();
        assert!(queue.wait_until_ready_for(Duration::from_millis(10_000)));
        assert!(queue.is_empty());
        assert_eq!(queue.stats().executed, 5);
    }

    #[test]
    fn pause_blocks_progress() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = Arc::new(ActionQueue::with_options(
            Recorder::new("alpha"),
            QueueOptions { paused: true },
        ));
        queue.start().expect("Could not start the queue");
        queue.add([labeled("first", &log), labeled("second", &log)]);
        thread::sleep(Duration::from_millis(50));
        assert!(!queue.is_empty());
        assert!(log.lock().unwrap().is_empty());

        let unpauser = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                queue.unpause();
            })
        };
        let start = Instant::now();
        assert!(queue.wait_until_unpause_for(Duration::from_secs(5)));
        assert!(start.elapsed() >= Duration::from_millis(90));
        unpauser.join().unwrap();
        assert!(queue.wait_until_ready_for(Duration::from_secs(5)));
        assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn wait_until_unpause_times_out() {
        let queue = ActionQueue::new(Recorder::new("alpha"));
        queue.pause();
        let start = Instant::now();
        assert!(!queue.wait_until_unpause_for(Duration::from_millis(40)));
        assert!(start.elapsed() >= Duration::from_millis(40));
        queue.unpause();
        assert!(queue.wait_until_unpause_for(Duration::from_millis(40)));
    }

    #[test]
    fn not_ready_while_executing() {
        let queue = ActionQueue::new(Recorder::new("alpha"));
        let (gated, entered, release) = Gated::new();
        queue.add([gated as ActionRef]);
        queue.start().expect("Could not start the queue");
        entered
            .recv_timeout(Duration::from_secs(5))
            .expect("The action did not start");
        assert!(queue.is_empty(), "Executing action is not pending");
        assert!(!queue.is_ready(), "Executing action keeps the queue busy");
        assert!(queue.stats().executing);
        assert!(!queue.wait_until_ready_for(Duration::from_millis(20)));
        assert!(!queue.wait_until_empty_for(Duration::from_millis(20)));
        release.send(()).unwrap();
        assert!(queue.wait_until_ready_for(Duration::from_secs(5)));
        assert!(!queue.stats().executing);
    }

    #[test]
    fn wait_until_actions_available() {
        let queue = Arc::new(ActionQueue::new(Recorder::new("alpha")));
        assert!(!queue.wait_until_actions_available_for(Duration::from_millis(20)));
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                queue.add([no_op(0)]);
            })
        };
        assert!(queue.wait_until_actions_available_for(Duration::from_secs(5)));
        assert!(queue.has_actions_available());
        producer.join().unwrap();
    }

    #[test]
    fn clear_discards_pending_actions() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = ActionQueue::new(Recorder::new("alpha"));
        queue.add([labeled("x", &log), labeled("y", &log), labeled("z", &log)]);
        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
        assert!(queue.wait_until_empty_for(Duration::from_millis(10)));
        queue.start().expect("Could not start the queue");
        assert!(queue.wait_until_ready_for(Duration::from_secs(5)));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(queue.stats().executed, 0);
    }

    #[test]
    fn head_of_queue() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = ActionQueue::new(Recorder::new("alpha"));
        let first = labeled("first", &log);
        queue.add([first.clone(), labeled("second", &log)]);
        let head = queue.get_head_of_queue();
        assert!(flotilla_core::same_action(head.action(), &first));
        assert_eq!(head.sequence(), 0);
        assert_eq!(queue.get_head_of_queue().sequence(), 1);
        assert!(queue.is_empty());
        assert!(
            queue
                .get_head_of_queue_for(Duration::from_millis(20))
                .is_none()
        );
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn failures_do_not_stop_the_worker() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let queue = ActionQueue::new(Recorder::new("alpha"));
        queue.start().expect("Could not start the queue");
        queue.add([
            labeled("before", &log),
            Arc::new(Failing) as ActionRef,
            Arc::new(Panicking) as ActionRef,
            labeled("after", &log),
        ]);
        assert!(queue.wait_until_ready_for(Duration::from_secs(5)));
        assert_eq!(*log.lock().unwrap(), ["before", "after"]);
        let stats = queue.stats();
        assert_eq!(stats.executed, 2);
        assert_eq!(stats.failed, 2);
        assert!(queue.has_started());
    }

    #[test]
    fn sql_actions_reach_the_database() {
        let database = Recorder::new("alpha");
        let queue = ActionQueue::new(database.clone());
        queue.start().expect("Could not start the queue");
        queue.add([
            Arc::new(SqlAction::new(
                Intent::Schema,
                ["CREATE TABLE t (id INTEGER)"],
            )) as ActionRef,
            Arc::new(SqlAction::new(
                Intent::Insert,
                ["INSERT INTO t VALUES (1)", "INSERT INTO t VALUES (2)"],
            )),
        ]);
        assert!(queue.wait_until_ready_for(Duration::from_secs(5)));
        assert_eq!(
            *database.statements.lock().unwrap(),
            [
                "CREATE TABLE t (id INTEGER)",
                "INSERT INTO t VALUES (1)",
                "INSERT INTO t VALUES (2)",
            ]
        );
    }

    #[test]
    fn stop_keeps_pending_actions() {
        let queue = ActionQueue::new(Recorder::new("alpha"));
        queue.start().expect("Could not start the queue");
        assert!(queue.wait_until_ready_for(Duration::from_secs(5)));
        queue.stop();
        assert!(!queue.is_running());
        assert!(!queue.is_ready());
        let start = Instant::now();
        while queue.has_started() {
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "The worker thread did not exit"
            );
            thread::sleep(Duration::from_millis(5));
        }
        queue.add([no_op(0), no_op(0)]);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(queue.len(), 2);
        queue.start().expect("Could not restart the queue");
        assert!(queue.wait_until_ready_for(Duration::from_secs(5)));
        assert_eq!(queue.stats().executed, 2);
    }

    #[test]
    fn restart_while_executing_never_overlaps() {
        let queue = ActionQueue::new(Recorder::new("alpha"));
        let (gated, entered, release) = Gated::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.add([gated as ActionRef, labeled("next", &log)]);
        queue.start().expect("Could not start the queue");
        entered
            .recv_timeout(Duration::from_secs(5))
            .expect("The action did not start");
        queue.stop();
        queue.start().expect("Could not restart the queue");
        thread::sleep(Duration::from_millis(50));
        assert!(
            log.lock().unwrap().is_empty(),
            "The next action ran while the previous one was executing"
        );
        release.send(()).unwrap();
        assert!(queue.wait_until_ready_for(Duration::from_secs(5)));
        assert_eq!(*log.lock().unwrap(), ["next"]);
    }

    #[test]
    fn add_all_copies_pending_actions() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = ActionQueue::new(Recorder::new("source"));
        let destination = ActionQueue::new(Recorder::new("destination"));
        source.add([labeled("1", &log), labeled("2", &log)]);
        destination.add([labeled("0", &log)]);
        assert_eq!(destination.add_all(&source), 2);
        assert_eq!(source.len(), 2);
        assert_eq!(destination.len(), 3);
        destination.start().expect("Could not start the queue");
        assert!(destination.wait_until_ready_for(Duration::from_secs(5)));
        assert_eq!(*log.lock().unwrap(), ["0", "1", "2"]);
    }

    #[test]
    fn revert_action_list() {
        let database = Recorder::new("alpha");
        let action = SqlAction::new(Intent::Insert, ["INSERT INTO t VALUES (1)"])
            .with_revert(["DELETE FROM t WHERE id = 1"]);
        let revert = action
            .revert_action_list(&*database)
            .expect("Could not build the revert actions");
        assert_eq!(revert.len(), 1);
        assert_eq!(revert[0].intent(), Intent::Delete);
        assert_eq!(
            revert[0].sql_statements(&*database),
            ["DELETE FROM t WHERE id = 1"]
        );
        assert!(
            NoOpAction::new()
                .revert_action_list(&*database)
                .unwrap()
                .is_empty()
        );
    }
}
