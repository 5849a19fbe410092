#[cfg(test)]
mod tests {
    use flotilla_core::{
        ActionQueue, ActionRef, ClusterDetails, Database, DatabaseId, NoOpAction, Result,
        RowsAffected, wait,
    };
    use std::{sync::Arc, time::Duration};

    struct Member {
        id: DatabaseId,
    }

    impl Database for Member {
        fn id(&self) -> &DatabaseId {
            &self.id
        }
        fn execute(&self, _sql: &str) -> Result<RowsAffected> {
            Ok(Default::default())
        }
    }

    fn no_op(millis: u64) -> ActionRef {
        Arc::new(NoOpAction::with_delay(Duration::from_millis(millis)))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn queue_waits() {
        let queue = Arc::new(ActionQueue::new(Arc::new(Member { id: "db1".into() })));
        queue.start().expect("Could not start the queue");
        queue.pause();
        queue.add([no_op(20), no_op(20)]);
        assert!(
            !wait::drained(queue.clone(), Duration::from_millis(10))
                .await
                .expect("The wait failed")
        );
        queue.unpause();
        assert!(
            wait::drained(queue.clone(), Duration::from_secs(5))
                .await
                .expect("The wait failed")
        );
        assert!(
            wait::ready(queue.clone(), Duration::from_secs(5))
                .await
                .expect("The wait failed")
        );
        assert_eq!(queue.stats().executed, 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cluster_waits() {
        let cluster = Arc::new(ClusterDetails::new("waits"));
        for id in ["db1", "db2"] {
            cluster
                .add_member(Arc::new(Member { id: id.into() }))
                .expect("Could not add the member");
        }
        let ids = cluster.queues().members();
        cluster.queues().pause(&ids);
        assert_eq!(cluster.execute_on_all(no_op(10)), 2);
        assert!(
            !wait::any_ready(cluster.clone(), Duration::from_millis(10))
                .await
                .expect("The wait failed")
        );
        cluster.queues().unpause(&ids[..1]);
        assert!(
            wait::any_ready(cluster.clone(), Duration::from_secs(5))
                .await
                .expect("The wait failed")
        );
        assert!(
            !wait::cluster_drained(cluster.clone(), Duration::from_millis(20))
                .await
                .expect("The wait failed")
        );
        cluster.queues().unpause(&ids);
        assert!(
            wait::cluster_drained(cluster.clone(), Duration::from_secs(5))
                .await
                .expect("The wait failed")
        );
    }
}
