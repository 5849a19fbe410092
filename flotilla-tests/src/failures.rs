use crate::{Journal, Probe};
use flotilla::{ClusterDetails, wait};
use std::{sync::Arc, time::Duration};

pub async fn failures(cluster: &Arc<ClusterDetails>) {
    let journal = Journal::new();
    let members = cluster.queues().members();
    let failed = cluster
        .statuses()
        .into_iter()
        .map(|v| v.stats.failed)
        .collect::<Vec<_>>();

    crate::silent_logs! {
        cluster.queues().queue_action_for_all_databases([
            Probe::new("before_failure", &journal).into_ref(),
            Probe::new("failure", &journal).failing().into_ref(),
            Probe::new("after_failure", &journal).into_ref(),
        ]);
        assert!(
            wait::cluster_drained(cluster.clone(), Duration::from_secs(10))
                .await
                .expect("Failed to wait for the cluster")
        );
    }

    for (status, failed) in cluster.statuses().into_iter().zip(failed) {
        assert_eq!(status.stats.failed, failed + 1);
        assert!(status.stats.running, "`{}` stopped after a failure", status.id);
    }
    for id in &members {
        assert_eq!(journal.member(id), ["before_failure", "after_failure"]);
    }
}
