use crate::{Journal, Probe};
use flotilla::{ClusterDetails, MemberState, wait};
use std::{sync::Arc, time::Duration};

pub async fn pause(cluster: &Arc<ClusterDetails>) {
    let journal = Journal::new();
    let members = cluster.queues().members();
    let (first, rest) = members.split_first().expect("The cluster has no members");
    let labels = ["paused_1", "paused_2"];

    cluster.queues().pause(rest);
    for label in labels {
        cluster.execute_on_all(
            Probe::new(label, &journal)
                .with_delay(Duration::from_millis(10))
                .into_ref(),
        );
    }
    assert!(
        wait::any_ready(cluster.clone(), Duration::from_secs(10))
            .await
            .expect("Failed to wait for a ready member")
    );
    assert_eq!(journal.member(first), labels);
    for id in rest {
        let status = cluster.member_status(id).expect("Missing member");
        assert_eq!(status.state, MemberState::Paused);
        assert_eq!(status.stats.pending, labels.len());
        assert!(journal.member(id).is_empty());
    }
    assert!(
        !cluster
            .queues()
            .wait_until_all_queues_are_empty_for(Duration::from_millis(20))
    );

    cluster.queues().unpause(rest);
    assert!(
        wait::cluster_drained(cluster.clone(), Duration::from_secs(10))
            .await
            .expect("Failed to wait for the cluster")
    );
    for id in &members {
        assert_eq!(journal.member(id), labels, "Wrong actions on `{}`", id);
    }
}
