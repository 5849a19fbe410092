use crate::{Journal, Probe};
use flotilla::{ClusterDetails, wait};
use std::{sync::Arc, time::Duration};

pub async fn rejoin(cluster: &Arc<ClusterDetails>) {
    let journal = Journal::new();
    let members = cluster.queues().members();
    let (last, rest) = members.split_last().expect("The cluster has no members");
    let source = &rest[0];

    let database = cluster.remove_member(last).expect("Could not remove the member");
    assert!(!cluster.contains(last));

    // The source keeps the actions the removed member misses
    cluster.queues().pause([source]);
    assert_eq!(
        cluster.execute_on_all(Probe::new("while_away", &journal).writing().into_ref()),
        rest.len()
    );
    let copied = cluster
        .rejoin(database.clone(), source)
        .expect("Could not rejoin the cluster");
    assert_eq!(copied, 1);
    assert_eq!(cluster.queues().members(), members);
    assert_eq!(
        cluster.execute_on_all(Probe::new("after_rejoin", &journal).writing().into_ref()),
        members.len()
    );
    assert!(cluster.rejoin(database, source).is_err());

    cluster.queues().unpause([source]);
    assert!(
        wait::cluster_drained(cluster.clone(), Duration::from_secs(10))
            .await
            .expect("Failed to wait for the cluster")
    );
    for id in &members {
        assert_eq!(
            journal.member(id),
            ["while_away", "after_rejoin"],
            "Wrong actions on `{}`",
            id
        );
    }
}
