use crate::{Journal, PROBE_TABLE, Probe};
use flotilla::{ActionRef, ClusterDetails, Intent, MemberState, SqlAction, wait};
use std::{sync::Arc, time::Duration};

pub(crate) const REPLICATED: usize = 20;

pub async fn replication(cluster: &Arc<ClusterDetails>) {
    let journal = Journal::new();
    let members = cluster.queues().members();

    // Setup
    let schema: ActionRef = Arc::new(SqlAction::new(
        Intent::Schema,
        [format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY, label TEXT NOT NULL);",
            PROBE_TABLE
        )],
    ));
    assert_eq!(cluster.execute_on_all(schema), members.len());

    // Broadcast
    let labels = (0..REPLICATED)
        .map(|i| format!("replication_{}", i))
        .collect::<Vec<_>>();
    let reached = cluster.queues().queue_action_for_all_databases(
        labels
            .iter()
            .map(|label| Probe::new(label.as_str(), &journal).writing().into_ref()),
    );
    assert_eq!(reached, members.len());
    assert!(
        wait::cluster_drained(cluster.clone(), Duration::from_secs(10))
            .await
            .expect("Failed to wait for the cluster")
    );
    for id in &members {
        assert_eq!(journal.member(id), labels, "Wrong actions on `{}`", id);
    }
    assert_eq!(journal.len(), REPLICATED * members.len());

    // Single member
    let first = &members[0];
    assert!(
        cluster
            .queues()
            .queue_action(first, Probe::new("only_first", &journal).into_ref())
    );
    assert!(
        cluster
            .queues()
            .wait_until_ready_for(first, Duration::from_secs(10))
    );
    assert_eq!(
        journal.member(first).last().map(String::as_str),
        Some("only_first")
    );
    for id in &members[1..] {
        assert_eq!(journal.member(id).len(), REPLICATED);
    }

    // Status
    for status in cluster.statuses() {
        assert_eq!(status.state, MemberState::Ready, "`{}` is not ready", status.id);
        assert_eq!(status.stats.pending, 0);
        assert!(status.stats.started);
    }
}
