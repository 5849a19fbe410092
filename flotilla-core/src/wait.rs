//! Barrier waits for async callers.
//!
//! Each wait runs on the blocking thread pool of the current tokio runtime.
//! Dropping the future does not cancel the wait, the blocking thread is
//! released when the condition holds or the timeout elapses.
use crate::{ActionQueue, ClusterDetails, Context, Result};
use std::{sync::Arc, time::Duration};
use tokio::task::spawn_blocking;

/// Resolves to true once `queue` is ready, false if the timeout elapsed first.
pub async fn ready(queue: Arc<ActionQueue>, timeout: Duration) -> Result<bool> {
    spawn_blocking(move || queue.wait_until_ready_for(timeout))
        .await
        .context("The queue readiness wait did not complete")
}

/// Resolves to true once `queue` has nothing pending nor executing, false if the timeout elapsed first.
pub async fn drained(queue: Arc<ActionQueue>, timeout: Duration) -> Result<bool> {
    spawn_blocking(move || queue.wait_until_empty_for(timeout))
        .await
        .context("The queue drain wait did not complete")
}

/// Resolves to true once every queue of the cluster has nothing pending.
pub async fn cluster_drained(cluster: Arc<ClusterDetails>, timeout: Duration) -> Result<bool> {
    spawn_blocking(move || cluster.queues().wait_until_all_queues_are_empty_for(timeout))
        .await
        .context("The cluster drain wait did not complete")
}

/// Resolves to true once at least one queue of the cluster is ready.
pub async fn any_ready(cluster: Arc<ClusterDetails>, timeout: Duration) -> Result<bool> {
    spawn_blocking(move || cluster.queues().wait_until_a_queue_is_ready_for(timeout))
        .await
        .context("The cluster readiness wait did not complete")
}
