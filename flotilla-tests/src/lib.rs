mod failures;
mod pause;
mod probe;
mod rejoin;
mod replication;

pub use probe::*;

use crate::{failures::failures, pause::pause, rejoin::rejoin, replication::replication};
use flotilla::{ClusterConfig, ClusterDetails, Driver};
use log::LevelFilter;
use std::{
    env,
    sync::{Arc, LazyLock},
};
use tokio::sync::Mutex;

/// Table the suite writes to, drivers can inspect it after [`execute_tests`].
pub const PROBE_TABLE: &str = "flotilla_probe";

/// Rows every member holds in [`PROBE_TABLE`] once [`execute_tests`] returned.
pub const PROBE_ROWS: usize = replication::REPLICATED + 2;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Run every replication scenario on a cluster of at least two members connected through `driver`.
pub async fn execute_tests<D: Driver>(driver: D, config: ClusterConfig) -> Arc<ClusterDetails> {
    assert!(
        config.members.len() >= 2,
        "The suite needs at least two members"
    );
    // Every run writes to the same table on shared members
    static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));
    let _lock = MUTEX.lock().await;
    let cluster = Arc::new(
        ClusterDetails::connect(&driver, &config).expect("Could not connect the cluster"),
    );
    assert_eq!(cluster.name(), config.name);
    assert_eq!(cluster.queues().size(), config.members.len());
    replication(&cluster).await;
    pause(&cluster).await;
    failures(&cluster).await;
    rejoin(&cluster).await;
    cluster
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
