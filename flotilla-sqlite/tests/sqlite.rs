#[cfg(test)]
mod tests {
    use flotilla_core::{ClusterConfig, Driver};
    use flotilla_sqlite::SqliteDriver;
    use flotilla_tests::{PROBE_ROWS, PROBE_TABLE, execute_tests, init_logs};
    use std::{path::Path, sync::Mutex};
    use tokio::fs;
    use url::Url;

    static MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test(flavor = "multi_thread")]
    async fn sqlite() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let paths = ["member_a", "member_b"]
            .map(|v| format!("{}/{}.sqlite", env!("CARGO_TARGET_TMPDIR"), v));
        for path in &paths {
            if Path::new(path).exists() {
                fs::remove_file(path).await.expect(
                    format!("Failed to remove existing test database file {}", path).as_str(),
                );
            }
        }
        let urls = paths.each_ref().map(|v| format!("sqlite://{}?mode=rwc", v));
        let config = ClusterConfig::parse("sqlite", &urls)
            .expect("Could not parse the cluster configuration");
        let cluster = execute_tests(SqliteDriver::new(), config).await;
        cluster.close();
        drop(cluster);
        for (path, url) in paths.iter().zip(&urls) {
            assert!(
                Path::new(path).exists(),
                "Database file should be created after connection"
            );
            let database = SqliteDriver::new()
                .connect(&Url::parse(url).unwrap())
                .expect("Could not open the database");
            let rows = database
                .count(&format!("SELECT COUNT(*) FROM {};", PROBE_TABLE))
                .expect("Could not count the rows");
            assert_eq!(rows as usize, PROBE_ROWS, "Wrong rows in `{}`", path);
        }
    }
}
