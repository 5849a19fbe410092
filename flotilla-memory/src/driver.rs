use crate::MemoryDatabase;
use flotilla_core::{Context, Driver, Error, Result, decoded_host};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc, time::Duration};
use url::Url;

/// Connects `memory://<name>` members.
///
/// Connecting twice to the same name through the same driver (or a clone of
/// it) gives back the same database. Query parameters:
/// - `latency_ms=N` sleeps N milliseconds before every statement
/// - `fail_on=PREFIX` (repeatable) makes statements starting with PREFIX fail
#[derive(Clone, Default, Debug)]
pub struct MemoryDriver {
    databases: Arc<Mutex<HashMap<String, Arc<MemoryDatabase>>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A database previously connected through this driver.
    pub fn database(&self, name: &str) -> Option<Arc<MemoryDatabase>> {
        self.databases.lock().get(name).cloned()
    }
}

impl Driver for MemoryDriver {
    type Database = MemoryDatabase;

    const NAME: &'static str = "memory";

    fn connect(&self, url: &Url) -> Result<Arc<MemoryDatabase>> {
        self.check_scheme(url)?;
        let name = decoded_host(url)?;
        let database = self
            .databases
            .lock()
            .entry(name.clone())
            .or_insert_with(|| Arc::new(MemoryDatabase::new(name.as_str())))
            .clone();
        for (key, value) in url.query_pairs() {
            match &*key {
                "latency_ms" => {
                    let millis = value.parse::<u64>().with_context(|| {
                        format!("While reading `latency_ms` from `{}`", url)
                    })?;
                    database.set_latency(Duration::from_millis(millis));
                }
                "fail_on" => database.fail_on(&*value),
                _ => {
                    let error = Error::msg(format!(
                        "Unknown parameter `{}` in memory connection url `{}`",
                        key, url
                    ));
                    log::error!("{:#}", error);
                    return Err(error);
                }
            }
        }
        log::debug!("Connected memory member `{}`", name);
        Ok(database)
    }
}
