use flotilla_core::{Database, DatabaseId, Error, Result, RowsAffected, truncate_long};
use parking_lot::{Mutex, RwLock};
use std::{
    fmt::{self, Debug},
    thread,
    time::Duration,
};

/// A member that keeps the statements it executed instead of running them.
pub struct MemoryDatabase {
    id: DatabaseId,
    executed: Mutex<Vec<String>>,
    failing: RwLock<Vec<String>>,
    latency: RwLock<Duration>,
}

impl MemoryDatabase {
    pub fn new(id: impl Into<DatabaseId>) -> Self {
        Self {
            id: id.into(),
            executed: Default::default(),
            failing: Default::default(),
            latency: Default::default(),
        }
    }

    /// Statements executed so far, in execution order.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }

    /// Forget the statements executed so far.
    pub fn reset(&self) {
        self.executed.lock().clear();
    }

    /// Make every statement starting with `prefix` (ignoring case) fail from now on.
    pub fn fail_on(&self, prefix: impl Into<String>) {
        self.failing.write().push(prefix.into().to_uppercase());
    }

    /// Let every statement succeed again.
    pub fn heal(&self) {
        self.failing.write().clear();
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.write() = latency;
    }

    fn fails(&self, sql: &str) -> bool {
        let sql = sql.trim_start().to_uppercase();
        self.failing
            .read()
            .iter()
            .any(|prefix| sql.starts_with(prefix.as_str()))
    }
}

impl Database for MemoryDatabase {
    fn id(&self) -> &DatabaseId {
        &self.id
    }

    fn execute(&self, sql: &str) -> Result<RowsAffected> {
        let latency = *self.latency.read();
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        if self.fails(sql) {
            let error = Error::msg(format!(
                "Member `{}` refused the statement:\n{}",
                self.id,
                truncate_long!(sql)
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        let mut executed = self.executed.lock();
        executed.push(sql.to_string());
        let keyword = sql
            .trim_start()
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_uppercase();
        Ok(match keyword.as_str() {
            "INSERT" => RowsAffected {
                rows_affected: 1,
                last_affected_id: Some(executed.len() as i64),
            },
            "UPDATE" | "DELETE" => RowsAffected {
                rows_affected: 1,
                last_affected_id: None,
            },
            _ => RowsAffected::default(),
        })
    }
}

impl Debug for MemoryDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("id", &self.id)
            .field("executed", &self.executed.lock().len())
            .finish()
    }
}
