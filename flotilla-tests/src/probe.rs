use flotilla::{Action, ActionRef, Context, Database, DatabaseId, Error, Intent, Result, RowsAffected};
use parking_lot::Mutex;
use std::{sync::Arc, thread, time::Duration};

/// Labels of the probes executed by each member, in execution order.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Mutex<Vec<(DatabaseId, String)>>,
}

impl Journal {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    pub fn record(&self, member: &DatabaseId, label: &str) {
        self.entries.lock().push((member.clone(), label.to_string()));
    }

    /// Labels executed by `member`.
    pub fn member(&self, member: &DatabaseId) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(id, _)| id == member)
            .map(|(_, label)| label.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Action that records its label in a [`Journal`] once its statements succeeded.
#[derive(Debug)]
pub struct Probe {
    label: String,
    journal: Arc<Journal>,
    statements: Vec<String>,
    delay: Duration,
    failing: bool,
}

impl Probe {
    pub fn new(label: impl Into<String>, journal: &Arc<Journal>) -> Self {
        Self {
            label: label.into(),
            journal: journal.clone(),
            statements: Vec::new(),
            delay: Duration::ZERO,
            failing: false,
        }
    }

    /// Insert the label into the probe table before recording it.
    pub fn writing(mut self) -> Self {
        self.statements.push(format!(
            "INSERT INTO {} (label) VALUES ('{}');",
            crate::PROBE_TABLE,
            self.label.replace('\'', "''")
        ));
        self
    }

    pub fn with_statement(mut self, sql: impl Into<String>) -> Self {
        self.statements.push(sql.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail without recording anything.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn into_ref(self) -> ActionRef {
        Arc::new(self)
    }
}

impl Action for Probe {
    fn intent(&self) -> Intent {
        if self.statements.is_empty() {
            Intent::NoOp
        } else {
            Intent::Insert
        }
    }

    fn sql_statements(&self, _database: &dyn Database) -> Vec<String> {
        self.statements.clone()
    }

    fn execute(&self, database: &dyn Database) -> Result<RowsAffected> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.failing {
            return Err(Error::msg(format!(
                "Probe `{}` failed on purpose on `{}`",
                self.label,
                database.id()
            )));
        }
        let mut result = RowsAffected::default();
        for sql in &self.statements {
            let affected = database
                .execute(sql)
                .with_context(|| format!("While running probe `{}`", self.label))?;
            result.extend([affected]);
        }
        self.journal.record(database.id(), &self.label);
        Ok(result)
    }
}
