use crate::{Context, Database, Result, RowsAffected, truncate_long};
use std::{
    fmt::{self, Debug, Display},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

/// What an action does to the member it runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    NoOp,
    Insert,
    Update,
    Delete,
    Schema,
}

impl Intent {
    /// The intent of the action that undoes this one.
    pub fn reverse(self) -> Self {
        match self {
            Intent::Insert => Intent::Delete,
            Intent::Delete => Intent::Insert,
            other => other,
        }
    }
}

impl Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Intent::NoOp => "no-op",
            Intent::Insert => "insert",
            Intent::Update => "update",
            Intent::Delete => "delete",
            Intent::Schema => "schema",
        })
    }
}

/// A unit of write work replicated to the members of a cluster.
///
/// Actions are shared between queues as [`ActionRef`], the allocation itself
/// is the identity of the action: copying pending work from one member to
/// another hands out the very same action.
pub trait Action: Send + Sync + Debug {
    fn intent(&self) -> Intent;

    /// The literal statements this action would run on `database`.
    fn sql_statements(&self, database: &dyn Database) -> Vec<String>;

    /// Run the action. Defaults to executing every statement in order, stopping at the first error.
    fn execute(&self, database: &dyn Database) -> Result<RowsAffected> {
        let mut result = RowsAffected::default();
        for sql in self.sql_statements(database) {
            let affected = database.execute(&sql).with_context(|| {
                format!(
                    "While executing a {} action on `{}`:\n{}",
                    self.intent(),
                    database.id(),
                    truncate_long!(sql)
                )
            })?;
            result.extend([affected]);
        }
        Ok(result)
    }

    /// Actions that undo the effect of this one.
    fn revert_action_list(&self, _database: &dyn Database) -> Result<ActionList> {
        Ok(ActionList::new())
    }
}

pub type ActionRef = Arc<dyn Action>;
pub type ActionList = Vec<ActionRef>;

/// True when both references point to the same action.
pub fn same_action(a: &ActionRef, b: &ActionRef) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// An action waiting in the queue of a member.
#[derive(Debug, Clone)]
pub struct ActionMessage {
    action: ActionRef,
    sequence: u64,
    queued_at: Instant,
}

impl ActionMessage {
    pub(crate) fn new(action: ActionRef, sequence: u64) -> Self {
        Self {
            action,
            sequence,
            queued_at: Instant::now(),
        }
    }
    pub fn action(&self) -> &ActionRef {
        &self.action
    }
    pub fn into_action(self) -> ActionRef {
        self.action
    }
    /// Position of the message in the queue that accepted it, starting from 0.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
    pub fn queued_at(&self) -> Instant {
        self.queued_at
    }
}

/// Does nothing, optionally taking some time to do it.
#[derive(Debug, Default, Clone)]
pub struct NoOpAction {
    delay: Duration,
}

impl NoOpAction {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Action for NoOpAction {
    fn intent(&self) -> Intent {
        Intent::NoOp
    }

    fn sql_statements(&self, _database: &dyn Database) -> Vec<String> {
        Vec::new()
    }

    fn execute(&self, _database: &dyn Database) -> Result<RowsAffected> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        Ok(RowsAffected::default())
    }
}

/// Literal statements, identical on every member.
#[derive(Debug, Clone)]
pub struct SqlAction {
    intent: Intent,
    statements: Vec<String>,
    revert: Vec<String>,
}

impl SqlAction {
    pub fn new<S: Into<String>>(intent: Intent, statements: impl IntoIterator<Item = S>) -> Self {
        Self {
            intent,
            statements: statements.into_iter().map(Into::into).collect(),
            revert: Vec::new(),
        }
    }

    /// Statements that undo this action, they become its revert action list.
    pub fn with_revert<S: Into<String>>(mut self, statements: impl IntoIterator<Item = S>) -> Self {
        self.revert = statements.into_iter().map(Into::into).collect();
        self
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }
}

impl Action for SqlAction {
    fn intent(&self) -> Intent {
        self.intent
    }

    fn sql_statements(&self, _database: &dyn Database) -> Vec<String> {
        self.statements.clone()
    }

    fn revert_action_list(&self, _database: &dyn Database) -> Result<ActionList> {
        if self.revert.is_empty() {
            return Ok(ActionList::new());
        }
        Ok(vec![Arc::new(SqlAction::new(
            self.intent.reverse(),
            self.revert.iter().cloned(),
        ))])
    }
}
