use crate::Result;
use std::{
    borrow::Borrow,
    fmt::{self, Debug, Display},
    sync::Arc,
};

/// Identity of a cluster member, used as the key of every per member structure.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DatabaseId(Arc<str>);

impl DatabaseId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Debug for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatabaseId({:?})", &*self.0)
    }
}

impl From<&str> for DatabaseId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for DatabaseId {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl Borrow<str> for DatabaseId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A member database of the cluster.
///
/// The queue engine never looks at the statements, it only hands them to
/// [`Database::execute`] from the worker thread bound to this member.
pub trait Database: Send + Sync {
    /// Unique identity of this member.
    fn id(&self) -> &DatabaseId;

    /// Execute one or more SQL statements and return the aggregated effect.
    fn execute(&self, sql: &str) -> Result<RowsAffected>;
}

pub type DatabaseRef = Arc<dyn Database>;

impl Debug for dyn Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Database({})", self.id())
    }
}

/// Metadata about modify operations (INSERT/UPDATE/DELETE).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsAffected {
    /// Total number of rows impacted.
    pub rows_affected: u64,
    /// Backend-specific last inserted / affected identifier when available.
    pub last_affected_id: Option<i64>,
}

impl Extend<RowsAffected> for RowsAffected {
    fn extend<T: IntoIterator<Item = RowsAffected>>(&mut self, iter: T) {
        for elem in iter {
            self.rows_affected += elem.rows_affected;
            if elem.last_affected_id.is_some() {
                self.last_affected_id = elem.last_affected_id;
            }
        }
    }
}
