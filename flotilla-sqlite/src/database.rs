use crate::{CBox, error_message_from_ptr};
use flotilla_core::{Context, Database, DatabaseId, Error, Result, RowsAffected, truncate_long};
use libsqlite3_sys::{
    SQLITE_OK, sqlite3, sqlite3_errmsg, sqlite3_exec, sqlite3_free, sqlite3_last_insert_rowid,
    sqlite3_total_changes,
};
use parking_lot::Mutex;
use std::{
    ffi::{CStr, CString, c_char, c_int, c_void},
    fmt::{self, Debug},
    ptr,
};

/// A member backed by a sqlite database file.
pub struct SqliteDatabase {
    id: DatabaseId,
    pub(crate) connection: Mutex<CBox<*mut sqlite3>>,
}

impl SqliteDatabase {
    pub(crate) fn new(id: DatabaseId, connection: CBox<*mut sqlite3>) -> Self {
        Self {
            id,
            connection: Mutex::new(connection),
        }
    }

    /// Run `sql` and read the first column of the last row as an integer.
    pub fn count(&self, sql: &str) -> Result<i64> {
        let mut value: Option<i64> = None;
        self.exec(sql, Some(first_column), &mut value as *mut _ as *mut c_void)?;
        value.ok_or_else(|| {
            let error = Error::msg(format!(
                "The query did not return an integer:\n{}",
                truncate_long!(sql)
            ));
            log::error!("{:#}", error);
            error
        })
    }

    fn exec(
        &self,
        sql: &str,
        callback: Option<Callback>,
        data: *mut c_void,
    ) -> Result<RowsAffected> {
        let context = || {
            format!(
                "While executing on sqlite member `{}`:\n{}",
                self.id,
                truncate_long!(sql)
            )
        };
        let sql = CString::new(sql).with_context(context)?;
        let connection = self.connection.lock();
        unsafe {
            let changes = sqlite3_total_changes(**connection);
            let last_id = sqlite3_last_insert_rowid(**connection);
            let mut message: *mut c_char = ptr::null_mut();
            let rc = sqlite3_exec(**connection, sql.as_ptr(), callback, data, &mut message);
            if rc != SQLITE_OK {
                let error = if message.is_null() {
                    Error::msg(error_message_from_ptr(&sqlite3_errmsg(**connection)).to_string())
                } else {
                    let error =
                        Error::msg(error_message_from_ptr(&(message as *const c_char)).to_string());
                    sqlite3_free(message as *mut c_void);
                    error
                }
                .context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
            let rows_affected = sqlite3_total_changes(**connection).saturating_sub(changes);
            let last = sqlite3_last_insert_rowid(**connection);
            Ok(RowsAffected {
                rows_affected: rows_affected as u64,
                last_affected_id: (last != last_id).then_some(last),
            })
        }
    }
}

type Callback =
    unsafe extern "C" fn(*mut c_void, c_int, *mut *mut c_char, *mut *mut c_char) -> c_int;

unsafe extern "C" fn first_column(
    data: *mut c_void,
    columns: c_int,
    values: *mut *mut c_char,
    _names: *mut *mut c_char,
) -> c_int {
    unsafe {
        let value = &mut *(data as *mut Option<i64>);
        *value = if columns > 0 && !(*values).is_null() {
            CStr::from_ptr(*values)
                .to_str()
                .ok()
                .and_then(|v| v.parse().ok())
        } else {
            None
        };
    }
    0
}

impl Database for SqliteDatabase {
    fn id(&self) -> &DatabaseId {
        &self.id
    }

    fn execute(&self, sql: &str) -> Result<RowsAffected> {
        self.exec(sql, None, ptr::null_mut())
    }
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("id", &self.id)
            .finish()
    }
}
