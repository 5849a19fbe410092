use crate::{CBox, SqliteDatabase, error_message_from_ptr};
use flotilla_core::{Context, Driver, Error, Result};
use libsqlite3_sys::{
    SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI,
    sqlite3, sqlite3_busy_timeout, sqlite3_close, sqlite3_errmsg, sqlite3_errstr, sqlite3_open_v2,
};
use std::{ffi::CString, ptr, sync::Arc};
use url::Url;

/// Milliseconds a statement waits for a lock held by another connection.
const BUSY_TIMEOUT: i32 = 5_000;

/// Connects `sqlite:///absolute/path.sqlite?mode=rwc` members.
///
/// The query string is handed to sqlite as URI parameters, the member is
/// identified by the url without them.
#[derive(Clone, Copy, Default, Debug)]
pub struct SqliteDriver;

impl SqliteDriver {
    pub const fn new() -> Self {
        Self
    }
}

impl Driver for SqliteDriver {
    type Database = SqliteDatabase;

    const NAME: &'static str = "sqlite";

    fn connect(&self, url: &Url) -> Result<Arc<SqliteDatabase>> {
        self.check_scheme(url)?;
        if url.host_str().is_some_and(|v| !v.is_empty()) || url.path().len() < 2 {
            let error = Error::msg(format!(
                "Expected sqlite connection url with an absolute path (`sqlite:///path/to/file`), found `{}`",
                url
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        let mut uri = format!("file:{}", url.path());
        if let Some(query) = url.query() {
            uri.push('?');
            uri.push_str(query);
        }
        let context = || format!("While opening the sqlite member `{}`", url);
        let uri = CString::new(uri).with_context(context)?;
        let mut connection: CBox<*mut sqlite3>;
        unsafe {
            connection = CBox::new(ptr::null_mut(), |p| {
                sqlite3_close(p);
            });
            let rc = sqlite3_open_v2(
                uri.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE | SQLITE_OPEN_URI | SQLITE_OPEN_FULLMUTEX,
                ptr::null(),
            );
            if rc != SQLITE_OK {
                let message = if connection.is_null() {
                    error_message_from_ptr(&sqlite3_errstr(rc)).to_string()
                } else {
                    error_message_from_ptr(&sqlite3_errmsg(*connection)).to_string()
                };
                let error = Error::msg(message).context(context());
                log::error!("{:#}", error);
                return Err(error);
            }
            sqlite3_busy_timeout(*connection, BUSY_TIMEOUT);
        }
        let mut id = url.clone();
        id.set_query(None);
        log::debug!("Connected sqlite member `{}`", id);
        Ok(Arc::new(SqliteDatabase::new(id.as_str().into(), connection)))
    }
}
