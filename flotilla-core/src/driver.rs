use crate::{Database, Error, Result};
use std::sync::Arc;
use url::Url;

/// Connects member databases from their URL.
///
/// Every driver owns a URL scheme (`NAME`), a member is configured as
/// `<NAME>://...`.
pub trait Driver {
    type Database: Database + 'static;

    const NAME: &'static str;

    fn connect(&self, url: &Url) -> Result<Arc<Self::Database>>;

    /// Returns an error when the url is not meant for this driver.
    fn check_scheme(&self, url: &Url) -> Result<()> {
        if url.scheme() != Self::NAME {
            let error = Error::msg(format!(
                "Expected {} connection url to start with `{}://`, found `{}`",
                Self::NAME,
                Self::NAME,
                url
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(())
    }
}
