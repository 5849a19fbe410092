use crate::{Context, Error, Result};
use std::env;
use url::Url;
use urlencoding::decode;

/// Name and member URLs of a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub name: String,
    pub members: Vec<Url>,
}

impl ClusterConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn parse<S: AsRef<str>>(
        name: impl Into<String>,
        urls: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        urls.into_iter()
            .try_fold(Self::new(name), |config, url| config.member(url.as_ref()))
    }

    /// Read a comma separated list of member URLs from the environment variable `var`.
    pub fn from_env(name: impl Into<String>, var: &str) -> Result<Self> {
        let value = env::var(var)
            .with_context(|| format!("Cannot read the cluster members from `{}`", var))?;
        Self::parse(
            name,
            value.split(',').map(str::trim).filter(|v| !v.is_empty()),
        )
    }

    /// Add a member by URL.
    pub fn member(mut self, url: &str) -> Result<Self> {
        let url = Url::parse(url)
            .with_context(|| format!("While parsing the member url `{}`", url))?;
        if self.members.contains(&url) {
            return Err(Error::msg(format!(
                "Member `{}` appears twice in cluster `{}`",
                url, self.name
            )));
        }
        self.members.push(url);
        Ok(self)
    }
}

/// The percent decoded host of `url`, drivers use it to name members.
pub fn decoded_host(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::msg(format!("Expected a member name in `{}`", url)))?;
    Ok(decode(host)
        .with_context(|| format!("While decoding the member name of `{}`", url))?
        .into_owned())
}
