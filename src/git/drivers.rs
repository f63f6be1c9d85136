use std::collections::HashMap;

use url::Url;

use super::Driver;
use crate::error::{Error, Result};

pub trait DriverIdentifier: Send + Sync {
    fn identify(&self, repo_url: &str) -> Result<Driver>;
}

/// Identifies drivers by looking up the URL host in a fixed table.
#[derive(Clone, Debug)]
pub struct HostDriverIdentifier {
    hosts: HashMap<String, Driver>,
}

impl Default for HostDriverIdentifier {
    fn default() -> Self {
        Self {
            hosts: HashMap::from([
                ("github.com".to_owned(), Driver::Github),
                ("gitlab.com".to_owned(), Driver::Gitlab),
            ]),
        }
    }
}

impl DriverIdentifier for HostDriverIdentifier {
    fn identify(&self, repo_url: &str) -> Result<Driver> {
        let parsed = Url::parse(repo_url).map_err(|source| Error::InvalidUrl {
            url: repo_url.to_owned(),
            source,
        })?;

        parsed
            .host_str()
            .and_then(|host| self.hosts.get(host))
            .copied()
            .ok_or_else(|| Error::UnknownDriver(repo_url.to_owned()))
    }
}
