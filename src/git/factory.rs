use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::{
    ClientFactory, Driver, DriverIdentifier, GithubHooksClient, GitlabHooksClient, HooksClient,
    HostDriverIdentifier,
};
use crate::{
    crds::Repository,
    error::{Error, Result},
};

const USER_AGENT: &str = concat!("webhook-secret-operator/", env!("CARGO_PKG_VERSION"));

/// Builds [`HooksClient`]s for the GitHub and GitLab REST APIs.
///
/// The underlying HTTP connection pool is shared; credentials are bound to
/// each returned client and never cached here.
pub struct ScmClientFactory {
    drivers: Box<dyn DriverIdentifier>,
    http: reqwest::Client,
}

impl ScmClientFactory {
    pub fn new(drivers: impl DriverIdentifier + 'static, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(Error::Transport)?;
        Ok(Self {
            drivers: Box::new(drivers),
            http,
        })
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::new(HostDriverIdentifier::default(), timeout)
    }

    fn resolve_driver(&self, repo: &Repository) -> Result<Driver> {
        match self.drivers.identify(&repo.url) {
            Ok(driver) => Ok(driver),
            Err(err) if err.is_unknown_driver() => match repo.driver.as_deref() {
                Some(name) if !name.is_empty() => {
                    debug!(url = %repo.url, driver = name, "using driver override");
                    name.parse()
                }
                _ => Err(err),
            },
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl ClientFactory for ScmClientFactory {
    async fn client_for(&self, repo: &Repository, token: &str) -> Result<Box<dyn HooksClient>> {
        let driver = self.resolve_driver(repo)?;
        let endpoint = repo
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(driver.default_endpoint());
        let path = repo_from_url(&repo.url)?;
        debug!(url = %repo.url, %driver, endpoint, repo = %path, "identified git host");

        Ok(match driver {
            Driver::Github => Box::new(GithubHooksClient::new(
                self.http.clone(),
                endpoint,
                path,
                token,
            )),
            Driver::Gitlab => Box::new(GitlabHooksClient::new(
                self.http.clone(),
                endpoint,
                path,
                token,
            )),
        })
    }
}

/// Extracts the `owner/name` path from a repository URL.
pub fn repo_from_url(repo_url: &str) -> Result<String> {
    let parsed = Url::parse(repo_url).map_err(|source| Error::InvalidUrl {
        url: repo_url.to_owned(),
        source,
    })?;
    let path = parsed.path();
    let path = path.strip_suffix(".git").unwrap_or(path);
    Ok(path.trim_start_matches('/').to_owned())
}
