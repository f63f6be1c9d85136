//! Git hosting providers.
//!
//! A [`ClientFactory`] turns a [`Repository`] and an auth token into a
//! [`HooksClient`] bound to that one repository. The provider is picked from
//! the repository host by [`DriverIdentifier`], or from the resource's
//! explicit driver override for hosts it does not know.

use std::{fmt, str::FromStr};

use async_trait::async_trait;

use crate::{
    crds::Repository,
    error::{Error, Result},
};

mod drivers;
mod factory;
mod github;
mod gitlab;

pub use drivers::{DriverIdentifier, HostDriverIdentifier};
pub use factory::{ScmClientFactory, repo_from_url};
pub use github::GithubHooksClient;
pub use gitlab::GitlabHooksClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Driver {
    Github,
    Gitlab,
}

impl Driver {
    pub fn default_endpoint(self) -> &'static str {
        match self {
            Driver::Github => "https://api.github.com",
            Driver::Gitlab => "https://gitlab.com/api/v4",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Driver::Github => "github",
            Driver::Gitlab => "gitlab",
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Driver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Driver::Github),
            "gitlab" => Ok(Driver::Gitlab),
            _ => Err(Error::UnsupportedDriver(s.to_owned())),
        }
    }
}

/// Manages webhooks on a single repository.
#[async_trait]
pub trait HooksClient: Send + Sync {
    /// Registers a push webhook delivering to `hook_url`, signed with
    /// `secret`. Returns the provider's identifier for the new hook.
    async fn create(&self, hook_url: &str, secret: &str) -> Result<String>;

    async fn delete(&self, hook_id: &str) -> Result<()>;

    /// The `owner/name` path the client is bound to.
    fn repo(&self) -> &str;

    fn driver(&self) -> Driver;
}

#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn client_for(&self, repo: &Repository, token: &str) -> Result<Box<dyn HooksClient>>;
}

/// Maps an error response from a git host onto [`Error::Provider`].
pub(crate) async fn check_status(
    response: reqwest::Response,
    action: String,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.as_u16() < 400 {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.trim().is_empty() {
        action
    } else {
        format!("{action}: {}", body.trim())
    };
    Err(Error::Provider {
        status: status.as_u16(),
        message,
    })
}
