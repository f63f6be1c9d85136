use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Driver, HooksClient, check_status};
use crate::error::Result;

const PRIVATE_TOKEN: &str = "PRIVATE-TOKEN";

#[derive(Serialize)]
struct CreateHook<'a> {
    url: &'a str,
    token: &'a str,
    push_events: bool,
}

#[derive(Deserialize)]
struct Hook {
    id: u64,
}

/// Project hooks through the GitLab v4 REST API.
#[derive(Clone, Debug)]
pub struct GitlabHooksClient {
    http: reqwest::Client,
    endpoint: String,
    repo: String,
    token: String,
}

impl GitlabHooksClient {
    pub fn new(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        repo: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            repo: repo.into(),
            token: token.into(),
        }
    }

    // GitLab addresses projects by their URL-encoded full path.
    fn hooks_url(&self) -> String {
        let project: String = url::form_urlencoded::byte_serialize(self.repo.as_bytes()).collect();
        format!("{}/projects/{}/hooks", self.endpoint, project)
    }
}

#[async_trait]
impl HooksClient for GitlabHooksClient {
    async fn create(&self, hook_url: &str, secret: &str) -> Result<String> {
        debug!(repo = %self.repo, hook_url, "creating GitLab hook");

        let response = self
            .http
            .post(self.hooks_url())
            .header(PRIVATE_TOKEN, &self.token)
            .json(&CreateHook {
                url: hook_url,
                token: secret,
                push_events: true,
            })
            .send()
            .await?;
        let response = check_status(
            response,
            format!("failed to create hook in project {}", self.repo),
        )
        .await?;
        let hook: Hook = response.json().await?;

        info!(repo = %self.repo, hook_id = hook.id, "created GitLab hook");
        Ok(hook.id.to_string())
    }

    async fn delete(&self, hook_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/{}", self.hooks_url(), hook_id))
            .header(PRIVATE_TOKEN, &self.token)
            .send()
            .await?;
        check_status(
            response,
            format!("failed to delete hook {hook_id} in project {}", self.repo),
        )
        .await?;

        info!(repo = %self.repo, hook_id, "deleted GitLab hook");
        Ok(())
    }

    fn repo(&self) -> &str {
        &self.repo
    }

    fn driver(&self) -> Driver {
        Driver::Gitlab
    }
}
