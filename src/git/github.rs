use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Driver, HooksClient, check_status};
use crate::error::Result;

#[derive(Serialize)]
struct CreateHook<'a> {
    name: &'static str,
    active: bool,
    events: [&'static str; 1],
    config: HookConfig<'a>,
}

#[derive(Serialize)]
struct HookConfig<'a> {
    url: &'a str,
    content_type: &'static str,
    secret: &'a str,
}

#[derive(Deserialize)]
struct Hook {
    id: u64,
}

/// Repository hooks through the GitHub REST API.
#[derive(Clone, Debug)]
pub struct GithubHooksClient {
    http: reqwest::Client,
    endpoint: String,
    repo: String,
    token: String,
}

impl GithubHooksClient {
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

    fn hooks_url(&self) -> String {
        format!("{}/repos/{}/hooks", self.endpoint, self.repo)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
    }
}

#[async_trait]
impl HooksClient for GithubHooksClient {
    async fn create(&self, hook_url: &str, secret: &str) -> Result<String> {
        let body = CreateHook {
            name: "web",
            active: true,
            events: ["push"],
            config: HookConfig {
                url: hook_url,
                content_type: "json",
                secret,
            },
        };
        debug!(repo = %self.repo, hook_url, "creating GitHub hook");

        let response = self
            .request(self.http.post(self.hooks_url()))
            .json(&body)
            .send()
            .await?;
        let response = check_status(
            response,
            format!("failed to create hook in repo {}", self.repo),
        )
        .await?;
        let hook: Hook = response.json().await?;

        info!(repo = %self.repo, hook_id = hook.id, "created GitHub hook");
        Ok(hook.id.to_string())
    }

    async fn delete(&self, hook_id: &str) -> Result<()> {
        let url = format!("{}/{}", self.hooks_url(), hook_id);
        let response = self.request(self.http.delete(url)).send().await?;
        check_status(
            response,
            format!("failed to delete hook {hook_id} in repo {}", self.repo),
        )
        .await?;

        info!(repo = %self.repo, hook_id, "deleted GitHub hook");
        Ok(())
    }

    fn repo(&self) -> &str {
        &self.repo
    }

    fn driver(&self) -> Driver {
        Driver::Github
    }
}
