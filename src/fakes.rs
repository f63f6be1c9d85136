//! In-memory stand-ins for the cluster and git hosts.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use k8s_openapi::{
    ByteString, api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::Time,
};
use kube::api::ObjectMeta;

use crate::{
    crds::{
        AuthSecretReference, Repository, SecretTarget, WebhookDestination, WebhookSecret,
        WebhookSecretSpec, WebhookSecretStatus,
    },
    destination::{RouteLookup, RouteTarget},
    error::{Error, Result},
    git::{ClientFactory, Driver, HooksClient},
    secret::TokenGenerator,
    store::{NamespacedName, SecretStore, WebhookSecretStore},
};

pub const TEST_NAME: &str = "test-webhook-secret";
pub const TEST_NAMESPACE: &str = "test-webhook-ns";
pub const TEST_REPO_URL: &str = "https://github.com/example/example.git";
pub const TEST_REPO: &str = "example/example";
pub const TEST_SECRET_NAME: &str = "example-secret";
pub const TEST_AUTH_SECRET: &str = "auth-secret";
pub const TEST_AUTH_TOKEN: &str = "test-auth-token";
pub const TEST_HOOK_ID: &str = "1234567";

pub struct StaticToken(pub &'static str);

impl TokenGenerator for StaticToken {
    fn generate(&self) -> Result<String> {
        Ok(self.0.to_owned())
    }
}

pub fn webhook_secret(hook_url: &str) -> WebhookSecret {
    let mut ws = WebhookSecret::new(
        TEST_NAME,
        WebhookSecretSpec {
            repo: Repository {
                url: TEST_REPO_URL.to_owned(),
                ..Repository::default()
            },
            auth_secret_ref: AuthSecretReference {
                name: TEST_AUTH_SECRET.to_owned(),
                namespace: None,
            },
            secret_ref: SecretTarget {
                name: TEST_SECRET_NAME.to_owned(),
                ..SecretTarget::default()
            },
            webhook_destination: WebhookDestination {
                url: Some(hook_url.to_owned()),
                route_ref: None,
            },
        },
    );
    ws.metadata.namespace = Some(TEST_NAMESPACE.to_owned());
    ws.metadata.uid = Some("5c1e2d3f-0000-4000-8000-000000000001".to_owned());
    ws
}

pub fn terminating(mut ws: WebhookSecret) -> WebhookSecret {
    ws.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
    ws
}

pub fn opaque_secret(namespace: &str, name: &str, key: &str, value: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_owned()),
            namespace: Some(namespace.to_owned()),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([(
            key.to_owned(),
            ByteString(value.as_bytes().to_vec()),
        )])),
        ..Secret::default()
    }
}

#[derive(Default)]
struct ClusterState {
    webhook_secrets: BTreeMap<NamespacedName, WebhookSecret>,
    secrets: BTreeMap<NamespacedName, Secret>,
    routes: BTreeMap<NamespacedName, RouteTarget>,
    writes: Vec<String>,
    fail_status_updates: bool,
}

/// A tiny API server: objects are kept in maps and every write is logged.
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl FakeCluster {
    pub fn add_webhook_secret(&self, ws: WebhookSecret) {
        let mut state = self.state.lock().unwrap();
        state.webhook_secrets.insert(NamespacedName::of(&ws), ws);
    }

    pub fn add_secret(&self, secret: Secret) {
        let mut state = self.state.lock().unwrap();
        state.secrets.insert(NamespacedName::of(&secret), secret);
    }

    pub fn add_route(&self, namespace: &str, name: &str, host: &str, tls: bool) {
        let mut state = self.state.lock().unwrap();
        state.routes.insert(
            NamespacedName::new(namespace, name),
            RouteTarget {
                host: host.to_owned(),
                tls,
            },
        );
    }

    pub fn webhook_secret(&self, key: &NamespacedName) -> Option<WebhookSecret> {
        self.state.lock().unwrap().webhook_secrets.get(key).cloned()
    }

    pub fn secret(&self, key: &NamespacedName) -> Option<Secret> {
        self.state.lock().unwrap().secrets.get(key).cloned()
    }

    /// Writes in the order they happened, e.g. `create secret ns/name`.
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn fail_status_updates(&self) {
        self.state.lock().unwrap().fail_status_updates = true;
    }
}

fn conflict(message: String) -> Error {
    Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_owned(),
        message,
        reason: "Conflict".to_owned(),
        code: 409,
    }))
}

#[async_trait]
impl WebhookSecretStore for FakeCluster {
    async fn get(&self, key: &NamespacedName) -> Result<Option<WebhookSecret>> {
        Ok(self.webhook_secret(key))
    }

    async fn update_finalizers(
        &self,
        ws: &WebhookSecret,
        finalizers: Vec<String>,
    ) -> Result<WebhookSecret> {
        let key = NamespacedName::of(ws);
        let mut state = self.state.lock().unwrap();
        let stored = state
            .webhook_secrets
            .get_mut(&key)
            .ok_or_else(|| Error::not_found("WebhookSecret", &key.namespace, &key.name))?;
        stored.metadata.finalizers = Some(finalizers.clone());
        let updated = stored.clone();
        if updated.metadata.deletion_timestamp.is_some() && finalizers.is_empty() {
            state.webhook_secrets.remove(&key);
        }
        state.writes.push(format!("update finalizers {key} {finalizers:?}"));
        Ok(updated)
    }

    async fn update_status(
        &self,
        ws: &WebhookSecret,
        status: &WebhookSecretStatus,
    ) -> Result<WebhookSecret> {
        let key = NamespacedName::of(ws);
        let mut state = self.state.lock().unwrap();
        if state.fail_status_updates {
            return Err(conflict(format!("status of {key} is stale")));
        }
        let stored = state
            .webhook_secrets
            .get_mut(&key)
            .ok_or_else(|| Error::not_found("WebhookSecret", &key.namespace, &key.name))?;
        stored.status = Some(status.clone());
        let updated = stored.clone();
        state.writes.push(format!("update status {key}"));
        Ok(updated)
    }
}

#[async_trait]
impl SecretStore for FakeCluster {
    async fn get(&self, key: &NamespacedName) -> Result<Option<Secret>> {
        Ok(self.secret(key))
    }

    async fn create(&self, secret: &Secret) -> Result<Secret> {
        let key = NamespacedName::of(secret);
        let mut state = self.state.lock().unwrap();
        if state.secrets.contains_key(&key) {
            return Err(conflict(format!("secret {key} already exists")));
        }
        state.secrets.insert(key.clone(), secret.clone());
        state.writes.push(format!("create secret {key}"));
        Ok(secret.clone())
    }
}

#[async_trait]
impl RouteLookup for FakeCluster {
    async fn route(&self, key: &NamespacedName) -> Result<Option<RouteTarget>> {
        Ok(self.state.lock().unwrap().routes.get(key).cloned())
    }
}

#[derive(Default)]
pub struct HookRecord {
    /// `(repo, hook_url, secret)` for every created hook.
    pub created: Vec<(String, String, String)>,
    /// `(repo, hook_id)` for every deleted hook.
    pub deleted: Vec<(String, String)>,
    pub create_status: Option<u16>,
    pub delete_status: Option<u16>,
}

/// Hands out recording hooks clients when given the expected token.
#[derive(Clone)]
pub struct StubClientFactory {
    auth_token: String,
    hook_id: String,
    record: Arc<Mutex<HookRecord>>,
}

impl Default for StubClientFactory {
    fn default() -> Self {
        Self {
            auth_token: TEST_AUTH_TOKEN.to_owned(),
            hook_id: TEST_HOOK_ID.to_owned(),
            record: Arc::default(),
        }
    }
}

impl StubClientFactory {
    pub fn record(&self) -> std::sync::MutexGuard<'_, HookRecord> {
        self.record.lock().unwrap()
    }

    pub fn fail_create(&self, status: u16) {
        self.record().create_status = Some(status);
    }

    pub fn fail_delete(&self, status: u16) {
        self.record().delete_status = Some(status);
    }
}

#[async_trait]
impl ClientFactory for StubClientFactory {
    async fn client_for(&self, repo: &Repository, token: &str) -> Result<Box<dyn HooksClient>> {
        if token != self.auth_token {
            return Err(Error::Provider {
                status: 401,
                message: "failed to authenticate".to_owned(),
            });
        }
        Ok(Box::new(StubHooksClient {
            repo: crate::git::repo_from_url(&repo.url)?,
            hook_id: self.hook_id.clone(),
            record: self.record.clone(),
        }))
    }
}

struct StubHooksClient {
    repo: String,
    hook_id: String,
    record: Arc<Mutex<HookRecord>>,
}

#[async_trait]
impl HooksClient for StubHooksClient {
    async fn create(&self, hook_url: &str, secret: &str) -> Result<String> {
        let mut record = self.record.lock().unwrap();
        if let Some(status) = record.create_status {
            return Err(Error::Provider {
                status,
                message: format!("failed to create hook in repo {}", self.repo),
            });
        }
        record
            .created
            .push((self.repo.clone(), hook_url.to_owned(), secret.to_owned()));
        Ok(self.hook_id.clone())
    }

    async fn delete(&self, hook_id: &str) -> Result<()> {
        let mut record = self.record.lock().unwrap();
        if let Some(status) = record.delete_status {
            return Err(Error::Provider {
                status,
                message: format!("failed to delete hook {hook_id}"),
            });
        }
        record.deleted.push((self.repo.clone(), hook_id.to_owned()));
        Ok(())
    }

    fn repo(&self) -> &str {
        &self.repo
    }

    fn driver(&self) -> Driver {
        Driver::Github
    }
}
