//! Boundaries to the Kubernetes API.
//!
//! The reconciler only talks to the cluster through these traits so it can be
//! exercised against in-memory stores.

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    Api, Client, Resource, ResourceExt,
    api::{Patch, PatchParams, PostParams},
};
use serde_json::json;

use crate::{
    crds::{WebhookSecret, WebhookSecretStatus},
    error::Result,
};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn of<K: Resource>(obj: &K) -> Self {
        Self::new(obj.namespace().unwrap_or_default(), obj.name_any())
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[async_trait]
pub trait WebhookSecretStore: Send + Sync {
    async fn get(&self, key: &NamespacedName) -> Result<Option<WebhookSecret>>;

    /// Persists `finalizers` as the resource's complete finalizer list.
    async fn update_finalizers(
        &self,
        ws: &WebhookSecret,
        finalizers: Vec<String>,
    ) -> Result<WebhookSecret>;

    async fn update_status(
        &self,
        ws: &WebhookSecret,
        status: &WebhookSecretStatus,
    ) -> Result<WebhookSecret>;
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &NamespacedName) -> Result<Option<Secret>>;

    async fn create(&self, secret: &Secret) -> Result<Secret>;
}

/// Stores backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn webhook_secrets(&self, namespace: &str) -> Api<WebhookSecret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl WebhookSecretStore for KubeStore {
    async fn get(&self, key: &NamespacedName) -> Result<Option<WebhookSecret>> {
        Ok(self
            .webhook_secrets(&key.namespace)
            .get_opt(&key.name)
            .await?)
    }

    async fn update_finalizers(
        &self,
        ws: &WebhookSecret,
        finalizers: Vec<String>,
    ) -> Result<WebhookSecret> {
        let key = NamespacedName::of(ws);
        // The resourceVersion makes the patch fail if the object changed
        // since it was read.
        let patch = json!({
            "metadata": {
                "finalizers": finalizers,
                "resourceVersion": ws.resource_version(),
            }
        });
        Ok(self
            .webhook_secrets(&key.namespace)
            .patch(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn update_status(
        &self,
        ws: &WebhookSecret,
        status: &WebhookSecretStatus,
    ) -> Result<WebhookSecret> {
        let key = NamespacedName::of(ws);
        let patch = json!({ "status": status });
        Ok(self
            .webhook_secrets(&key.namespace)
            .patch_status(&key.name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }
}

#[async_trait]
impl SecretStore for KubeStore {
    async fn get(&self, key: &NamespacedName) -> Result<Option<Secret>> {
        let api = Api::<Secret>::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    async fn create(&self, secret: &Secret) -> Result<Secret> {
        let api = Api::<Secret>::namespaced(
            self.client.clone(),
            &secret.namespace().unwrap_or_default(),
        );
        Ok(api.create(&PostParams::default(), secret).await?)
    }
}
