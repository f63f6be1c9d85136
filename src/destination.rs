use std::sync::Arc;

use async_trait::async_trait;
use kube::Api;
use kube_derive::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    crds::{RouteReference, WebhookDestination},
    error::{Error, Result},
    store::{KubeStore, NamespacedName},
};

/// The subset of an OpenShift Route that is needed to build a URL.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(group = "route.openshift.io", version = "v1", kind = "Route", namespaced)]
pub struct RouteSpec {
    #[serde(default)]
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<RouteTls>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct RouteTls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTarget {
    pub host: String,
    pub tls: bool,
}

#[async_trait]
pub trait RouteLookup: Send + Sync {
    async fn route(&self, key: &NamespacedName) -> Result<Option<RouteTarget>>;
}

#[async_trait]
impl RouteLookup for KubeStore {
    async fn route(&self, key: &NamespacedName) -> Result<Option<RouteTarget>> {
        let api = Api::<Route>::namespaced(self.client().clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?.map(|route| RouteTarget {
            host: route.spec.host,
            tls: route.spec.tls.is_some(),
        }))
    }
}

/// Turns a [`WebhookDestination`] into the URL the git host delivers to.
#[derive(Clone)]
pub struct DestinationResolver {
    routes: Arc<dyn RouteLookup>,
}

impl DestinationResolver {
    pub fn new(routes: Arc<dyn RouteLookup>) -> Self {
        Self { routes }
    }

    pub async fn resolve(
        &self,
        destination: &WebhookDestination,
        default_namespace: &str,
    ) -> Result<String> {
        if let Some(url) = destination.url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(url.to_owned());
        }

        let reference = destination.route_ref.as_ref().ok_or_else(|| {
            Error::InvalidResource("webhookDestination needs either url or routeRef".to_owned())
        })?;
        self.route_url(reference, default_namespace).await
    }

    async fn route_url(&self, reference: &RouteReference, default_namespace: &str) -> Result<String> {
        let namespace = reference
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(default_namespace);
        let key = NamespacedName::new(namespace, &reference.name);

        let route = self
            .routes
            .route(&key)
            .await?
            .ok_or_else(|| Error::not_found("Route", &key.namespace, &key.name))?;
        if route.host.is_empty() {
            return Err(Error::InvalidResource(format!("route {key} has no host")));
        }

        let scheme = if route.tls { "https" } else { "http" };
        let path = match reference.path.as_deref() {
            None | Some("") => "/".to_owned(),
            Some(p) if p.starts_with('/') => p.to_owned(),
            Some(p) => format!("/{p}"),
        };
        Ok(format!("{scheme}://{}{path}", route.host))
    }
}
