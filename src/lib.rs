use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    Api, Client,
    config::KubeConfigOptions,
    runtime::{Controller, controller::Action, watcher},
};
use tracing::{debug, error, info, warn};

pub mod auth;
pub mod config;
pub mod crds;
pub mod destination;
pub mod error;
pub mod git;
pub mod reconciler;
pub mod secret;
pub mod store;

#[cfg(test)]
mod fakes;

use config::Config;
use crds::*;
use error::Error;
use reconciler::Reconciler;
use secret::{MANAGED_BY, MANAGED_BY_LABEL, SecretFactory};
use store::{KubeStore, NamespacedName};

struct Context {
    reconciler: Reconciler,
    config: Config,
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let options = KubeConfigOptions::default();

    // Load kubeconfig if it's present otherwise fall back to cluster config
    let kube_config = kube::Config::from_kubeconfig(&options)
        .await
        .or_else(|_| kube::Config::incluster())?;
    let client = Client::try_from(kube_config)?;

    let store = Arc::new(KubeStore::new(client.clone()));
    let reconciler = Reconciler::new(
        store.clone(),
        store.clone(),
        store,
        Arc::new(git::ScmClientFactory::with_timeout(config.http_timeout())?),
        SecretFactory::default(),
    );

    let (webhook_secrets, secrets) = match config.namespace.as_deref() {
        Some(ns) => (
            Api::<WebhookSecret>::namespaced(client.clone(), ns),
            Api::<Secret>::namespaced(client.clone(), ns),
        ),
        None => (
            Api::<WebhookSecret>::all(client.clone()),
            Api::<Secret>::all(client.clone()),
        ),
    };
    let owned_secrets =
        watcher::Config::default().labels(&format!("{MANAGED_BY_LABEL}={MANAGED_BY}"));

    info!(namespace = ?config.namespace, "starting WebhookSecret controller");
    let ctx = Arc::new(Context { reconciler, config });

    Controller::new(webhook_secrets, watcher::Config::default())
        .owns(secrets, owned_secrets)
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("reconciled WebhookSecret '{}'", obj),
                Err(e) => error!("WebhookSecret controller error: {}", e),
            }
        })
        .await;

    info!("controller terminated");
    Ok(())
}

async fn reconcile(ws: Arc<WebhookSecret>, ctx: Arc<Context>) -> Result<Action, Error> {
    let outcome = ctx
        .reconciler
        .reconcile(&NamespacedName::of(ws.as_ref()))
        .await?;
    debug!(?outcome, "reconcile finished");
    Ok(Action::await_change())
}

fn error_policy(ws: Arc<WebhookSecret>, err: &Error, ctx: Arc<Context>) -> Action {
    warn!(
        namespace = ?ws.metadata.namespace,
        name = ?ws.metadata.name,
        error = %err,
        "reconcile failed, requeueing"
    );
    Action::requeue(ctx.config.error_requeue())
}
