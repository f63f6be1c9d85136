use std::sync::Arc;

use kube::{Resource, ResourceExt};
use tracing::{debug, info, instrument, warn};

use crate::{
    auth::AuthTokenResolver,
    crds::{Condition, WebhookSecret, WrittenSecretRef},
    destination::{DestinationResolver, RouteLookup},
    error::{Error, Result},
    git::ClientFactory,
    secret::{SecretFactory, secret_value},
    store::{NamespacedName, SecretStore, WebhookSecretStore},
};

pub const FINALIZER: &str = "webhooksecrets.homerow.ca/finalizer";

pub mod reasons {
    pub const WEBHOOK_CREATED: &str = "WebhookCreated";
    pub const SECRET_CREATE_FAILED: &str = "SecretCreateFailed";
    pub const AUTH_TOKEN_UNAVAILABLE: &str = "AuthTokenUnavailable";
    pub const CLIENT_UNAVAILABLE: &str = "ClientUnavailable";
    pub const DESTINATION_UNAVAILABLE: &str = "DestinationUnavailable";
    pub const WEBHOOK_CREATE_FAILED: &str = "WebhookCreateFailed";
}

/// Where a resource is in its lifecycle, from its deletion timestamp and
/// whether it still carries our finalizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Live, finalizer not yet added.
    Fresh,
    /// Live, finalizer present.
    Active,
    /// Being deleted, webhook cleanup still owed.
    Terminating,
    /// Being deleted, nothing left for us to do.
    Terminated,
}

impl LifecycleState {
    pub fn of(ws: &WebhookSecret) -> Self {
        let deleting = ws.meta().deletion_timestamp.is_some();
        let finalized = ws.finalizers().iter().any(|f| f == FINALIZER);
        match (deleting, finalized) {
            (false, false) => LifecycleState::Fresh,
            (false, true) => LifecycleState::Active,
            (true, true) => LifecycleState::Terminating,
            (true, false) => LifecycleState::Terminated,
        }
    }
}

/// What a successful reconcile did. None of these need a requeue; the next
/// change to the resource or its secret triggers the next run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The resource no longer exists.
    Absent,
    /// The secret and webhook were already in place; nothing was written.
    AlreadyProvisioned,
    /// A webhook was created.
    Provisioned { webhook_id: String },
    /// The webhook is gone and the finalizer was removed.
    CleanedUp,
    /// Deletion is in progress and no cleanup is owed.
    Terminated,
}

/// A provisioning error together with the step that produced it.
struct Failure {
    reason: &'static str,
    error: Error,
}

fn at(reason: &'static str) -> impl FnOnce(Error) -> Failure {
    move |error| Failure { reason, error }
}

/// Provisions the secret and webhook declared by a [`WebhookSecret`], and
/// removes the webhook again when the resource is deleted.
pub struct Reconciler {
    resources: Arc<dyn WebhookSecretStore>,
    secrets: Arc<dyn SecretStore>,
    secret_factory: SecretFactory,
    clients: Arc<dyn ClientFactory>,
    auth: AuthTokenResolver,
    destinations: DestinationResolver,
}

impl Reconciler {
    pub fn new(
        resources: Arc<dyn WebhookSecretStore>,
        secrets: Arc<dyn SecretStore>,
        routes: Arc<dyn RouteLookup>,
        clients: Arc<dyn ClientFactory>,
        secret_factory: SecretFactory,
    ) -> Self {
        Self {
            resources,
            auth: AuthTokenResolver::new(secrets.clone()),
            secrets,
            secret_factory,
            clients,
            destinations: DestinationResolver::new(routes),
        }
    }

    #[instrument(skip(self), fields(namespace = %key.namespace, name = %key.name))]
    pub async fn reconcile(&self, key: &NamespacedName) -> Result<ReconcileOutcome> {
        info!("Reconciling WebhookSecret");

        let Some(mut ws) = self.resources.get(key).await? else {
            debug!("WebhookSecret no longer exists");
            return Ok(ReconcileOutcome::Absent);
        };

        match LifecycleState::of(&ws) {
            LifecycleState::Fresh => {
                let mut finalizers = ws.finalizers().to_vec();
                finalizers.push(FINALIZER.to_owned());
                ws = self.resources.update_finalizers(&ws, finalizers).await?;
                debug!("added finalizer");
            }
            LifecycleState::Active => {}
            LifecycleState::Terminating => {
                self.teardown(&ws).await?;
                let finalizers = ws
                    .finalizers()
                    .iter()
                    .filter(|f| *f != FINALIZER)
                    .cloned()
                    .collect();
                self.resources.update_finalizers(&ws, finalizers).await?;
                info!("removed finalizer");
                return Ok(ReconcileOutcome::CleanedUp);
            }
            LifecycleState::Terminated => return Ok(ReconcileOutcome::Terminated),
        }

        match self.provision(&mut ws).await {
            Ok(outcome) => Ok(outcome),
            Err(Failure { reason, error }) => {
                warn!(reason, error = %error, "provisioning failed");
                self.record_failure(&ws, reason, &error).await;
                Err(error)
            }
        }
    }

    async fn provision(&self, ws: &mut WebhookSecret) -> Result<ReconcileOutcome, Failure> {
        let namespace = ws.namespace().unwrap_or_default();
        let secret_key = ws.spec.secret_ref.key_or_default().to_owned();

        let mut desired = self
            .secret_factory
            .create_secret(ws)
            .map_err(at(reasons::SECRET_CREATE_FAILED))?;
        if desired.namespace().as_deref() != Some(namespace.as_str()) {
            return Err(Failure {
                reason: reasons::SECRET_CREATE_FAILED,
                error: Error::InvalidResource(
                    "secretRef.namespace must match the WebhookSecret namespace".to_owned(),
                ),
            });
        }
        let owner = ws.controller_owner_ref(&()).ok_or_else(|| Failure {
            reason: reasons::SECRET_CREATE_FAILED,
            error: Error::InvalidResource("WebhookSecret has no uid".to_owned()),
        })?;
        desired.metadata.owner_references = Some(vec![owner]);
        let secret_id = NamespacedName::of(&desired);

        let existing = self
            .secrets
            .get(&secret_id)
            .await
            .map_err(at(reasons::SECRET_CREATE_FAILED))?;
        let token = match existing {
            Some(_) if ws.webhook_id().is_some() => {
                info!(secret = %secret_id, "Skip reconcile: Secret and webhook already exist");
                return Ok(ReconcileOutcome::AlreadyProvisioned);
            }
            Some(found) => {
                info!(secret = %secret_id, "Secret exists without a webhook, reusing its token");
                secret_value(&found, &secret_key)
            }
            None => {
                info!(secret = %secret_id, "Creating a new Secret");
                self.secrets
                    .create(&desired)
                    .await
                    .map_err(at(reasons::SECRET_CREATE_FAILED))?;
                secret_value(&desired, &secret_key)
            }
        }
        .ok_or_else(|| Failure {
            reason: reasons::SECRET_CREATE_FAILED,
            error: Error::MissingKey {
                namespace: secret_id.namespace.clone(),
                name: secret_id.name.clone(),
                key: secret_key.clone(),
            },
        })?;

        let written = WrittenSecretRef {
            name: secret_id.name.clone(),
            namespace: secret_id.namespace.clone(),
            key: secret_key,
        };
        let mut status = ws.status_or_default();
        if status.secret_ref.as_ref() != Some(&written) {
            status.secret_ref = Some(written);
            *ws = self
                .resources
                .update_status(ws, &status)
                .await
                .map_err(at(reasons::SECRET_CREATE_FAILED))?;
        }

        let auth_token = self
            .auth
            .resolve(&ws.spec.auth_secret_ref, &namespace)
            .await
            .map_err(at(reasons::AUTH_TOKEN_UNAVAILABLE))?;
        let client = self
            .clients
            .client_for(&ws.spec.repo, &auth_token)
            .await
            .map_err(at(reasons::CLIENT_UNAVAILABLE))?;
        let hook_url = self
            .destinations
            .resolve(&ws.spec.webhook_destination, &namespace)
            .await
            .map_err(at(reasons::DESTINATION_UNAVAILABLE))?;

        let webhook_id = client
            .create(&hook_url, &token)
            .await
            .map_err(at(reasons::WEBHOOK_CREATE_FAILED))?;
        info!(%webhook_id, repo = client.repo(), driver = %client.driver(), %hook_url, "created webhook");

        status.webhook_id = Some(webhook_id.clone());
        status.set_condition(
            Condition::ready(
                true,
                reasons::WEBHOOK_CREATED,
                format!("webhook {webhook_id} delivers to {hook_url}"),
            )
            .with_generation(ws.metadata.generation),
        );
        *ws = self
            .resources
            .update_status(ws, &status)
            .await
            .map_err(at(reasons::WEBHOOK_CREATE_FAILED))?;

        Ok(ReconcileOutcome::Provisioned { webhook_id })
    }

    async fn teardown(&self, ws: &WebhookSecret) -> Result<()> {
        let Some(webhook_id) = ws.webhook_id() else {
            info!("no webhook was recorded, nothing to delete");
            return Ok(());
        };
        let namespace = ws.namespace().unwrap_or_default();

        let auth_token = self
            .auth
            .resolve(&ws.spec.auth_secret_ref, &namespace)
            .await?;
        let client = self.clients.client_for(&ws.spec.repo, &auth_token).await?;

        match client.delete(webhook_id).await {
            Ok(()) => info!(webhook_id, repo = client.repo(), "deleted webhook"),
            Err(err) if err.is_not_found() => {
                warn!(webhook_id, repo = client.repo(), "webhook was already deleted")
            }
            Err(err) => return Err(err),
        }
        Ok(())
    }

    /// Surfaces a provisioning failure as a `Ready=False` condition. Only
    /// writes when the condition changed, and never masks the original error.
    async fn record_failure(&self, ws: &WebhookSecret, reason: &str, error: &Error) {
        let condition =
            Condition::ready(false, reason, error.to_string()).with_generation(ws.metadata.generation);
        let mut status = ws.status_or_default();
        if status
            .condition(&condition.type_)
            .is_some_and(|c| c.same_as(&condition))
        {
            return;
        }
        status.set_condition(condition);
        if let Err(err) = self.resources.update_status(ws, &status).await {
            warn!(error = %err, "failed to record the failure in status");
        }
    }
}
