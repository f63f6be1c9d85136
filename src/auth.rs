use std::sync::Arc;

use crate::{
    crds::AuthSecretReference,
    error::{Error, Result},
    secret::secret_value,
    store::{NamespacedName, SecretStore},
};

/// Key the git host token is stored under in the auth secret.
pub const AUTH_TOKEN_KEY: &str = "token";

/// Reads git host credentials from externally managed secrets.
#[derive(Clone)]
pub struct AuthTokenResolver {
    secrets: Arc<dyn SecretStore>,
}

impl AuthTokenResolver {
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self { secrets }
    }

    pub async fn resolve(
        &self,
        reference: &AuthSecretReference,
        default_namespace: &str,
    ) -> Result<String> {
        let namespace = reference
            .namespace
            .as_deref()
            .filter(|ns| !ns.is_empty())
            .unwrap_or(default_namespace);
        let key = NamespacedName::new(namespace, &reference.name);

        let secret = self
            .secrets
            .get(&key)
            .await?
            .ok_or_else(|| Error::not_found("Secret", &key.namespace, &key.name))?;

        secret_value(&secret, AUTH_TOKEN_KEY)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::MissingKey {
                namespace: key.namespace,
                name: key.name,
                key: AUTH_TOKEN_KEY.to_owned(),
            })
    }
}
