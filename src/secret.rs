use std::collections::BTreeMap;

use k8s_openapi::{ByteString, api::core::v1::Secret};
use kube::{ResourceExt, api::ObjectMeta};
use rand::{TryRngCore, rngs::OsRng};

use crate::{
    crds::WebhookSecret,
    error::{Error, Result},
};

pub const TOKEN_LENGTH: usize = 20;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$:#";

// Bytes at or above this value would bias the modulo towards the start of
// the charset.
const ACCEPT_BELOW: u8 = (256 - 256 % CHARSET.len()) as u8;

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "webhook-secret-operator";
/// Names the owning resource. An annotation because resource names can
/// exceed the 63 character limit on label values.
pub const OWNER_ANNOTATION: &str = "homerow.ca/webhook-secret";

pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> Result<String>;
}

/// Draws tokens from the operating system's secure random source.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsTokenGenerator;

impl TokenGenerator for OsTokenGenerator {
    fn generate(&self) -> Result<String> {
        let mut token = String::with_capacity(TOKEN_LENGTH);
        let mut buf = [0u8; TOKEN_LENGTH * 2];
        while token.len() < TOKEN_LENGTH {
            OsRng
                .try_fill_bytes(&mut buf)
                .map_err(|e| Error::Generation(e.to_string()))?;
            token.extend(
                buf.iter()
                    .filter(|b| **b < ACCEPT_BELOW)
                    .map(|b| CHARSET[usize::from(*b) % CHARSET.len()] as char)
                    .take(TOKEN_LENGTH - token.len()),
            );
        }
        Ok(token)
    }
}

/// Builds the shared secret a webhook is signed with.
pub struct SecretFactory {
    generator: Box<dyn TokenGenerator>,
}

impl Default for SecretFactory {
    fn default() -> Self {
        Self::new(OsTokenGenerator)
    }
}

impl SecretFactory {
    pub fn new(generator: impl TokenGenerator + 'static) -> Self {
        Self {
            generator: Box::new(generator),
        }
    }

    pub fn create_secret(&self, ws: &WebhookSecret) -> Result<Secret> {
        let token = self.generator.generate()?;
        let key = ws.spec.secret_ref.key_or_default();

        Ok(Secret {
            metadata: ObjectMeta {
                name: Some(ws.spec.secret_ref.name.clone()),
                namespace: Some(ws.secret_namespace()),
                labels: Some(BTreeMap::from([(
                    MANAGED_BY_LABEL.to_owned(),
                    MANAGED_BY.to_owned(),
                )])),
                annotations: Some(BTreeMap::from([(
                    OWNER_ANNOTATION.to_owned(),
                    ws.name_any(),
                )])),
                ..ObjectMeta::default()
            },
            data: Some(BTreeMap::from([(
                key.to_owned(),
                ByteString(token.into_bytes()),
            )])),
            ..Secret::default()
        })
    }
}

/// Reads a string value out of a secret's data. Values that are not valid
/// UTF-8 count as missing.
pub fn secret_value(secret: &Secret, key: &str) -> Option<String> {
    secret
        .data
        .as_ref()
        .and_then(|d| d.get(key))
        .and_then(|v| String::from_utf8(v.0.clone()).ok())
        .or_else(|| {
            secret
                .string_data
                .as_ref()
                .and_then(|d| d.get(key))
                .cloned()
        })
}
