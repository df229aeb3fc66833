//! Webhook request authentication.
//!
//! Two credential forms are accepted, checked in this order:
//!
//! 1. A shared secret in a query parameter (`?secret=...`). When present it
//!    must equal the resolved secret exactly. A mismatch is final; the
//!    signature header is not consulted.
//! 2. An HMAC digest of the raw body in a signature header
//!    (`X-Hub-Signature: sha256=<hex>`).
//!
//! Both comparisons run in constant time via [`subtle`]. Requests carrying
//! neither credential are rejected without calling the secret resolver.

use super::{WebhookContext, WebhookError, WebhookRequest};
use crate::secrets::{SecretError, SecretResolver, WebhookSecret};
use crate::ConfigError;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::Sha256;
use std::fmt;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Digest algorithm carried in a signature header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureAlgorithm {
    /// `sha256=<hex>`
    HmacSha256,
    /// `sha1=<hex>`, accepted only when enabled in [`SignatureConfig`]
    HmacSha1,
}

impl SignatureAlgorithm {
    /// Header value prefix, including the `=`
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::HmacSha256 => "sha256=",
            Self::HmacSha1 => "sha1=",
        }
    }

    /// Length of the raw digest in bytes
    pub fn digest_len(&self) -> usize {
        match self {
            Self::HmacSha256 => 32,
            Self::HmacSha1 => 20,
        }
    }

    fn from_header(value: &str) -> Option<(Self, &str)> {
        [Self::HmacSha256, Self::HmacSha1]
            .into_iter()
            .find_map(|algorithm| {
                value
                    .strip_prefix(algorithm.prefix())
                    .map(|digest| (algorithm, digest))
            })
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HmacSha256 => write!(f, "sha256"),
            Self::HmacSha1 => write!(f, "sha1"),
        }
    }
}

/// Where credentials are read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Query parameter carrying the shared secret
    pub query_parameter: String,
    /// Header carrying the body digest
    pub header_name: String,
    /// Accept `sha1=` digests in addition to `sha256=`
    pub allow_sha1: bool,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            query_parameter: "secret".to_string(),
            header_name: "X-Hub-Signature".to_string(),
            allow_sha1: false,
        }
    }
}

impl SignatureConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.query_parameter.trim().is_empty() {
            return Err(ConfigError::InvalidSignatureConfig {
                message: "query_parameter must not be empty".to_string(),
            });
        }

        if self.header_name.trim().is_empty() {
            return Err(ConfigError::InvalidSignatureConfig {
                message: "header_name must not be empty".to_string(),
            });
        }

        if self.header_name.chars().any(|c| c.is_whitespace() || c == ':') {
            return Err(ConfigError::InvalidSignatureConfig {
                message: format!("'{}' is not a valid header name", self.header_name),
            });
        }

        Ok(())
    }

    fn algorithm_enabled(&self, algorithm: SignatureAlgorithm) -> bool {
        match algorithm {
            SignatureAlgorithm::HmacSha256 => true,
            SignatureAlgorithm::HmacSha1 => self.allow_sha1,
        }
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// The credential a request presents
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Credential<'a> {
    /// Shared secret from the query string
    SharedSecret(&'a str),
    /// Digest from the signature header, still including its prefix
    Digest(&'a str),
}

impl Credential<'_> {
    /// Short name used in log fields
    pub fn mechanism(&self) -> &'static str {
        match self {
            Self::SharedSecret(_) => "query",
            Self::Digest(_) => "header",
        }
    }
}

// Both variants carry attacker-visible but sensitive material.
impl fmt::Debug for Credential<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedSecret(_) => f.write_str("SharedSecret(<REDACTED>)"),
            Self::Digest(_) => f.write_str("Digest(<REDACTED>)"),
        }
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Authenticates webhook requests against a resolved secret
#[derive(Debug, Clone, Default)]
pub struct SignatureValidator {
    config: SignatureConfig,
}

impl SignatureValidator {
    pub fn new(config: SignatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// Find the credential a request carries.
    ///
    /// An empty query value counts as absent.
    pub fn credential<'a>(&self, request: &'a WebhookRequest) -> Option<Credential<'a>> {
        if let Some(value) = request
            .query_param(&self.config.query_parameter)
            .filter(|value| !value.is_empty())
        {
            return Some(Credential::SharedSecret(value));
        }

        request
            .header(&self.config.header_name)
            .filter(|value| !value.is_empty())
            .map(Credential::Digest)
    }

    /// Authenticate a request, resolving its secret through `resolver`.
    ///
    /// The resolver is called at most once, and only when the request
    /// carries a credential.
    ///
    /// # Errors
    ///
    /// - [`WebhookError::InvalidSignature`] when no credential is present or
    ///   the credential does not match
    /// - [`WebhookError::SecretResolution`] when the resolver fails or returns
    ///   an empty secret
    pub async fn validate(
        &self,
        request: &WebhookRequest,
        context: &WebhookContext,
        resolver: &dyn SecretResolver,
    ) -> Result<(), WebhookError> {
        let Some(credential) = self.credential(request) else {
            warn!(
                provider = context.provider,
                event_key = %context.event_key,
                "Webhook rejected: no credential present"
            );
            return Err(WebhookError::InvalidSignature);
        };

        let secret = resolver.resolve_secret(context).await.map_err(|e| {
            warn!(
                provider = context.provider,
                event_key = %context.event_key,
                error = %e,
                "Webhook secret resolution failed"
            );
            WebhookError::SecretResolution(e)
        })?;

        if secret.is_empty() {
            return Err(SecretError::Empty {
                key: context
                    .repository
                    .clone()
                    .unwrap_or_else(|| context.event_key.clone()),
            }
            .into());
        }

        let result = self.verify_credential(credential, request.body(), &secret);
        match &result {
            Ok(()) => debug!(
                provider = context.provider,
                mechanism = credential.mechanism(),
                "Webhook authenticated"
            ),
            Err(_) => warn!(
                provider = context.provider,
                event_key = %context.event_key,
                mechanism = credential.mechanism(),
                "Webhook rejected: credential mismatch"
            ),
        }
        result
    }

    /// Authenticate a request against an already-resolved secret
    pub fn verify(
        &self,
        request: &WebhookRequest,
        secret: &WebhookSecret,
    ) -> Result<(), WebhookError> {
        let credential = self
            .credential(request)
            .ok_or(WebhookError::InvalidSignature)?;
        self.verify_credential(credential, request.body(), secret)
    }

    fn verify_credential(
        &self,
        credential: Credential<'_>,
        body: &[u8],
        secret: &WebhookSecret,
    ) -> Result<(), WebhookError> {
        let matches = match credential {
            Credential::SharedSecret(provided) => {
                bool::from(provided.as_bytes().ct_eq(secret.expose_bytes()))
            }
            Credential::Digest(header) => self.digest_matches(header, body, secret),
        };

        if matches {
            Ok(())
        } else {
            Err(WebhookError::InvalidSignature)
        }
    }

    fn digest_matches(&self, header: &str, body: &[u8], secret: &WebhookSecret) -> bool {
        let Some((algorithm, hex_digest)) = SignatureAlgorithm::from_header(header) else {
            return false;
        };

        if !self.config.algorithm_enabled(algorithm) {
            return false;
        }

        let Ok(provided) = hex::decode(hex_digest) else {
            return false;
        };

        if provided.len() != algorithm.digest_len() {
            return false;
        }

        match compute_hmac(algorithm, secret.expose_bytes(), body) {
            Some(expected) => provided.ct_eq(&expected).into(),
            None => false,
        }
    }
}

// ============================================================================
// Signing
// ============================================================================

/// Produce a signature header value (`sha256=<hex>`) for a body
pub fn sign_body(algorithm: SignatureAlgorithm, secret: &WebhookSecret, body: &[u8]) -> String {
    let digest = compute_hmac(algorithm, secret.expose_bytes(), body).unwrap_or_default();
    format!("{}{}", algorithm.prefix(), hex::encode(digest))
}

fn compute_hmac(algorithm: SignatureAlgorithm, key: &[u8], payload: &[u8]) -> Option<Vec<u8>> {
    match algorithm {
        SignatureAlgorithm::HmacSha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key).ok()?;
            mac.update(payload);
            Some(mac.finalize().into_bytes().to_vec())
        }
        SignatureAlgorithm::HmacSha1 => {
            let mut mac = Hmac::<Sha1>::new_from_slice(key).ok()?;
            mac.update(payload);
            Some(mac.finalize().into_bytes().to_vec())
        }
    }
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod tests;
