//! # Webhook Secret Resolution
//!
//! The engine never stores secrets. For every request it asks a
//! [`SecretResolver`] supplied by the embedding application for the secret
//! belonging to the partially-parsed webhook ([`WebhookContext`]), uses it
//! once, and drops it.
//!
//! Implementations provided here:
//!
//! | Type | Use |
//! |------|-----|
//! | [`LiteralSecretResolver`] | One hard-coded secret for every repository (development only) |
//! | [`RepositorySecretResolver`] | Secrets keyed by repository full name, with optional fallback |
//! | [`FnSecretResolver`] | Adapts a plain closure |

use crate::webhook::WebhookContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

// ============================================================================
// WebhookSecret
// ============================================================================

/// Secure container for a webhook secret.
///
/// The value is wiped from memory on drop and never appears in `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WebhookSecret {
    inner: String,
}

impl WebhookSecret {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Get the secret as bytes (only for immediate use)
    pub fn expose_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Check if the secret is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get secret length without exposing content
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookSecret")
            .field("length", &self.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl From<&str> for WebhookSecret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for WebhookSecret {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error type for secret resolution
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret not found: {key}")]
    NotFound { key: String },

    #[error("Access denied to secret: {key}")]
    AccessDenied { key: String },

    #[error("Secret provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Secret is empty: {key}")]
    Empty { key: String },
}

impl SecretError {
    /// Check if this error represents a transient condition.
    ///
    /// Only `ProviderUnavailable` is considered transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }
}

// ============================================================================
// SecretResolver
// ============================================================================

/// Looks up the secret a webhook must be authenticated with.
///
/// Called at most once per request. Implementations may perform I/O and are
/// responsible for their own caching and revocation; the engine never caches
/// the returned value.
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Resolve the secret for the given webhook
    async fn resolve_secret(&self, context: &WebhookContext) -> Result<WebhookSecret, SecretError>;
}

#[async_trait]
impl<T: SecretResolver + ?Sized> SecretResolver for std::sync::Arc<T> {
    async fn resolve_secret(&self, context: &WebhookContext) -> Result<WebhookSecret, SecretError> {
        (**self).resolve_secret(context).await
    }
}

// ============================================================================
// LiteralSecretResolver
// ============================================================================

/// A [`SecretResolver`] returning the same literal secret for every webhook.
///
/// **Development and testing only.** A `WARN` log line is emitted on
/// construction so that operators are reminded to replace it.
pub struct LiteralSecretResolver {
    secret: WebhookSecret,
}

impl LiteralSecretResolver {
    /// Construct a resolver for the given literal secret
    pub fn new(secret: impl Into<WebhookSecret>) -> Self {
        warn!(
            "LiteralSecretResolver is active; \
             one literal secret is shared by every repository."
        );
        Self {
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for LiteralSecretResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiteralSecretResolver")
            .field("secret", &"<REDACTED>")
            .finish()
    }
}

#[async_trait]
impl SecretResolver for LiteralSecretResolver {
    async fn resolve_secret(&self, _context: &WebhookContext) -> Result<WebhookSecret, SecretError> {
        Ok(self.secret.clone())
    }
}

// ============================================================================
// RepositorySecretResolver
// ============================================================================

/// A [`SecretResolver`] keyed by repository full name (`namespace/name`).
///
/// Webhooks whose repository is unknown, or whose payload carries no
/// repository, receive the fallback secret when one is configured and
/// otherwise fail with [`SecretError::NotFound`].
#[derive(Default)]
pub struct RepositorySecretResolver {
    secrets: HashMap<String, WebhookSecret>,
    fallback: Option<WebhookSecret>,
}

impl RepositorySecretResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the secret for a repository
    pub fn with_repository(
        mut self,
        full_name: impl Into<String>,
        secret: impl Into<WebhookSecret>,
    ) -> Self {
        self.secrets.insert(full_name.into(), secret.into());
        self
    }

    /// Set the secret used for repositories without their own entry
    pub fn with_fallback(mut self, secret: impl Into<WebhookSecret>) -> Self {
        self.fallback = Some(secret.into());
        self
    }

    /// Number of repositories with a dedicated secret
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    /// Check if no repository has a dedicated secret
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl fmt::Debug for RepositorySecretResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut repositories: Vec<&String> = self.secrets.keys().collect();
        repositories.sort();
        f.debug_struct("RepositorySecretResolver")
            .field("repositories", &repositories)
            .field("fallback", &self.fallback.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

#[async_trait]
impl SecretResolver for RepositorySecretResolver {
    async fn resolve_secret(&self, context: &WebhookContext) -> Result<WebhookSecret, SecretError> {
        let found = context
            .repository
            .as_deref()
            .and_then(|name| self.secrets.get(name))
            .or(self.fallback.as_ref());

        found.cloned().ok_or_else(|| SecretError::NotFound {
            key: context
                .repository
                .clone()
                .unwrap_or_else(|| "<unknown repository>".to_string()),
        })
    }
}

// ============================================================================
// FnSecretResolver
// ============================================================================

/// Adapts a synchronous closure into a [`SecretResolver`].
///
/// # Examples
///
/// ```rust
/// use scm_hooks_core::secrets::{FnSecretResolver, SecretError, WebhookSecret};
///
/// let resolver = FnSecretResolver::new(|context| match context.repository.as_deref() {
///     Some("acme/api") => Ok(WebhookSecret::new("api-secret")),
///     _ => Err(SecretError::NotFound { key: context.event_key.clone() }),
/// });
/// ```
pub struct FnSecretResolver<F> {
    lookup: F,
}

impl<F> FnSecretResolver<F>
where
    F: Fn(&WebhookContext) -> Result<WebhookSecret, SecretError> + Send + Sync,
{
    /// Wrap a lookup closure
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl<F> SecretResolver for FnSecretResolver<F>
where
    F: Fn(&WebhookContext) -> Result<WebhookSecret, SecretError> + Send + Sync,
{
    async fn resolve_secret(&self, context: &WebhookContext) -> Result<WebhookSecret, SecretError> {
        (self.lookup)(context)
    }
}

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;
