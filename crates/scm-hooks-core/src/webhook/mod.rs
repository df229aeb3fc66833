//! # Webhook Processing Module
//!
//! Request intake, authentication, and the provider seam.
//!
//! A webhook passes through these steps, each of which may end processing:
//!
//! 1. The body is buffered once into a [`WebhookRequest`]
//! 2. A [`WebhookContext`] is built from headers and a lenient look at the body
//! 3. The [`SignatureValidator`] authenticates the request using the secret
//!    returned by the caller's [`SecretResolver`]
//! 4. The provider classifies the event key; unknown keys yield
//!    [`WebhookOutcome::Unhandled`]
//! 5. The provider decodes the payload into a canonical [`Event`]
//!
//! Signature validation is provider-agnostic and lives in [`validation`].
//! Classification and decoding are provider-specific and live in the
//! provider modules such as [`bitbucket`].

use crate::{events::Event, secrets::SecretError, secrets::SecretResolver, ErrorCategory};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

pub mod bitbucket;
pub mod validation;

pub use validation::{SignatureAlgorithm, SignatureConfig, SignatureValidator};

/// Largest body [`WebhookRequest::read_from`] buffers unless told otherwise
pub const DEFAULT_MAX_BODY_BYTES: usize = 10_000_000;

// ============================================================================
// Core Types
// ============================================================================

/// Buffered HTTP request data from a webhook delivery.
///
/// Header names are stored lower-cased so lookups are case-insensitive.
/// The body is held as [`Bytes`] so that signature validation and payload
/// decoding share one buffer.
#[derive(Clone)]
pub struct WebhookRequest {
    method: String,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Bytes,
}

impl WebhookRequest {
    /// Create new webhook request from already-split parts
    pub fn new(
        method: impl Into<String>,
        headers: HashMap<String, String>,
        query: HashMap<String, String>,
        body: impl Into<Bytes>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();

        Self {
            method: method.into(),
            headers,
            query,
            body: body.into(),
        }
    }

    /// Create new webhook request, taking query parameters from the request URI.
    ///
    /// When a parameter repeats, the first occurrence wins.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scm_hooks_core::webhook::WebhookRequest;
    /// use std::collections::HashMap;
    ///
    /// let request = WebhookRequest::from_uri("POST", "/hook?secret=abc%20def", HashMap::new(), "{}");
    /// assert_eq!(request.query_param("secret"), Some("abc def"));
    /// ```
    pub fn from_uri(
        method: impl Into<String>,
        uri: &str,
        headers: HashMap<String, String>,
        body: impl Into<Bytes>,
    ) -> Self {
        Self::new(method, headers, parse_query(uri), body)
    }

    /// Create new webhook request by buffering a body stream.
    ///
    /// The stream is read exactly once. Reading stops one byte past
    /// `max_body_bytes` so an oversized body is rejected without being
    /// buffered in full.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::BodyTooLarge`] when the body exceeds the limit
    /// and [`WebhookError::BodyRead`] when the stream fails.
    pub async fn read_from<R>(
        method: impl Into<String>,
        uri: &str,
        headers: HashMap<String, String>,
        reader: R,
        max_body_bytes: usize,
    ) -> Result<Self, WebhookError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = Vec::new();
        let mut limited = reader.take((max_body_bytes as u64).saturating_add(1));
        limited.read_to_end(&mut buffer).await?;

        if buffer.len() > max_body_bytes {
            return Err(WebhookError::BodyTooLarge {
                limit: max_body_bytes,
            });
        }

        Ok(Self::from_uri(method, uri, headers, buffer))
    }

    /// Get the HTTP method
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Get a header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Get a query parameter by exact name
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// Get the raw body
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

// Query values may carry the shared secret, so only names are printed.
impl fmt::Debug for WebhookRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut headers: Vec<&String> = self.headers.keys().collect();
        headers.sort();
        let mut query: Vec<&String> = self.query.keys().collect();
        query.sort();

        f.debug_struct("WebhookRequest")
            .field("method", &self.method)
            .field("headers", &headers)
            .field("query", &query)
            .field("body_len", &self.body.len())
            .finish()
    }
}

fn parse_query(uri: &str) -> HashMap<String, String> {
    let mut query = HashMap::new();

    let Some((_, rest)) = uri.split_once('?') else {
        return query;
    };
    let raw = rest.split('#').next().unwrap_or_default();

    for (name, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        query
            .entry(name.into_owned())
            .or_insert_with(|| value.into_owned());
    }

    query
}

/// The partially-parsed webhook handed to a [`SecretResolver`].
///
/// Built before authentication, so every field comes from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookContext {
    /// Identifier of the provider handling the request
    pub provider: &'static str,
    /// Raw event key header value; empty when the header is missing
    pub event_key: String,
    /// Whether the provider knows how to decode this event key
    pub recognized: bool,
    /// Webhook subscription identifier
    pub hook_uuid: Option<Uuid>,
    /// Delivery identifier
    pub request_uuid: Option<String>,
    /// Repository full name read from the body, if the body exposes one
    pub repository: Option<String>,
}

/// Result of parsing a webhook that was authenticated successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event was decoded into its canonical form
    Event(Event),
    /// The event key has no canonical mapping and should be acknowledged and ignored
    Unhandled { event_key: String },
}

impl WebhookOutcome {
    /// Get the decoded event, if any
    pub fn event(&self) -> Option<&Event> {
        match self {
            Self::Event(event) => Some(event),
            Self::Unhandled { .. } => None,
        }
    }

    /// Take the decoded event, if any
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Event(event) => Some(event),
            Self::Unhandled { .. } => None,
        }
    }

    /// Check whether the event was ignored
    pub fn is_unhandled(&self) -> bool {
        matches!(self, Self::Unhandled { .. })
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Top-level error for webhook processing failures
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// A credential check failed or no credential was supplied
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// The secret resolver failed
    #[error("webhook secret resolution failed: {0}")]
    SecretResolution(#[from] SecretError),

    /// The body does not have the shape the event kind requires
    #[error("malformed payload at '{path}': {message}")]
    MalformedPayload { path: String, message: String },

    /// A header needed after authentication is absent
    #[error("missing required header: {header}")]
    MissingHeader { header: String },

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    BodyRead(#[from] std::io::Error),
}

impl WebhookError {
    /// Build a malformed payload error for a JSON path
    pub fn malformed(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::MalformedPayload {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Check if error is transient and the delivery may succeed later
    pub fn is_transient(&self) -> bool {
        match self {
            Self::InvalidSignature => false,
            Self::SecretResolution(secret_error) => secret_error.is_transient(),
            Self::MalformedPayload { .. } => false,
            Self::MissingHeader { .. } => false,
            Self::BodyTooLarge { .. } => false,
            Self::BodyRead(_) => true,
        }
    }

    /// Get error category for monitoring
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSignature => ErrorCategory::Security,
            Self::SecretResolution(secret_error) => {
                if secret_error.is_transient() {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Permanent
                }
            }
            Self::MalformedPayload { .. } => ErrorCategory::Permanent,
            Self::MissingHeader { .. } => ErrorCategory::Permanent,
            Self::BodyTooLarge { .. } => ErrorCategory::Permanent,
            Self::BodyRead(_) => ErrorCategory::Transient,
        }
    }

    /// HTTP status a transport would typically answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidSignature => 401,
            Self::SecretResolution(_) => 500,
            Self::MalformedPayload { .. } => 400,
            Self::MissingHeader { .. } => 400,
            Self::BodyTooLarge { .. } => 413,
            Self::BodyRead(_) => 400,
        }
    }

    /// Check if error should be retried
    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }
}

// ============================================================================
// Core Operations (Traits)
// ============================================================================

/// A provider-specific webhook pipeline
#[async_trait]
pub trait WebhookParser: Send + Sync {
    /// Identifier of the provider, e.g. `"bitbucket"`
    fn provider_id(&self) -> &'static str;

    /// Authenticate, classify, and decode a buffered webhook request.
    ///
    /// The resolver is called at most once.
    ///
    /// # Errors
    ///
    /// Returns [`WebhookError::InvalidSignature`] when authentication fails,
    /// [`WebhookError::SecretResolution`] when the resolver fails, and
    /// [`WebhookError::MalformedPayload`] when a recognized event cannot be
    /// decoded.
    async fn parse(
        &self,
        request: &WebhookRequest,
        resolver: &dyn SecretResolver,
    ) -> Result<WebhookOutcome, WebhookError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
