//! # SCM Hooks Core
//!
//! Authentication and normalization engine for source-control webhooks.
//!
//! This crate sits on the trust boundary between an untrusted HTTP caller and
//! downstream automation. It takes a buffered webhook request, checks that the
//! request is authentic, and turns the provider payload into one of a small set
//! of canonical event records.
//!
//! ## Architecture
//!
//! - [`secrets`] - the [`SecretResolver`] seam supplied by the embedding application
//! - [`webhook`] - request types, the shared [`SignatureValidator`], errors, and providers
//! - [`webhook::bitbucket`] - Bitbucket event classification and payload decoding
//! - [`events`] - the canonical, provider-independent event model
//!
//! The engine is stateless: every request is processed on its own and nothing
//! is cached between requests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scm_hooks_core::secrets::LiteralSecretResolver;
//! use scm_hooks_core::webhook::{
//!     bitbucket::BitbucketWebhookProvider, WebhookOutcome, WebhookParser, WebhookRequest,
//! };
//! use std::collections::HashMap;
//!
//! # async fn example(body: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let provider = BitbucketWebhookProvider::default();
//! let resolver = LiteralSecretResolver::new("my-secret");
//!
//! let headers = HashMap::from([("X-Event-Key".to_string(), "repo:push".to_string())]);
//! let request = WebhookRequest::from_uri("POST", "/hook?secret=my-secret", headers, body);
//!
//! match provider.parse(&request, &resolver).await? {
//!     WebhookOutcome::Event(event) => println!("received {}", event.kind()),
//!     WebhookOutcome::Unhandled { event_key } => println!("ignoring {}", event_key),
//! }
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod events;
pub mod secrets;
pub mod webhook;

// Re-export commonly used types
pub use events::{
    BranchHook, BranchRef, Comment, CommentAction, Commit, Event, HookKind, PullRequest,
    PullRequestAction, PullRequestCommentHook, PullRequestHook, PullRequestState, PushHook,
    RefAction, Reference, Repository, Signature, TagHook, User,
};
pub use secrets::{SecretError, SecretResolver, WebhookSecret};
pub use webhook::{
    SignatureValidator, WebhookContext, WebhookError, WebhookOutcome, WebhookParser,
    WebhookRequest,
};

// ============================================================================
// Error Classification
// ============================================================================

/// Error classification used by callers to pick a response and decide on retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Authentication failure; the request must be rejected.
    Security,
    /// The request can never succeed as sent.
    Permanent,
    /// A collaborator failed; the same request may succeed later.
    Transient,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Security => "security",
            Self::Permanent => "permanent",
            Self::Transient => "transient",
        };
        write!(f, "{}", value)
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Validation errors for engine configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The signature configuration is internally inconsistent.
    #[error("invalid signature configuration: {message}")]
    InvalidSignatureConfig { message: String },

    /// The provider configuration is internally inconsistent.
    #[error("provider '{provider_id}': {message}")]
    InvalidProviderConfig {
        provider_id: String,
        message: String,
    },
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
