//! # Bitbucket Cloud Provider
//!
//! Authenticates and decodes webhooks sent by Bitbucket Cloud.
//!
//! Bitbucket identifies the event in `X-Event-Key`, the subscription in
//! `X-Hook-UUID` and the delivery in `X-Request-UUID`. Credentials are either
//! a `?secret=` query parameter or an `X-Hub-Signature` digest; see
//! [`SignatureValidator`].
//!
//! Branch and tag creation and deletion arrive as `repo:push` events whose
//! change entries carry the reference type. Deletions are reported as
//! [`BranchHook`](crate::events::BranchHook) or
//! [`TagHook`](crate::events::TagHook); creations remain pushes unless
//! [`BitbucketConfig::tag_creates_as_tag_hooks`] is set.

use super::{
    SignatureConfig, SignatureValidator, WebhookContext, WebhookError, WebhookOutcome,
    WebhookParser, WebhookRequest,
};
use crate::secrets::SecretResolver;
use crate::ConfigError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub mod decode;
pub mod events;
pub mod payload;

pub use events::{supported_events, EventKind, EVENT_TABLE};

/// Header naming the event
pub const EVENT_KEY_HEADER: &str = "X-Event-Key";

/// Header identifying the webhook subscription
pub const HOOK_UUID_HEADER: &str = "X-Hook-UUID";

/// Header identifying the delivery attempt
pub const REQUEST_UUID_HEADER: &str = "X-Request-UUID";

// ============================================================================
// Configuration
// ============================================================================

/// Settings for the Bitbucket provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitbucketConfig {
    pub signature: SignatureConfig,
    /// Base used to build HTTPS clone URLs
    pub clone_base_url: String,
    /// Host used to build SSH clone URLs
    pub ssh_host: String,
    /// Report newly created tags as tag events instead of pushes
    pub tag_creates_as_tag_hooks: bool,
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            signature: SignatureConfig::default(),
            clone_base_url: "https://bitbucket.org".to_string(),
            ssh_host: "bitbucket.org".to_string(),
            tag_creates_as_tag_hooks: false,
        }
    }
}

impl BitbucketConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.signature.validate()?;

        let url = url::Url::parse(&self.clone_base_url).map_err(|e| invalid(format!(
            "clone_base_url '{}' is not a valid URL: {}",
            self.clone_base_url, e
        )))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!(
                "clone_base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.ssh_host.is_empty()
            || self
                .ssh_host
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | ':' | '@'))
        {
            return Err(invalid(format!(
                "ssh_host '{}' is not a valid host name",
                self.ssh_host
            )));
        }

        Ok(())
    }

    /// HTTPS clone URL for a repository full name
    pub fn clone_url(&self, full_name: &str) -> String {
        format!(
            "{}/{}.git",
            self.clone_base_url.trim_end_matches('/'),
            full_name
        )
    }

    /// SSH clone URL for a repository full name
    pub fn clone_ssh_url(&self, full_name: &str) -> String {
        format!("git@{}:{}.git", self.ssh_host, full_name)
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::InvalidProviderConfig {
        provider_id: BitbucketWebhookProvider::PROVIDER_ID.to_string(),
        message,
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Bitbucket Cloud webhook pipeline
#[derive(Debug, Clone, Default)]
pub struct BitbucketWebhookProvider {
    config: BitbucketConfig,
    validator: SignatureValidator,
}

impl BitbucketWebhookProvider {
    pub const PROVIDER_ID: &'static str = "bitbucket";

    /// Create a provider from validated configuration
    pub fn new(config: BitbucketConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            validator: SignatureValidator::new(config.signature.clone()),
            config,
        })
    }

    pub fn config(&self) -> &BitbucketConfig {
        &self.config
    }

    /// Build the partially-parsed webhook passed to the secret resolver.
    ///
    /// Never fails; anything unreadable is left empty.
    pub fn context(&self, request: &WebhookRequest) -> WebhookContext {
        let event_key = request
            .header(EVENT_KEY_HEADER)
            .unwrap_or_default()
            .to_string();

        WebhookContext {
            provider: Self::PROVIDER_ID,
            recognized: EventKind::classify(&event_key).is_some(),
            event_key,
            hook_uuid: request
                .header(HOOK_UUID_HEADER)
                .and_then(|value| Uuid::parse_str(value.trim_matches(|c| c == '{' || c == '}')).ok()),
            request_uuid: request.header(REQUEST_UUID_HEADER).map(str::to_string),
            repository: payload::probe_repository(request.body()),
        }
    }
}

#[async_trait]
impl WebhookParser for BitbucketWebhookProvider {
    fn provider_id(&self) -> &'static str {
        Self::PROVIDER_ID
    }

    #[instrument(
        skip(self, request, resolver),
        fields(
            provider = Self::PROVIDER_ID,
            event_key = request.header(EVENT_KEY_HEADER).unwrap_or_default(),
            request_uuid = request.header(REQUEST_UUID_HEADER).unwrap_or_default(),
        )
    )]
    async fn parse(
        &self,
        request: &WebhookRequest,
        resolver: &dyn SecretResolver,
    ) -> Result<WebhookOutcome, WebhookError> {
        let context = self.context(request);

        self.validator.validate(request, &context, resolver).await?;

        if context.event_key.is_empty() {
            return Err(WebhookError::MissingHeader {
                header: EVENT_KEY_HEADER.to_string(),
            });
        }

        let Some(kind) = EventKind::classify(&context.event_key) else {
            debug!(event_key = %context.event_key, "Ignoring unhandled event");
            return Ok(WebhookOutcome::Unhandled {
                event_key: context.event_key,
            });
        };

        debug!(kind = %kind, "Classified event");

        let event = decode::decode(kind, request.body(), &self.config)?;

        info!(
            hook_kind = %event.kind(),
            repository = %event.repository().full_name(),
            "Webhook accepted"
        );

        Ok(WebhookOutcome::Event(event))
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
