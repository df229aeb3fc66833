//! Common test utilities for scm-hooks integration tests
//!
//! This module provides:
//! - Fixture loading from `tests/testdata`
//! - Request builders for Bitbucket deliveries
//! - An independent HMAC signer so the engine is not checked against itself
//! - A recording secret resolver

use hmac::{Hmac, Mac};
use scm_hooks_core::secrets::{SecretError, SecretResolver, WebhookSecret};
use scm_hooks_core::webhook::{WebhookContext, WebhookRequest};
use sha2::Sha256;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "0123456789abcdef";

pub const HOOK_UUID: &str = "{3f2b9c1e-7d4a-4e8b-9a61-2c5d8e0f1b37}";
pub const REQUEST_UUID: &str = "4a0a1f7e-05c1-4c8e-8f5b-7b1c2d3e4f50";

// ============================================================================
// Fixtures
// ============================================================================

/// Read a fixture body from `tests/testdata`
#[allow(dead_code)]
pub fn fixture(name: &str) -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("testdata")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("fixture {}: {}", path.display(), e))
}

/// Every fixture paired with the event key Bitbucket sends it under
#[allow(dead_code)]
pub const EVENT_FIXTURES: &[(&str, &str)] = &[
    ("repo:push", "push.json"),
    ("repo:push", "push_forced.json"),
    ("repo:push", "push_branch_create.json"),
    ("repo:push", "push_branch_delete.json"),
    ("repo:push", "push_tag_create.json"),
    ("repo:push", "push_tag_delete.json"),
    ("pullrequest:created", "pr_created.json"),
    ("pullrequest:created", "pr_created_slashbranch.json"),
    ("pullrequest:updated", "pr_updated.json"),
    ("pullrequest:fulfilled", "pr_fulfilled.json"),
    ("pullrequest:rejected", "pr_declined.json"),
    ("pullrequest:comment_created", "pr_comment_created.json"),
];

// ============================================================================
// Request Builders
// ============================================================================

fn delivery_headers(event_key: &str) -> HashMap<String, String> {
    HashMap::from([
        ("X-Event-Key".to_string(), event_key.to_string()),
        ("X-Hook-UUID".to_string(), HOOK_UUID.to_string()),
        ("X-Request-UUID".to_string(), REQUEST_UUID.to_string()),
        ("Content-Type".to_string(), "application/json".to_string()),
        ("User-Agent".to_string(), "Bitbucket-Webhooks/2.0".to_string()),
    ])
}

/// A delivery authenticated with the `secret` query parameter
#[allow(dead_code)]
pub fn query_request(event_key: &str, secret: &str, body: Vec<u8>) -> WebhookRequest {
    WebhookRequest::from_uri(
        "POST",
        &format!("/hook/bitbucket?secret={}", secret),
        delivery_headers(event_key),
        body,
    )
}

/// A delivery authenticated with an `X-Hub-Signature` header
#[allow(dead_code)]
pub fn signed_request(event_key: &str, signature: &str, body: Vec<u8>) -> WebhookRequest {
    let mut headers = delivery_headers(event_key);
    headers.insert("X-Hub-Signature".to_string(), signature.to_string());
    WebhookRequest::from_uri("POST", "/hook/bitbucket", headers, body)
}

/// A delivery carrying no credential at all
#[allow(dead_code)]
pub fn anonymous_request(event_key: &str, body: Vec<u8>) -> WebhookRequest {
    WebhookRequest::from_uri("POST", "/hook/bitbucket", delivery_headers(event_key), body)
}

/// HMAC-SHA256 signature header value, computed without the engine
#[allow(dead_code)]
pub fn sign_sha256(secret: &str, body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

// ============================================================================
// Recording Secret Resolver
// ============================================================================

/// Secret resolver that returns a fixed secret and records every lookup
#[derive(Clone)]
#[allow(dead_code)]
pub struct RecordingResolver {
    secret: Option<String>,
    calls: Arc<Mutex<Vec<WebhookContext>>>,
}

impl RecordingResolver {
    #[allow(dead_code)]
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Some(secret.to_string()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A resolver that knows no secrets
    #[allow(dead_code)]
    pub fn empty() -> Self {
        Self {
            secret: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<WebhookContext> {
        self.calls.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl SecretResolver for RecordingResolver {
    async fn resolve_secret(&self, context: &WebhookContext) -> Result<WebhookSecret, SecretError> {
        self.calls.lock().unwrap().push(context.clone());
        match &self.secret {
            Some(secret) => Ok(WebhookSecret::new(secret.clone())),
            None => Err(SecretError::NotFound {
                key: context.repository.clone().unwrap_or_default(),
            }),
        }
    }
}
