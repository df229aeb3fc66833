//! Bitbucket Cloud payload shapes.
//!
//! These mirror the JSON Bitbucket sends closely enough to decode it and no
//! further. Unknown fields are ignored so that additions on the provider
//! side do not break decoding.

use super::super::WebhookError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

// ============================================================================
// Shared
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Link {
    #[serde(default)]
    pub href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub html: Option<Link>,
    #[serde(default)]
    pub avatar: Option<Link>,
}

impl Links {
    pub fn html_href(&self) -> String {
        self.html.as_ref().map(|l| l.href.clone()).unwrap_or_default()
    }

    pub fn avatar_href(&self) -> String {
        self.avatar
            .as_ref()
            .map(|l| l.href.clone())
            .unwrap_or_default()
    }
}

/// A user or team account
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub links: Links,
}

impl Account {
    /// Login name; newer payloads drop `username` in favour of `nickname`
    pub fn login(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.nickname.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub links: Links,
}

/// Repository reference inside pull request endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepositoryName {
    #[serde(default)]
    pub full_name: String,
}

// ============================================================================
// Push
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Push {
    pub changes: Vec<Change>,
}

/// One reference update within a push
#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub old: Option<RefState>,
    #[serde(default)]
    pub new: Option<RefState>,
    #[serde(default)]
    pub commits: Vec<CommitInfo>,
    #[serde(default)]
    pub forced: bool,
}

/// A reference before or after a push
#[derive(Debug, Clone, Deserialize)]
pub struct RefState {
    /// `branch`, `tag`, `named_branch` or `bookmark`
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub target: Option<CommitInfo>,
}

impl RefState {
    pub fn is_tag(&self) -> bool {
        self.kind == "tag"
    }

    pub fn target_hash(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.hash.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitInfo {
    pub hash: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub links: Links,
}

/// Commit author as recorded by git, plus the linked account if any
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Author {
    /// `Name <email>` exactly as it appears in the commit
    #[serde(default)]
    pub raw: String,
    #[serde(default)]
    pub user: Option<Account>,
}

// ============================================================================
// Pull Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// `OPEN`, `MERGED`, `DECLINED` or `SUPERSEDED`
    pub state: String,
    #[serde(default)]
    pub author: Option<Account>,
    pub source: Endpoint,
    pub destination: Endpoint,
    #[serde(default)]
    pub links: Links,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
}

/// Source or destination of a pull request
#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub branch: BranchName,
    #[serde(default)]
    pub commit: Option<CommitHash>,
    #[serde(default)]
    pub repository: Option<RepositoryName>,
}

impl Endpoint {
    pub fn hash(&self) -> String {
        self.commit
            .as_ref()
            .map(|c| c.hash.clone())
            .unwrap_or_default()
    }

    pub fn repository_name(&self) -> String {
        self.repository
            .as_ref()
            .map(|r| r.full_name.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchName {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitHash {
    pub hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub id: u64,
    #[serde(default)]
    pub content: Content,
    #[serde(default)]
    pub user: Option<Account>,
    #[serde(default)]
    pub links: Links,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub raw: String,
}

// ============================================================================
// Webhook bodies
// ============================================================================

/// Body of a `repo:push` webhook
#[derive(Debug, Clone)]
pub struct PushWebhook {
    pub push: Push,
    pub repository: Repository,
    pub actor: Account,
}

/// Body of a `pullrequest:*` webhook
#[derive(Debug, Clone)]
pub struct PullRequestWebhook {
    pub pull_request: PullRequest,
    pub repository: Repository,
    pub actor: Account,
}

/// Body of a `pullrequest:comment_*` webhook
#[derive(Debug, Clone)]
pub struct PullRequestCommentWebhook {
    pub pull_request: PullRequest,
    pub comment: Comment,
    pub repository: Repository,
    pub actor: Account,
}

impl PushWebhook {
    pub fn from_value(root: &Value) -> Result<Self, WebhookError> {
        Ok(Self {
            push: section(root, "push")?,
            repository: section(root, "repository")?,
            actor: section(root, "actor")?,
        })
    }
}

impl PullRequestWebhook {
    pub fn from_value(root: &Value) -> Result<Self, WebhookError> {
        Ok(Self {
            pull_request: section(root, "pullrequest")?,
            repository: section(root, "repository")?,
            actor: section(root, "actor")?,
        })
    }
}

impl PullRequestCommentWebhook {
    pub fn from_value(root: &Value) -> Result<Self, WebhookError> {
        Ok(Self {
            pull_request: section(root, "pullrequest")?,
            comment: section(root, "comment")?,
            repository: section(root, "repository")?,
            actor: section(root, "actor")?,
        })
    }
}

/// Parse a body into a JSON tree; syntax errors report the root path `$`
pub fn parse_body(body: &[u8]) -> Result<Value, WebhookError> {
    serde_json::from_slice(body).map_err(|e| WebhookError::malformed("$", e))
}

/// Decode one top-level section, naming it in the error
fn section<T: DeserializeOwned>(root: &Value, name: &str) -> Result<T, WebhookError> {
    let value = root
        .get(name)
        .ok_or_else(|| WebhookError::malformed(name, "missing field"))?;

    T::deserialize(value).map_err(|e| WebhookError::malformed(name, e))
}

/// Read `repository.full_name` without failing on anything
pub fn probe_repository(body: &[u8]) -> Option<String> {
    #[derive(Deserialize)]
    struct Probe {
        repository: Option<RepositoryName>,
    }

    serde_json::from_slice::<Probe>(body)
        .ok()
        .and_then(|probe| probe.repository)
        .map(|repository| repository.full_name)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
#[path = "payload_tests.rs"]
mod tests;
