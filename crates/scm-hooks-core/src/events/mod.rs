//! # Canonical Event Model
//!
//! Provider-independent records produced from webhook payloads.
//!
//! Every successfully decoded webhook yields exactly one [`Event`]. The enum is
//! the discriminant: there is no record with optional fields for every possible
//! shape, so consumers match exhaustively on the variant they care about.
//!
//! # Reference naming
//!
//! The `ref` of a [`PushHook`] always holds the full reference path
//! (`refs/heads/main`, `refs/tags/v1`). [`BranchHook`] and [`TagHook`] carry a
//! [`Reference`] whose `name` is always the short form (`main`, `v1`).
//!
//! # Examples
//!
//! ```rust
//! use scm_hooks_core::events::{Event, HookKind};
//!
//! fn describe(event: &Event) -> String {
//!     match event {
//!         Event::Push(push) => format!("push to {}", push.r#ref),
//!         Event::Branch(branch) => format!("branch {} {}", branch.reference.name, branch.action),
//!         Event::Tag(tag) => format!("tag {} {}", tag.reference.name, tag.action),
//!         Event::PullRequest(pr) => format!("pull request #{} {}", pr.pull_request.number, pr.action),
//!         Event::PullRequestComment(c) => format!("comment on #{}", c.pull_request.number),
//!     }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod reference;

use reference::{trim_ref, RefKind};

// ============================================================================
// Event
// ============================================================================

/// A normalized webhook event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Push(PushHook),
    Branch(BranchHook),
    Tag(TagHook),
    PullRequest(PullRequestHook),
    PullRequestComment(PullRequestCommentHook),
}

impl Event {
    /// Get the discriminant of this event
    pub fn kind(&self) -> HookKind {
        match self {
            Self::Push(_) => HookKind::Push,
            Self::Branch(_) => HookKind::Branch,
            Self::Tag(_) => HookKind::Tag,
            Self::PullRequest(_) => HookKind::PullRequest,
            Self::PullRequestComment(_) => HookKind::PullRequestComment,
        }
    }

    /// Repository the event occurred in
    pub fn repository(&self) -> &Repository {
        match self {
            Self::Push(hook) => &hook.repo,
            Self::Branch(hook) => &hook.repo,
            Self::Tag(hook) => &hook.repo,
            Self::PullRequest(hook) => &hook.repo,
            Self::PullRequestComment(hook) => &hook.repo,
        }
    }

    /// User who triggered the event
    pub fn sender(&self) -> &User {
        match self {
            Self::Push(hook) => &hook.sender,
            Self::Branch(hook) => &hook.sender,
            Self::Tag(hook) => &hook.sender,
            Self::PullRequest(hook) => &hook.sender,
            Self::PullRequestComment(hook) => &hook.sender,
        }
    }
}

/// Discriminant of [`Event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    Push,
    Branch,
    Tag,
    PullRequest,
    PullRequestComment,
}

impl HookKind {
    /// Get the snake_case name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Branch => "branch",
            Self::Tag => "tag",
            Self::PullRequest => "pull_request",
            Self::PullRequestComment => "pull_request_comment",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Shared Types
// ============================================================================

/// Repository identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    /// Provider-assigned identifier
    pub id: String,
    /// Owner or workspace part of the full name
    pub namespace: String,
    /// Repository slug
    pub name: String,
    /// Short name of the branch the event concerns
    pub branch: String,
    pub private: bool,
    /// HTTPS clone URL
    pub clone: String,
    /// SSH clone URL
    pub clone_ssh: String,
    /// Browser URL
    pub link: String,
}

impl Repository {
    /// Get `namespace/name`
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            return self.name.clone();
        }
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Account identity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
}

/// Commit author or committer at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub login: String,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub date: Option<DateTime<Utc>>,
}

/// Summary of a single commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub link: String,
    pub author: Signature,
    pub committer: Signature,
    /// Files added by the commit, when the provider reports them
    #[serde(default)]
    pub added: Vec<String>,
    /// Files removed by the commit, when the provider reports them
    #[serde(default)]
    pub removed: Vec<String>,
    /// Files modified by the commit, when the provider reports them
    #[serde(default)]
    pub modified: Vec<String>,
}

/// A named pointer to a commit; `name` is always the short form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub sha: String,
}

// ============================================================================
// Push
// ============================================================================

/// Commits pushed to a reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushHook {
    /// Full reference path, always starting with `refs/`
    pub r#ref: String,
    pub before: String,
    pub after: String,
    pub repo: Repository,
    /// Head commit of the reference after the push
    pub commit: Option<Commit>,
    /// Pushed commits in the order the provider lists them
    pub commits: Vec<Commit>,
    pub sender: User,
    /// The reference did not exist before the push
    pub created: bool,
    /// The reference no longer exists after the push
    pub deleted: bool,
    pub forced: bool,
}

impl PushHook {
    /// Kind of reference that was pushed, decided by the path prefix alone
    pub fn ref_kind(&self) -> RefKind {
        RefKind::from_ref(&self.r#ref)
    }

    /// Branch or tag view of a push that created or deleted a reference.
    ///
    /// Returns `None` for ordinary pushes and for references outside
    /// `refs/heads/` and `refs/tags/`.
    pub fn reference_event(&self) -> Option<Event> {
        let (action, sha) = if self.deleted {
            (RefAction::Delete, self.before.clone())
        } else if self.created {
            (RefAction::Create, self.after.clone())
        } else {
            return None;
        };

        let reference = Reference {
            name: trim_ref(&self.r#ref).to_string(),
            sha,
        };

        match self.ref_kind() {
            RefKind::Branch => Some(Event::Branch(BranchHook {
                reference,
                action,
                repo: self.repo.clone(),
                sender: self.sender.clone(),
            })),
            RefKind::Tag => Some(Event::Tag(TagHook {
                reference,
                action,
                repo: self.repo.clone(),
                sender: self.sender.clone(),
            })),
            RefKind::Other => None,
        }
    }
}

// ============================================================================
// Branch and Tag
// ============================================================================

/// Creation or deletion of a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefAction {
    Create,
    Delete,
}

impl fmt::Display for RefAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// A branch was created or deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchHook {
    pub reference: Reference,
    pub action: RefAction,
    pub repo: Repository,
    pub sender: User,
}

/// A tag was created or deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagHook {
    pub reference: Reference,
    pub action: RefAction,
    pub repo: Repository,
    pub sender: User,
}

// ============================================================================
// Pull Requests
// ============================================================================

/// What happened to a pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestAction {
    Created,
    Updated,
    Merged,
    Closed,
}

impl fmt::Display for PullRequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Merged => "merged",
            Self::Closed => "closed",
        };
        write!(f, "{}", value)
    }
}

/// Lifecycle state of a pull request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    Open,
    Merged,
    Closed,
}

/// One side of a pull request: a branch in a repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRef {
    /// Short branch name
    pub name: String,
    pub sha: String,
    /// Full name of the repository holding the branch
    pub repository: String,
}

/// Pull request details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: PullRequestState,
    /// Head commit of the source branch
    pub sha: String,
    /// Provider reference path for the pull request head
    pub r#ref: String,
    pub source: BranchRef,
    pub target: BranchRef,
    /// Full name of the repository the changes come from
    pub fork: String,
    pub link: String,
    pub closed: bool,
    pub merged: bool,
    pub author: User,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

/// A pull request changed state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestHook {
    pub action: PullRequestAction,
    pub pull_request: PullRequest,
    pub repo: Repository,
    pub sender: User,
}

/// What happened to a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentAction {
    Created,
}

impl fmt::Display for CommentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
        }
    }
}

/// A comment on a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub body: String,
    pub author: User,
    pub link: String,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

/// A comment was added to a pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestCommentHook {
    pub action: CommentAction,
    pub pull_request: PullRequest,
    pub comment: Comment,
    pub repo: Repository,
    pub sender: User,
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
