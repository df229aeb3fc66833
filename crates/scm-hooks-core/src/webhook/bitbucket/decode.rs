//! Projection of Bitbucket payloads onto the canonical event model.

use super::events::EventKind;
use super::payload::{
    self, Account, Author, CommitInfo, PullRequestCommentWebhook, PullRequestWebhook,
    PushWebhook,
};
use super::BitbucketConfig;
use crate::events::reference::{expand_ref, is_zero_sha, BRANCH_PREFIX, TAG_PREFIX, ZERO_SHA};
use crate::events::{
    BranchHook, BranchRef, Comment, CommentAction, Commit, Event, PullRequest, PullRequestAction,
    PullRequestCommentHook, PullRequestHook, PullRequestState, PushHook, RefAction, Reference,
    Repository, Signature, TagHook, User,
};
use crate::webhook::WebhookError;
use regex::Regex;
use std::sync::OnceLock;

/// Decode a webhook body of a classified kind into its canonical event
pub fn decode(kind: EventKind, body: &[u8], config: &BitbucketConfig) -> Result<Event, WebhookError> {
    let root = payload::parse_body(body)?;

    if let Some(action) = kind.pull_request_action() {
        let src = PullRequestWebhook::from_value(&root)?;
        return Ok(Event::PullRequest(convert_pull_request(&src, action, config)));
    }

    match kind {
        EventKind::PullRequestCommentCreated => {
            let src = PullRequestCommentWebhook::from_value(&root)?;
            Ok(Event::PullRequestComment(convert_pull_request_comment(
                &src, config,
            )))
        }
        _ => convert_push(&PushWebhook::from_value(&root)?, config),
    }
}

// ============================================================================
// Push
// ============================================================================

/// Project a push body.
///
/// Deleted references become branch or tag events. Created references stay
/// pushes unless tag creations are configured to become tag events.
pub fn convert_push(src: &PushWebhook, config: &BitbucketConfig) -> Result<Event, WebhookError> {
    let change = src
        .push
        .changes
        .first()
        .ok_or_else(|| WebhookError::malformed("push.changes", "no reference changes"))?;

    let state = change
        .new
        .as_ref()
        .or(change.old.as_ref())
        .ok_or_else(|| WebhookError::malformed("push.changes[0]", "neither old nor new is set"))?;

    // Bitbucket names are always short; the payload type decides the prefix.
    let is_tag = state.is_tag();
    let prefix = if is_tag { TAG_PREFIX } else { BRANCH_PREFIX };
    let full_ref = expand_ref(&state.name, prefix);
    let short_name = state.name.clone();

    let before = target_or_zero(change.old.as_ref().and_then(|s| s.target_hash()));
    let after = target_or_zero(change.new.as_ref().and_then(|s| s.target_hash()));
    let created = is_zero_sha(&before);
    let deleted = is_zero_sha(&after);

    let repo = convert_repository(&src.repository, &short_name, config);
    let sender = convert_user(&src.actor);

    if deleted || (created && is_tag && config.tag_creates_as_tag_hooks) {
        let (action, sha) = if deleted {
            (RefAction::Delete, before.clone())
        } else {
            (RefAction::Create, after.clone())
        };
        let reference = Reference {
            name: short_name,
            sha,
        };

        return Ok(if is_tag {
            Event::Tag(TagHook {
                reference,
                action,
                repo,
                sender,
            })
        } else {
            Event::Branch(BranchHook {
                reference,
                action,
                repo,
                sender,
            })
        });
    }

    let commits: Vec<Commit> = change.commits.iter().map(convert_commit).collect();
    let commit = change
        .new
        .as_ref()
        .and_then(|s| s.target.as_ref())
        .map(convert_commit);

    Ok(Event::Push(PushHook {
        r#ref: full_ref,
        before,
        after,
        repo,
        commit,
        commits,
        sender,
        created,
        deleted,
        forced: change.forced,
    }))
}

fn target_or_zero(hash: Option<&str>) -> String {
    match hash {
        Some(hash) if !hash.is_empty() => hash.to_string(),
        _ => ZERO_SHA.to_string(),
    }
}

// ============================================================================
// Pull Requests
// ============================================================================

pub fn convert_pull_request(
    src: &PullRequestWebhook,
    action: PullRequestAction,
    config: &BitbucketConfig,
) -> PullRequestHook {
    let pull_request = convert_pull_request_details(&src.pull_request);
    PullRequestHook {
        action,
        repo: convert_repository(&src.repository, &pull_request.target.name, config),
        sender: convert_user(&src.actor),
        pull_request,
    }
}

pub fn convert_pull_request_comment(
    src: &PullRequestCommentWebhook,
    config: &BitbucketConfig,
) -> PullRequestCommentHook {
    let pull_request = convert_pull_request_details(&src.pull_request);
    let comment = &src.comment;

    PullRequestCommentHook {
        action: CommentAction::Created,
        comment: Comment {
            id: comment.id,
            body: comment.content.raw.clone(),
            author: comment.user.as_ref().map(convert_user).unwrap_or_default(),
            link: comment.links.html_href(),
            created: comment.created_on,
            updated: comment.updated_on,
        },
        repo: convert_repository(&src.repository, &pull_request.target.name, config),
        sender: convert_user(&src.actor),
        pull_request,
    }
}

fn convert_pull_request_details(src: &payload::PullRequest) -> PullRequest {
    let state = match src.state.as_str() {
        "OPEN" => PullRequestState::Open,
        "MERGED" => PullRequestState::Merged,
        _ => PullRequestState::Closed,
    };

    PullRequest {
        number: src.id,
        title: src.title.clone(),
        body: src.description.clone(),
        state,
        sha: src.source.hash(),
        r#ref: format!("refs/pull-requests/{}/from", src.id),
        source: BranchRef {
            name: src.source.branch.name.clone(),
            sha: src.source.hash(),
            repository: src.source.repository_name(),
        },
        target: BranchRef {
            name: src.destination.branch.name.clone(),
            sha: src.destination.hash(),
            repository: src.destination.repository_name(),
        },
        fork: src.source.repository_name(),
        link: src.links.html_href(),
        closed: state != PullRequestState::Open,
        merged: state == PullRequestState::Merged,
        author: src.author.as_ref().map(convert_user).unwrap_or_default(),
        created: src.created_on,
        updated: src.updated_on,
    }
}

// ============================================================================
// Shared
// ============================================================================

fn convert_repository(src: &payload::Repository, branch: &str, config: &BitbucketConfig) -> Repository {
    let (namespace, name) = match src.full_name.split_once('/') {
        Some((namespace, name)) => (namespace.to_string(), name.to_string()),
        None => (String::new(), src.full_name.clone()),
    };

    Repository {
        id: src.uuid.clone(),
        namespace,
        name,
        branch: branch.to_string(),
        private: src.is_private,
        clone: config.clone_url(&src.full_name),
        clone_ssh: config.clone_ssh_url(&src.full_name),
        link: src.links.html_href(),
    }
}

fn convert_user(src: &Account) -> User {
    User {
        login: src.login(),
        name: src.display_name.clone(),
        email: String::new(),
        avatar: src.links.avatar_href(),
    }
}

fn convert_commit(src: &CommitInfo) -> Commit {
    let author = convert_signature(src.author.as_ref(), src);
    Commit {
        sha: src.hash.clone(),
        message: src.message.clone(),
        link: src.links.html_href(),
        committer: author.clone(),
        author,
        added: Vec::new(),
        removed: Vec::new(),
        modified: Vec::new(),
    }
}

fn convert_signature(author: Option<&Author>, commit: &CommitInfo) -> Signature {
    let Some(author) = author else {
        return Signature {
            date: commit.date,
            ..Signature::default()
        };
    };

    let (raw_name, email) = split_author(&author.raw);
    let user = author.user.as_ref();

    Signature {
        login: user.map(Account::login).unwrap_or_default(),
        name: user
            .map(|u| u.display_name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or(raw_name),
        email,
        avatar: user.map(|u| u.links.avatar_href()).unwrap_or_default(),
        date: commit.date,
    }
}

fn author_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^\s*(?P<name>[^<]*?)\s*<(?P<email>[^<>]*)>\s*$").ok())
        .as_ref()
}

/// Split a git `Name <email>` string; strings without an address are all name
pub fn split_author(raw: &str) -> (String, String) {
    if let Some(captures) = author_pattern().and_then(|re| re.captures(raw)) {
        return (
            captures["name"].to_string(),
            captures["email"].to_string(),
        );
    }
    (raw.trim().to_string(), String::new())
}

#[cfg(test)]
#[path = "decode_tests.rs"]
mod tests;
