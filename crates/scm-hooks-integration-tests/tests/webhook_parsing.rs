//! Integration tests for decoding Bitbucket deliveries
//!
//! These tests drive the public provider API with captured payloads and check:
//! - Every supported event key decodes into the expected canonical event
//! - Reference paths are full on pushes and short on branch and tag events
//! - Unhandled event keys are acknowledged without decoding
//! - Decoding the same delivery twice yields the same event

mod common;

use common::{fixture, query_request, RecordingResolver, EVENT_FIXTURES, SECRET};
use scm_hooks_core::events::reference::{trim_ref, ZERO_SHA};
use scm_hooks_core::webhook::bitbucket::{BitbucketConfig, BitbucketWebhookProvider};
use scm_hooks_core::webhook::{WebhookError, WebhookOutcome, WebhookParser};
use scm_hooks_core::{
    Event, HookKind, PullRequestAction, PullRequestState, RefAction, WebhookRequest,
};

const OLD_SHA: &str = "141977fedf5cc7a0c4d6b4a4b1bd5e2b1c1f6f3a";
const NEW_SHA: &str = "823f8ae9d0a1b5a9d3ac46f9f5a3c1b7e1a0e7f2";

async fn parse_with(
    provider: &BitbucketWebhookProvider,
    event_key: &str,
    name: &str,
) -> Result<WebhookOutcome, WebhookError> {
    let request = query_request(event_key, SECRET, fixture(name));
    provider
        .parse(&request, &RecordingResolver::new(SECRET))
        .await
}

async fn parse_event(event_key: &str, name: &str) -> Event {
    let outcome = parse_with(&BitbucketWebhookProvider::default(), event_key, name)
        .await
        .unwrap_or_else(|e| panic!("{} failed to parse: {}", name, e));
    outcome
        .into_event()
        .unwrap_or_else(|| panic!("{} was not decoded", name))
}

// ============================================================================
// Reference Shape
// ============================================================================

/// Push events carry full reference paths, branch and tag events carry short names
#[tokio::test]
async fn test_reference_shape_across_all_fixtures() {
    for (event_key, name) in EVENT_FIXTURES {
        match parse_event(event_key, name).await {
            Event::Push(hook) => {
                assert!(hook.r#ref.starts_with("refs/"), "{}: {}", name, hook.r#ref);
                assert_eq!(hook.repo.branch, trim_ref(&hook.r#ref));
                if hook.before != ZERO_SHA && hook.after != ZERO_SHA {
                    assert!(!hook.created && !hook.deleted, "{}", name);
                }
            }
            Event::Branch(hook) => {
                assert!(!hook.reference.name.starts_with("refs/"), "{}", name);
            }
            Event::Tag(hook) => {
                assert!(!hook.reference.name.starts_with("refs/"), "{}", name);
            }
            Event::PullRequest(hook) => {
                let pr = &hook.pull_request;
                assert_eq!(pr.r#ref, format!("refs/pull-requests/{}/from", pr.number));
            }
            Event::PullRequestComment(hook) => {
                let pr = &hook.pull_request;
                assert_eq!(pr.r#ref, format!("refs/pull-requests/{}/from", pr.number));
            }
        }
    }
}

/// Every decoded event names the repository and sender from the body
#[tokio::test]
async fn test_repository_and_sender_on_every_event() {
    for (event_key, name) in EVENT_FIXTURES {
        let event = parse_event(event_key, name).await;

        let repo = event.repository();
        assert_eq!(repo.full_name(), "brydzewski/hello-world", "{}", name);
        assert_eq!(repo.clone, "https://bitbucket.org/brydzewski/hello-world.git");
        assert_eq!(repo.clone_ssh, "git@bitbucket.org:brydzewski/hello-world.git");
        assert_eq!(repo.link, "https://bitbucket.org/brydzewski/hello-world");
        assert!(repo.private);

        let sender = event.sender();
        assert_eq!(sender.login, "brydzewski", "{}", name);
        assert_eq!(sender.name, "Brad Rydzewski");
        assert_eq!(
            sender.avatar,
            "https://bitbucket.org/account/brydzewski/avatar/32/"
        );
    }
}

// ============================================================================
// Push
// ============================================================================

#[tokio::test]
async fn test_push_to_existing_branch() {
    let Event::Push(hook) = parse_event("repo:push", "push.json").await else {
        panic!("expected push");
    };

    assert_eq!(hook.r#ref, "refs/heads/master");
    assert_eq!(hook.before, OLD_SHA);
    assert_eq!(hook.after, NEW_SHA);
    assert!(!hook.created);
    assert!(!hook.deleted);
    assert!(!hook.forced);
    assert_eq!(hook.repo.branch, "master");
    assert_eq!(hook.commits.len(), 1);

    let head = hook.commit.expect("head commit");
    assert_eq!(head.sha, NEW_SHA);
    assert_eq!(head.message, "Update README.md\n");
    assert_eq!(
        head.link,
        format!("https://bitbucket.org/brydzewski/hello-world/commits/{}", NEW_SHA)
    );
    assert_eq!(head.author.name, "Brad Rydzewski");
    assert_eq!(head.author.email, "brad.rydzewski@gmail.com");
    assert_eq!(head.author.login, "brydzewski");
    assert_eq!(head.committer, head.author);
    assert!(head.author.date.is_some());
}

#[tokio::test]
async fn test_forced_push_is_flagged() {
    let Event::Push(hook) = parse_event("repo:push", "push_forced.json").await else {
        panic!("expected push");
    };

    assert!(hook.forced);
    assert_eq!(hook.before, NEW_SHA);
    assert!(hook.reference_event().is_none());
}

#[tokio::test]
async fn test_branch_creation_stays_a_push() {
    let Event::Push(hook) = parse_event("repo:push", "push_branch_create.json").await else {
        panic!("expected push");
    };

    assert_eq!(hook.r#ref, "refs/heads/feature/login");
    assert_eq!(hook.before, ZERO_SHA);
    assert_eq!(hook.after, NEW_SHA);
    assert!(hook.created);
    assert_eq!(hook.repo.branch, "feature/login");

    match hook.reference_event() {
        Some(Event::Branch(branch)) => {
            assert_eq!(branch.action, RefAction::Create);
            assert_eq!(branch.reference.name, "feature/login");
            assert_eq!(branch.reference.sha, NEW_SHA);
        }
        other => panic!("expected branch view, got {:?}", other),
    }
}

#[tokio::test]
async fn test_branch_deletion_becomes_branch_event() {
    let Event::Branch(hook) = parse_event("repo:push", "push_branch_delete.json").await else {
        panic!("expected branch");
    };

    assert_eq!(hook.action, RefAction::Delete);
    assert_eq!(hook.reference.name, "feature/login");
    assert_eq!(hook.reference.sha, OLD_SHA);
    assert_eq!(hook.repo.branch, "feature/login");
}

#[tokio::test]
async fn test_tag_deletion_becomes_tag_event() {
    let Event::Tag(hook) = parse_event("repo:push", "push_tag_delete.json").await else {
        panic!("expected tag");
    };

    assert_eq!(hook.action, RefAction::Delete);
    assert_eq!(hook.reference.name, "v1.0.0");
    assert_eq!(hook.reference.sha, OLD_SHA);
}

#[tokio::test]
async fn test_tag_creation_is_a_push_by_default() {
    let Event::Push(hook) = parse_event("repo:push", "push_tag_create.json").await else {
        panic!("expected push");
    };

    assert_eq!(hook.r#ref, "refs/tags/v1.0.0");
    assert_eq!(hook.before, ZERO_SHA);
    assert!(hook.created);
    assert!(hook.commits.is_empty());
}

#[tokio::test]
async fn test_tag_creation_as_tag_event_when_configured() {
    let provider = BitbucketWebhookProvider::new(BitbucketConfig {
        tag_creates_as_tag_hooks: true,
        ..BitbucketConfig::default()
    })
    .unwrap();

    let outcome = parse_with(&provider, "repo:push", "push_tag_create.json")
        .await
        .unwrap();
    let Some(Event::Tag(hook)) = outcome.into_event() else {
        panic!("expected tag");
    };
    assert_eq!(hook.action, RefAction::Create);
    assert_eq!(hook.reference.name, "v1.0.0");
    assert_eq!(hook.reference.sha, NEW_SHA);

    // Branch creations are unaffected by the switch
    let outcome = parse_with(&provider, "repo:push", "push_branch_create.json")
        .await
        .unwrap();
    assert_eq!(outcome.event().map(Event::kind), Some(HookKind::Push));
}

#[tokio::test]
async fn test_custom_clone_host_is_applied() {
    let provider = BitbucketWebhookProvider::new(BitbucketConfig {
        clone_base_url: "https://git.example.com/scm/".to_string(),
        ssh_host: "git.example.com".to_string(),
        ..BitbucketConfig::default()
    })
    .unwrap();

    let outcome = parse_with(&provider, "repo:push", "push.json").await.unwrap();
    let repo = outcome.event().map(|e| e.repository().clone()).unwrap();

    assert_eq!(repo.clone, "https://git.example.com/scm/brydzewski/hello-world.git");
    assert_eq!(repo.clone_ssh, "git@git.example.com:brydzewski/hello-world.git");
}

// ============================================================================
// Pull Requests
// ============================================================================

#[tokio::test]
async fn test_pull_request_actions_follow_event_key() {
    let cases = [
        ("pullrequest:created", "pr_created.json", PullRequestAction::Created),
        ("pullrequest:updated", "pr_updated.json", PullRequestAction::Updated),
        ("pullrequest:fulfilled", "pr_fulfilled.json", PullRequestAction::Merged),
        ("pullrequest:rejected", "pr_declined.json", PullRequestAction::Closed),
    ];

    for (event_key, name, action) in cases {
        let Event::PullRequest(hook) = parse_event(event_key, name).await else {
            panic!("{}: expected pull request", name);
        };
        assert_eq!(hook.action, action, "{}", name);
    }
}

#[tokio::test]
async fn test_pull_request_created() {
    let Event::PullRequest(hook) = parse_event("pullrequest:created", "pr_created.json").await
    else {
        panic!("expected pull request");
    };
    let pr = hook.pull_request;

    assert_eq!(pr.number, 1);
    assert_eq!(pr.title, "Update README.md");
    assert_eq!(pr.body, "Fixes a typo in the README");
    assert_eq!(pr.state, PullRequestState::Open);
    assert!(!pr.closed);
    assert!(!pr.merged);
    assert_eq!(pr.sha, "c8d8b1cd0ae3");
    assert_eq!(pr.source.name, "develop");
    assert_eq!(pr.target.name, "master");
    assert_eq!(pr.target.sha, "141977fedf5c");
    assert_eq!(pr.fork, "brydzewski/hello-world");
    assert_eq!(
        pr.link,
        "https://bitbucket.org/brydzewski/hello-world/pull-requests/1"
    );
    assert_eq!(pr.author.login, "brydzewski");
    assert!(pr.created.is_some());
    assert!(pr.updated.is_some());
    assert_eq!(hook.repo.branch, "master");
}

#[tokio::test]
async fn test_pull_request_from_fork_with_slash_branch() {
    let Event::PullRequest(hook) =
        parse_event("pullrequest:created", "pr_created_slashbranch.json").await
    else {
        panic!("expected pull request");
    };
    let pr = hook.pull_request;

    assert_eq!(pr.source.name, "feature/readme-typo");
    assert_eq!(pr.source.repository, "octocat/hello-world");
    assert_eq!(pr.fork, "octocat/hello-world");
    assert_eq!(pr.target.repository, "brydzewski/hello-world");
    assert_eq!(pr.r#ref, "refs/pull-requests/1/from");
}

#[tokio::test]
async fn test_pull_request_terminal_states() {
    let Event::PullRequest(merged) = parse_event("pullrequest:fulfilled", "pr_fulfilled.json").await
    else {
        panic!("expected pull request");
    };
    assert_eq!(merged.pull_request.state, PullRequestState::Merged);
    assert!(merged.pull_request.merged);
    assert!(merged.pull_request.closed);

    let Event::PullRequest(declined) = parse_event("pullrequest:rejected", "pr_declined.json").await
    else {
        panic!("expected pull request");
    };
    assert_eq!(declined.pull_request.state, PullRequestState::Closed);
    assert!(!declined.pull_request.merged);
    assert!(declined.pull_request.closed);
}

#[tokio::test]
async fn test_pull_request_comment_created() {
    let Event::PullRequestComment(hook) =
        parse_event("pullrequest:comment_created", "pr_comment_created.json").await
    else {
        panic!("expected pull request comment");
    };

    assert_eq!(hook.comment.id, 67043512);
    assert_eq!(hook.comment.body, "Looks good to me");
    assert_eq!(hook.comment.author.login, "brydzewski");
    assert!(hook
        .comment
        .link
        .ends_with("/pull-requests/1/_/diff#comment-67043512"));
    assert!(hook.comment.created.is_some());
    assert_eq!(hook.pull_request.number, 1);
}

// ============================================================================
// Unhandled and Malformed
// ============================================================================

#[tokio::test]
async fn test_unhandled_event_is_acknowledged() {
    let resolver = RecordingResolver::new(SECRET);
    let request = query_request("repo:fork", SECRET, fixture("repo_fork.json"));

    let outcome = BitbucketWebhookProvider::default()
        .parse(&request, &resolver)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        WebhookOutcome::Unhandled {
            event_key: "repo:fork".to_string()
        }
    );
    // Unhandled events are still authenticated
    assert_eq!(resolver.call_count(), 1);
    assert!(!resolver.calls()[0].recognized);
}

#[tokio::test]
async fn test_unhandled_event_with_wrong_secret_is_rejected() {
    let request = query_request("repo:fork", "not-the-secret", fixture("repo_fork.json"));

    let result = BitbucketWebhookProvider::default()
        .parse(&request, &RecordingResolver::new(SECRET))
        .await;

    assert!(matches!(result, Err(WebhookError::InvalidSignature)));
}

#[tokio::test]
async fn test_body_of_wrong_shape_is_malformed() {
    // A pull request body delivered under the push key
    let result = parse_with(
        &BitbucketWebhookProvider::default(),
        "repo:push",
        "pr_created.json",
    )
    .await;

    match result {
        Err(WebhookError::MalformedPayload { path, .. }) => assert_eq!(path, "push"),
        other => panic!("expected malformed payload, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_json_is_malformed() {
    let request = query_request("repo:push", SECRET, b"{\"push\": ".to_vec());

    let result = BitbucketWebhookProvider::default()
        .parse(&request, &RecordingResolver::new(SECRET))
        .await;

    let error = result.unwrap_err();
    assert!(matches!(error, WebhookError::MalformedPayload { .. }));
    assert_eq!(error.status_code(), 400);
    assert!(!error.should_retry());
}

// ============================================================================
// Determinism
// ============================================================================

/// Parsing the same delivery twice yields identical events
#[test]
fn test_parsing_is_idempotent() {
    let provider = BitbucketWebhookProvider::default();
    let resolver = RecordingResolver::new(SECRET);

    for (event_key, name) in EVENT_FIXTURES {
        let request: WebhookRequest = query_request(event_key, SECRET, fixture(name));

        let first = tokio_test::block_on(provider.parse(&request, &resolver)).unwrap();
        let second = tokio_test::block_on(provider.parse(&request, &resolver)).unwrap();

        assert_eq!(first, second, "{}", name);
    }
    assert_eq!(resolver.call_count(), EVENT_FIXTURES.len() * 2);
}

/// Canonical events serialize with a `kind` tag
#[tokio::test]
async fn test_event_json_is_tagged() {
    let event = parse_event("repo:push", "push_tag_delete.json").await;
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["kind"], "tag");
    assert_eq!(json["action"], "delete");
    assert_eq!(json["reference"]["name"], "v1.0.0");
}
