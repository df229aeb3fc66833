//! Bitbucket event classification.
//!
//! Maps `X-Event-Key` header values to the event kinds the decoder
//! understands. Matching is exact and case-sensitive.

use crate::events::PullRequestAction;
use std::fmt;

/// A Bitbucket event with a canonical mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Push,
    PullRequestCreated,
    PullRequestUpdated,
    PullRequestFulfilled,
    PullRequestRejected,
    PullRequestCommentCreated,
}

/// Every recognized event key and its kind
pub static EVENT_TABLE: &[(&str, EventKind)] = &[
    ("repo:push", EventKind::Push),
    ("pullrequest:created", EventKind::PullRequestCreated),
    ("pullrequest:updated", EventKind::PullRequestUpdated),
    ("pullrequest:fulfilled", EventKind::PullRequestFulfilled),
    ("pullrequest:rejected", EventKind::PullRequestRejected),
    (
        "pullrequest:comment_created",
        EventKind::PullRequestCommentCreated,
    ),
];

impl EventKind {
    /// Look up an event key; `None` means the event is unhandled
    pub fn classify(event_key: &str) -> Option<Self> {
        EVENT_TABLE
            .iter()
            .find(|(key, _)| *key == event_key)
            .map(|(_, kind)| *kind)
    }

    /// The event key this kind is classified from
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "repo:push",
            Self::PullRequestCreated => "pullrequest:created",
            Self::PullRequestUpdated => "pullrequest:updated",
            Self::PullRequestFulfilled => "pullrequest:fulfilled",
            Self::PullRequestRejected => "pullrequest:rejected",
            Self::PullRequestCommentCreated => "pullrequest:comment_created",
        }
    }

    /// The pull request action implied by the event key.
    ///
    /// Only the key decides the action; the payload state is never consulted.
    pub fn pull_request_action(&self) -> Option<PullRequestAction> {
        match self {
            Self::PullRequestCreated => Some(PullRequestAction::Created),
            Self::PullRequestUpdated => Some(PullRequestAction::Updated),
            Self::PullRequestFulfilled => Some(PullRequestAction::Merged),
            Self::PullRequestRejected => Some(PullRequestAction::Closed),
            Self::Push | Self::PullRequestCommentCreated => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event keys with a canonical mapping, in table order
pub fn supported_events() -> impl Iterator<Item = &'static str> {
    EVENT_TABLE.iter().map(|(key, _)| *key)
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
