//! Git reference helpers.
//!
//! Providers mix full reference paths (`refs/heads/main`) and short names
//! (`main`). Canonical push events always carry the full path while branch and
//! tag events always carry the short name; these helpers convert between the two.

/// Prefix of branch reference paths.
pub const BRANCH_PREFIX: &str = "refs/heads/";

/// Prefix of tag reference paths.
pub const TAG_PREFIX: &str = "refs/tags/";

/// The all-zero commit hash marking a reference that did not exist before, or
/// no longer exists after, an event.
pub const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

/// Returns true when `sha` is the zero-hash sentinel or empty.
pub fn is_zero_sha(sha: &str) -> bool {
    sha.bytes().all(|b| b == b'0')
}

/// Expand a short reference name into a full path with the given prefix.
///
/// The name is always treated as short, so a branch literally named
/// `refs/tags/v1` becomes `refs/heads/refs/tags/v1`.
///
/// # Examples
///
/// ```rust
/// use scm_hooks_core::events::reference::{expand_ref, BRANCH_PREFIX};
///
/// assert_eq!(expand_ref("main", BRANCH_PREFIX), "refs/heads/main");
/// assert_eq!(expand_ref("refs/x", BRANCH_PREFIX), "refs/heads/refs/x");
/// ```
pub fn expand_ref(name: &str, prefix: &str) -> String {
    format!("{}{}", prefix, name)
}

/// Strip the branch or tag prefix from a reference path.
///
/// # Examples
///
/// ```rust
/// use scm_hooks_core::events::reference::trim_ref;
///
/// assert_eq!(trim_ref("refs/tags/v1.0.0"), "v1.0.0");
/// assert_eq!(trim_ref("feature/login"), "feature/login");
/// ```
pub fn trim_ref(reference: &str) -> &str {
    reference
        .strip_prefix(BRANCH_PREFIX)
        .or_else(|| reference.strip_prefix(TAG_PREFIX))
        .unwrap_or(reference)
}

/// The kind of object a full reference path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Branch,
    Tag,
    Other,
}

impl RefKind {
    /// Classify a full reference path by its prefix.
    pub fn from_ref(reference: &str) -> Self {
        if reference.starts_with(BRANCH_PREFIX) {
            Self::Branch
        } else if reference.starts_with(TAG_PREFIX) {
            Self::Tag
        } else {
            Self::Other
        }
    }
}

#[cfg(test)]
#[path = "reference_tests.rs"]
mod tests;
