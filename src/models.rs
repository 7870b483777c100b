use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::ModerationError;

/// Snapshot of a post as the search engine sees it: the external identifier
/// plus the two indexed text fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SearchPost {
    pub id: i32,
    pub title: String,
    pub description: String,
}

/// An index hit. The score is only meaningful for ranking within a single
/// query; it is never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPost {
    pub id: i32,
    pub score: f32,
}

/// Content events fed to the incremental index by the content-management
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostEvent {
    Created(SearchPost),
    Updated(SearchPost),
    Deleted(i32),
}

/// A moderator decision against reported content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModerationAction {
    Block,
    Allow,
}

impl ModerationAction {
    /// Audit-row literal, as stored in `ReportActions.Action`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationAction::Block => "BLOCK",
            ModerationAction::Allow => "ALLOW",
        }
    }
}

impl FromStr for ModerationAction {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ModerationError::Validation(
                "please provide an action".to_string(),
            ));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "block" => Ok(ModerationAction::Block),
            "allow" => Ok(ModerationAction::Allow),
            _ => Err(ModerationError::Validation(
                "please provide a valid action (block or allow)".to_string(),
            )),
        }
    }
}

/// The reported content a moderation decision applies to. A report references
/// exactly one post or one comment, never both and never neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportTarget {
    Post(i32),
    Comment(i32),
}

impl ReportTarget {
    /// Builds a target from the optional id pair of the wire contract,
    /// rejecting the contradictory combinations before any mutation happens.
    pub fn from_ids(
        comment_id: Option<i32>,
        post_id: Option<i32>,
    ) -> Result<Self, ModerationError> {
        match (comment_id, post_id) {
            (Some(comment_id), None) => Ok(ReportTarget::Comment(comment_id)),
            (None, Some(post_id)) => Ok(ReportTarget::Post(post_id)),
            (None, None) => Err(ModerationError::Validation(
                "please provide a post id or a comment id".to_string(),
            )),
            (Some(_), Some(_)) => Err(ModerationError::Validation(
                "please provide only one of post id or comment id".to_string(),
            )),
        }
    }
}

/// Caller-facing result of `resolve_report`: success flag plus the message of
/// any underlying error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModerationOutcome {
    pub succeeded: bool,
    pub message: String,
}

impl ModerationOutcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            message: String::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parses_case_insensitively() {
        assert_eq!(
            "block".parse::<ModerationAction>().unwrap(),
            ModerationAction::Block
        );
        assert_eq!(
            "ALLOW".parse::<ModerationAction>().unwrap(),
            ModerationAction::Allow
        );
        assert_eq!(
            " Block ".parse::<ModerationAction>().unwrap(),
            ModerationAction::Block
        );
    }

    #[test]
    fn action_rejects_unknown_literals() {
        assert!("".parse::<ModerationAction>().is_err());
        assert!("delete".parse::<ModerationAction>().is_err());
    }

    #[test]
    fn target_requires_exactly_one_id() {
        assert_eq!(
            ReportTarget::from_ids(Some(7), None).unwrap(),
            ReportTarget::Comment(7)
        );
        assert_eq!(
            ReportTarget::from_ids(None, Some(3)).unwrap(),
            ReportTarget::Post(3)
        );
        assert!(ReportTarget::from_ids(None, None).is_err());
        assert!(ReportTarget::from_ids(Some(1), Some(2)).is_err());
    }
}
