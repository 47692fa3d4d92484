//! Article lifecycle: status and action vocabulary, the review state
//! machine, and the staleness check behind the advisory `needsReview` flag.
//!
//! The transition table is an exhaustive match; every disallowed
//! `(status, action)` pair is rejected explicitly:
//!
//! | action  | valid from                  | resulting state |
//! |---------|-----------------------------|-----------------|
//! | submit  | draft                       | reviewing       |
//! | approve | reviewing                   | published       |
//! | reject  | reviewing                   | draft           |
//! | archive | draft, reviewing, published | archived        |

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KbError, KbResult};

pub const DEFAULT_REVIEW_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Reviewing,
    Published,
    Archived,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Reviewing => "reviewing",
            ArticleStatus::Published => "published",
            ArticleStatus::Archived => "archived",
        }
    }

    pub fn parse(raw: &str) -> Option<ArticleStatus> {
        match raw.trim().to_lowercase().as_str() {
            "draft" => Some(ArticleStatus::Draft),
            "reviewing" => Some(ArticleStatus::Reviewing),
            "published" => Some(ArticleStatus::Published),
            "archived" => Some(ArticleStatus::Archived),
            _ => None,
        }
    }

    /// Stored rows always come from `as_str`, but an unknown value falls
    /// back to draft rather than poisoning every read.
    pub fn parse_lossy(raw: &str) -> ArticleStatus {
        Self::parse(raw).unwrap_or(ArticleStatus::Draft)
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    /// Unrecognized or empty severity normalizes to medium.
    pub fn parse_or_default(raw: &str) -> Severity {
        match raw.trim().to_lowercase().as_str() {
            "low" => Severity::Low,
            "medium" => Severity::Medium,
            "high" => Severity::High,
            _ => Severity::Medium,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Manual,
    Import,
    AiGenerated,
    Rollback,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Manual => "manual",
            SourceType::Import => "import",
            SourceType::AiGenerated => "ai-generated",
            SourceType::Rollback => "rollback",
        }
    }

    /// Unrecognized or empty source type normalizes to manual.
    pub fn parse_or_default(raw: &str) -> SourceType {
        match raw.trim().to_lowercase().as_str() {
            "manual" => SourceType::Manual,
            "import" => SourceType::Import,
            "ai-generated" => SourceType::AiGenerated,
            "rollback" => SourceType::Rollback,
            _ => SourceType::Manual,
        }
    }
}

/// Reviewer-driven lifecycle actions. Content actions (`create`, `update`,
/// `rollback`) also land in the review trail but are recorded directly by
/// their operations, not dispatched through the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Submit,
    Approve,
    Reject,
    Archive,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Submit => "submit",
            LifecycleAction::Approve => "approve",
            LifecycleAction::Reject => "reject",
            LifecycleAction::Archive => "archive",
        }
    }

    pub fn parse(raw: &str) -> Option<LifecycleAction> {
        match raw.trim().to_lowercase().as_str() {
            "submit" => Some(LifecycleAction::Submit),
            "approve" => Some(LifecycleAction::Approve),
            "reject" => Some(LifecycleAction::Reject),
            "archive" => Some(LifecycleAction::Archive),
            _ => None,
        }
    }
}

/// Computes the next status for an action, or an invalid-input error when
/// the action is not allowed from the current status. A no-op action
/// (e.g. submit while already reviewing) is rejected, not repeated.
pub fn transition(status: ArticleStatus, action: LifecycleAction) -> KbResult<ArticleStatus> {
    use ArticleStatus::*;
    use LifecycleAction::*;

    match (status, action) {
        (Draft, Submit) => Ok(Reviewing),
        (Reviewing, Approve) => Ok(Published),
        (Reviewing, Reject) => Ok(Draft),
        (Draft, Archive) | (Reviewing, Archive) | (Published, Archive) => Ok(Archived),
        (from, act) => Err(KbError::invalid(format!(
            "action {} not allowed from status {}",
            act.as_str(),
            from.as_str()
        ))),
    }
}

/// A published article needs a periodic review once its last update falls
/// outside the review window. Advisory only; never transitions state.
pub fn needs_review(status: ArticleStatus, updated_at: &str, window_days: i64) -> bool {
    if status != ArticleStatus::Published || window_days <= 0 {
        return false;
    }
    let updated = match DateTime::parse_from_rfc3339(updated_at.trim()) {
        Ok(ts) => ts.with_timezone(&Utc),
        Err(_) => return false,
    };
    Utc::now() > updated + Duration::days(window_days)
}
