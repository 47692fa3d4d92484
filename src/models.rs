//! Core data types for the knowledge base.
//!
//! These are the wire shapes the console and CLI consume; fields serialize
//! to camelCase and empty optional collections are omitted.

use serde::{Deserialize, Serialize};

use crate::lifecycle::{ArticleStatus, Severity};

/// A versioned knowledge entry with lifecycle status. Hydrated reads attach
/// tags, references, the full version history, and the review trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub severity: Severity,
    pub status: ArticleStatus,
    pub needs_review: bool,
    pub current_version: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub change_note: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<ArticleRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<ArticleVersion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<ReviewRecord>,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Immutable content snapshot. Version rows are append-only; no operation
/// updates or deletes an existing row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleVersion {
    pub version: i64,
    pub content: String,
    pub change_note: String,
    pub source_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source_ref: String,
    pub created_by: String,
    pub created_at: String,
}

/// Append-only audit record written for every lifecycle-affecting call,
/// including pure writes, so the trail fully reconstructs history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub comment: String,
    pub operator: String,
    pub created_at: String,
}

/// External-reference key identifying the origin of imported content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRef {
    pub ref_type: String,
    pub ref_path: String,
    pub ref_title: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub query: String,
    pub status: Option<ArticleStatus>,
    pub severity: Option<Severity>,
    pub tag: String,
    pub page: i64,
    pub page_size: i64,
    pub include_archived: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateArticleInput {
    pub title: String,
    pub summary: String,
    pub category: String,
    pub severity: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_by: String,
    pub change_note: String,
    pub source_type: String,
    pub source_ref: String,
    pub ref_title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateArticleInput {
    pub title: String,
    pub summary: String,
    pub category: String,
    pub severity: String,
    pub content: String,
    pub tags: Vec<String>,
    pub updated_by: String,
    pub change_note: String,
    pub source_type: String,
    pub source_ref: String,
    pub ref_title: String,
}

/// Question-answering result. Citations list every retrieved article so
/// downstream consumers can verify the answer and feed the citation-ratio
/// gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub article_id: String,
    pub title: String,
    pub version: i64,
}

/// Aggregate outcome of a docs import run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: u64,
    pub updated: u64,
    pub skipped: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}
