//! Docs import pipeline.
//!
//! Walks a local document tree, parses title and summary out of Markdown,
//! and performs an idempotent create-or-update keyed on the stable
//! (`import`, path) reference. Re-running over an unchanged tree only
//! produces `updated` counts; unreadable or empty files are counted as
//! skipped, never fatal. Intended as a one-shot administrative action
//! bounded by local filesystem I/O.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::KbResult;
use crate::lifecycle::{Severity, SourceType};
use crate::models::{CreateArticleInput, ImportReport, UpdateArticleInput};
use crate::store::{normalize_operator, normalize_tags, KnowledgeStore};

const SUMMARY_MAX_CHARS: usize = 160;
const IMPORT_CATEGORY: &str = "docs";
const BASE_TAG: &str = "docs";

impl KnowledgeStore {
    /// Imports every Markdown file under `root` into the knowledge base.
    pub async fn import_docs(&self, root: &Path, operator: &str) -> KbResult<ImportReport> {
        let operator = normalize_operator(operator);
        let include = markdown_globset();
        let exclude = default_exclude_globset();
        let mut report = ImportReport::default();

        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable walk entry");
                    report.skipped += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            if exclude.is_match(&rel) || !include.is_match(&rel) {
                continue;
            }

            let content = match std::fs::read_to_string(entry.path()) {
                Ok(raw) => raw.trim().to_string(),
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping unreadable file");
                    report.skipped += 1;
                    continue;
                }
            };
            if content.is_empty() {
                report.skipped += 1;
                continue;
            }

            // Root-name-relative path: the stable reference key across
            // re-imports, independent of where the tree is mounted.
            let root_name = root
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let ref_path = if root_name.is_empty() {
                rel.clone()
            } else {
                format!("{}/{}", root_name, rel)
            };
            let title = parse_title(&content, entry.path());
            let summary = parse_summary(&content);
            let tags = tags_from_path(&ref_path);

            let existing = self
                .find_article_by_reference(SourceType::Import.as_str(), &ref_path)
                .await?;
            let outcome = match existing {
                Some(article_id) => self
                    .update_article(
                        &article_id,
                        UpdateArticleInput {
                            title: title.clone(),
                            summary,
                            category: IMPORT_CATEGORY.to_string(),
                            severity: Severity::Medium.as_str().to_string(),
                            content,
                            tags,
                            updated_by: operator.clone(),
                            change_note: "sync docs import".to_string(),
                            source_type: SourceType::Import.as_str().to_string(),
                            source_ref: ref_path.clone(),
                            ref_title: title,
                        },
                    )
                    .await
                    .map(|_| true),
                None => self
                    .create_article(CreateArticleInput {
                        title: title.clone(),
                        summary,
                        category: IMPORT_CATEGORY.to_string(),
                        severity: Severity::Medium.as_str().to_string(),
                        content,
                        tags,
                        created_by: operator.clone(),
                        change_note: "initial docs import".to_string(),
                        source_type: SourceType::Import.as_str().to_string(),
                        source_ref: ref_path.clone(),
                        ref_title: title,
                    })
                    .await
                    .map(|_| false),
            };
            match outcome {
                Ok(was_update) => {
                    if was_update {
                        report.updated += 1;
                    } else {
                        report.imported += 1;
                    }
                    report.files.push(ref_path);
                }
                Err(err) => {
                    warn!(path = %ref_path, error = %err, "skipping file after write failure");
                    report.skipped += 1;
                }
            }
        }

        report.files.sort();
        info!(
            imported = report.imported,
            updated = report.updated,
            skipped = report.skipped,
            "docs import finished"
        );
        Ok(report)
    }
}

fn markdown_globset() -> GlobSet {
    build_globset(&["**/*.md", "*.md"])
}

fn default_exclude_globset() -> GlobSet {
    build_globset(&["**/.git/**", "**/node_modules/**", "**/target/**"])
}

fn build_globset(patterns: &[&str]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        if let Ok(glob) = Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// First `#`-prefixed heading line, else the file stem.
fn parse_title(content: &str, path: &Path) -> String {
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(stripped) = trimmed.strip_prefix('#') {
            let title = stripped.trim_start_matches('#').trim();
            if !title.is_empty() {
                return title.to_string();
            }
        }
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .unwrap_or_default();
    if stem.is_empty() {
        "Untitled".to_string()
    } else {
        stem
    }
}

/// First non-empty, non-heading line, truncated to 160 chars.
fn parse_summary(content: &str) -> String {
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let chars: Vec<char> = trimmed.chars().collect();
        if chars.len() > SUMMARY_MAX_CHARS {
            let cut: String = chars[..SUMMARY_MAX_CHARS].iter().collect();
            return format!("{}...", cut);
        }
        return trimmed.to_string();
    }
    String::new()
}

/// Lower-cased directory segments of the slash path, always including the
/// base docs tag, deduplicated and sorted.
fn tags_from_path(path: &str) -> Vec<String> {
    let clean = path.trim().trim_matches('/');
    if clean.is_empty() {
        return Vec::new();
    }
    let parts: Vec<&str> = clean.split('/').collect();
    let mut tags: Vec<String> = vec![BASE_TAG.to_string()];
    if parts.len() > 1 {
        for part in &parts[..parts.len() - 1] {
            let p = part.trim().to_lowercase();
            if p.is_empty() || p == "." {
                continue;
            }
            tags.push(p);
        }
    }
    normalize_tags(&tags)
}
