//! Two-tier retrieval, question answering, and recommendations.
//!
//! Tier 1 is the structured substring query over title/summary/current
//! content/tags. Tier 2 activates only when tier 1 returns nothing: the
//! query is tokenized (whole word tokens plus 2- and 3-character windows
//! over non-ASCII runs, for scripts without whitespace word boundaries) and
//! every eligible candidate is scored by weighted field hits. No full-text
//! index is involved.

use crate::error::{KbError, KbResult};
use crate::lifecycle::ArticleStatus;
use crate::models::{Article, AskResult, Citation, ListQuery};
use crate::store::{KnowledgeStore, MAX_PAGE_SIZE};

const DEFAULT_SEARCH_LIMIT: i64 = 10;
const DEFAULT_ASK_LIMIT: i64 = 3;
const MAX_QUERY_TOKENS: usize = 32;
const SNIPPET_MAX_CHARS: usize = 180;
const CANDIDATE_PAGE_CAP: i64 = 10;

const FALLBACK_ANSWER: &str =
    "No matching knowledge entries were found. Try more specific keywords.";
const FALLBACK_SNIPPET: &str =
    "Review the article's runbook steps and change history for details.";

impl KnowledgeStore {
    /// Structured search first, token-scoring fallback second. An empty
    /// query is an empty result, not an error.
    pub async fn search(
        &self,
        query: &str,
        limit: i64,
        include_archived: bool,
    ) -> KbResult<Vec<Article>> {
        let q = query.trim();
        if q.is_empty() {
            return Ok(Vec::new());
        }
        let limit = clamp_limit(limit, DEFAULT_SEARCH_LIMIT);
        let status = eligible_status(include_archived);

        let (items, _) = self
            .list_articles(&ListQuery {
                query: q.to_string(),
                status,
                page: 1,
                page_size: limit,
                include_archived,
                ..ListQuery::default()
            })
            .await?;
        if !items.is_empty() {
            return Ok(items);
        }
        self.search_by_tokens(q, limit, include_archived).await
    }

    /// Composes a templated answer with citations from retrieved articles.
    /// No generative model is invoked; every retrieved article is cited
    /// with its id, title, and version.
    pub async fn ask(&self, question: &str, limit: i64) -> KbResult<AskResult> {
        let question = question.trim();
        if question.is_empty() {
            return Err(KbError::invalid("question is required"));
        }
        let limit = clamp_limit(limit, DEFAULT_ASK_LIMIT);

        let items = self.search(question, limit, false).await?;
        if items.is_empty() {
            return Ok(AskResult {
                answer: FALLBACK_ANSWER.to_string(),
                citations: Vec::new(),
                confidence: 0.2,
            });
        }

        let citations = items
            .iter()
            .map(|item| Citation {
                article_id: item.id.clone(),
                title: item.title.clone(),
                version: item.current_version,
            })
            .collect();

        let top = &items[0];
        let mut snippet = top.summary.trim().to_string();
        if snippet.is_empty() {
            snippet = snippet_from_content(&top.content, SNIPPET_MAX_CHARS);
        }
        if snippet.is_empty() {
            snippet = FALLBACK_SNIPPET.to_string();
        }
        Ok(AskResult {
            answer: format!("Based on article «{}»: {}", top.title, snippet),
            citations,
            confidence: 0.75,
        })
    }

    /// Same retrieval as `search` over non-archived articles; a distinct
    /// operation because its caller-facing semantics may diverge later.
    pub async fn recommendations(&self, query: &str, limit: i64) -> KbResult<Vec<Article>> {
        self.search(query, limit, false).await
    }

    async fn search_by_tokens(
        &self,
        query: &str,
        limit: i64,
        include_archived: bool,
    ) -> KbResult<Vec<Article>> {
        let tokens = tokenize_query(query);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let status = eligible_status(include_archived);

        let mut candidates: Vec<Article> = Vec::new();
        let mut page = 1;
        loop {
            let (items, total) = self
                .list_articles(&ListQuery {
                    status,
                    include_archived,
                    page,
                    page_size: MAX_PAGE_SIZE,
                    ..ListQuery::default()
                })
                .await?;
            let fetched = items.len();
            candidates.extend(items);
            if fetched == 0 || candidates.len() as i64 >= total || page >= CANDIDATE_PAGE_CAP {
                break;
            }
            page += 1;
        }

        let mut scored: Vec<(Article, i64)> = candidates
            .into_iter()
            .filter_map(|article| {
                let score = score_article(&article, &tokens);
                if score > 0 {
                    Some((article, score))
                } else {
                    None
                }
            })
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.truncate(limit as usize);
        Ok(scored.into_iter().map(|(article, _)| article).collect())
    }
}

fn eligible_status(include_archived: bool) -> Option<ArticleStatus> {
    if include_archived {
        None
    } else {
        Some(ArticleStatus::Published)
    }
}

fn clamp_limit(limit: i64, default: i64) -> i64 {
    if limit <= 0 {
        default
    } else if limit > MAX_PAGE_SIZE {
        MAX_PAGE_SIZE
    } else {
        limit
    }
}

/// Splits the query into deduplicated scoring tokens: whole word/number
/// tokens (minimum length 3 for ASCII, 2 otherwise), 2- and 3-character
/// windows over non-ASCII runs of four or more characters, and the
/// alphanumeric compaction of the whole query when long enough.
fn tokenize_query(query: &str) -> Vec<String> {
    let normalized = query.trim().to_lowercase();
    if normalized.is_empty() {
        return Vec::new();
    }
    let mut tokens: Vec<String> = Vec::new();

    fn push(tokens: &mut Vec<String>, token: &str) {
        let token = token.trim();
        if token.is_empty() || tokens.iter().any(|t| t == token) {
            return;
        }
        tokens.push(token.to_string());
    }

    for part in normalized.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-')) {
        let part = part.trim_matches(|c| c == '-' || c == '_');
        if part.is_empty() {
            continue;
        }
        let chars: Vec<char> = part.chars().collect();
        if chars.len() >= min_token_len(part) {
            push(&mut tokens, part);
        }
        if is_ascii_word(part) || chars.len() < 4 {
            continue;
        }
        for n in 2..=3usize {
            for window in chars.windows(n) {
                push(&mut tokens, &window.iter().collect::<String>());
                if tokens.len() >= MAX_QUERY_TOKENS {
                    return tokens;
                }
            }
        }
    }

    let compact: String = normalized.chars().filter(|c| c.is_alphanumeric()).collect();
    if compact.chars().count() >= 4 {
        push(&mut tokens, &compact);
    }
    tokens.truncate(MAX_QUERY_TOKENS);
    tokens
}

fn min_token_len(token: &str) -> usize {
    if is_ascii_word(token) {
        3
    } else {
        2
    }
}

fn is_ascii_word(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii() && (c.is_ascii_alphanumeric() || c == '_' || c == '-'))
}

/// Weighted field hits: +8 title, +5 summary, +4 any tag, +2 content, plus
/// a +1 bonus per token that hit anything at all.
fn score_article(article: &Article, tokens: &[String]) -> i64 {
    if tokens.is_empty() {
        return 0;
    }
    let title = article.title.to_lowercase();
    let summary = article.summary.to_lowercase();
    let content = article.content.to_lowercase();
    let tags: Vec<String> = article.tags.iter().map(|t| t.to_lowercase()).collect();

    let mut score = 0;
    for token in tokens {
        if token.is_empty() {
            continue;
        }
        let mut hit = false;
        if title.contains(token.as_str()) {
            score += 8;
            hit = true;
        }
        if summary.contains(token.as_str()) {
            score += 5;
            hit = true;
        }
        if tags.iter().any(|tag| tag.contains(token.as_str())) {
            score += 4;
            hit = true;
        }
        if content.contains(token.as_str()) {
            score += 2;
            hit = true;
        }
        if hit {
            score += 1;
        }
    }
    score
}

/// First non-empty, non-heading Markdown line, truncated to `max` chars.
fn snippet_from_content(content: &str, max: usize) -> String {
    let max = if max == 0 { SNIPPET_MAX_CHARS } else { max };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        return truncate_chars(line, max);
    }
    String::new()
}

fn truncate_chars(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let cut: String = value.chars().take(max).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Severity;

    fn article(title: &str, summary: &str, content: &str, tags: &[&str]) -> Article {
        Article {
            id: "kb_test".to_string(),
            title: title.to_string(),
            summary: summary.to_string(),
            category: "ops".to_string(),
            severity: Severity::Medium,
            status: ArticleStatus::Published,
            needs_review: false,
            current_version: 1,
            content: content.to_string(),
            change_note: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            references: Vec::new(),
            versions: Vec::new(),
            reviews: Vec::new(),
            created_by: "tester".to_string(),
            updated_by: "tester".to_string(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn tokenizer_keeps_useful_ascii_terms() {
        let tokens = tokenize_query("CORS origin not allowed 怎么处理");
        for expected in ["cors", "origin", "allowed"] {
            assert!(
                tokens.iter().any(|t| t == expected),
                "expected token {:?} in {:?}",
                expected,
                tokens
            );
        }
        // "not" passes the 3-char ASCII minimum too
        assert!(tokens.iter().any(|t| t == "not"));
    }

    #[test]
    fn tokenizer_drops_short_ascii_noise() {
        let tokens = tokenize_query("a an io error");
        assert!(!tokens.iter().any(|t| t == "a" || t == "an" || t == "io"));
        assert!(tokens.iter().any(|t| t == "error"));
    }

    #[test]
    fn tokenizer_windows_non_ascii_runs() {
        let tokens = tokenize_query("上传队列积压如何排查");
        assert!(tokens.iter().any(|t| t == "上传"));
        assert!(tokens.iter().any(|t| t == "队列"));
        assert!(tokens.iter().any(|t| t == "排查"));
        assert!(tokens.len() <= MAX_QUERY_TOKENS);
    }

    #[test]
    fn tokenizer_adds_compacted_query() {
        let tokens = tokenize_query("up load");
        // Both parts are below the ASCII minimum, but the compaction survives.
        assert!(tokens.iter().any(|t| t == "upload"));
    }

    #[test]
    fn empty_query_tokenizes_to_nothing() {
        assert!(tokenize_query("   ").is_empty());
    }

    #[test]
    fn scoring_prefers_title_and_tag_hits() {
        let target = article(
            "Upload Queue Saturation Runbook",
            "Handle upload queue full and retry behaviors",
            "When upload queue full occurs, tune upload workers and queue size first.",
            &["upload", "queue", "runbook"],
        );
        let other = article(
            "AI Degraded Troubleshooting",
            "Fallback behavior",
            "Check AI endpoint timeout and network errors.",
            &["ai"],
        );
        let tokens = tokenize_query("upload queue full 的处理步骤");
        let target_score = score_article(&target, &tokens);
        let other_score = score_article(&other, &tokens);
        assert!(target_score > 0);
        assert_eq!(other_score, 0);
    }

    #[test]
    fn zero_score_for_unrelated_tokens() {
        let item = article("Disk usage alerts", "Thresholds", "df output", &["disk"]);
        let tokens = tokenize_query("certificate renewal expired");
        assert_eq!(score_article(&item, &tokens), 0);
    }

    #[test]
    fn snippet_skips_headings_and_truncates() {
        let content = "# Heading\n\nFirst real line of the runbook.\nSecond line.";
        assert_eq!(
            snippet_from_content(content, 180),
            "First real line of the runbook."
        );

        let long = "x".repeat(200);
        let snippet = snippet_from_content(&long, 180);
        assert_eq!(snippet.chars().count(), 183);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn snippet_of_empty_content_is_empty() {
        assert_eq!(snippet_from_content("", 180), "");
        assert_eq!(snippet_from_content("## only headings\n# more", 180), "");
    }
}
