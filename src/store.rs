//! Article store and versioning engine.
//!
//! [`KnowledgeStore`] owns the SQLite pool and implements the write path:
//! article heads, append-only version snapshots, wholesale tag replacement,
//! reference upserts, and the review audit trail. Every write that touches
//! more than one table runs inside a single transaction; dropping an
//! uncommitted `sqlx` transaction rolls it back.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::error::{KbError, KbResult};
use crate::lifecycle::{self, ArticleStatus, LifecycleAction, Severity, SourceType};
use crate::migrate;
use crate::models::{
    Article, ArticleRef, ArticleVersion, CreateArticleInput, ListQuery, ReviewRecord,
    UpdateArticleInput,
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

const ARTICLE_CORE_SELECT: &str = r#"
    SELECT
        a.id,
        a.title,
        a.summary,
        a.category,
        a.severity,
        a.status,
        a.current_version,
        a.created_by,
        a.updated_by,
        a.created_at,
        a.updated_at,
        IFNULL(v.content_markdown, '') AS content,
        IFNULL(v.change_note, '') AS change_note
    FROM kb_articles a
    LEFT JOIN kb_article_versions v
        ON v.article_id = a.id AND v.version = a.current_version
"#;

pub struct KnowledgeStore {
    pub(crate) pool: SqlitePool,
    pub(crate) review_days: i64,
    db_path: std::path::PathBuf,
}

impl KnowledgeStore {
    /// Opens (creating if missing) the database and runs migrations, so a
    /// caller holding a store is always in a read-write-ready state.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            review_days: config.review.window_days,
            db_path: config.db.path.clone(),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Creates an article in draft with version 1. Article head, version
    /// snapshot, tag links, optional reference row, and the `create` review
    /// record commit atomically.
    pub async fn create_article(&self, input: CreateArticleInput) -> KbResult<Article> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(KbError::invalid("title is required"));
        }
        let created_by = normalize_operator(&input.created_by);
        let created_at = now_rfc3339();
        let id = new_id("kb");
        let severity = Severity::parse_or_default(&input.severity);
        let category = non_empty_or(input.category.trim(), "general");
        let summary = input.summary.trim().to_string();
        let content = input.content.trim().to_string();
        let change_note = non_empty_or(input.change_note.trim(), "initial version");
        let source_type = SourceType::parse_or_default(&input.source_type);
        let source_ref = input.source_ref.trim().to_string();
        let ref_title = non_empty_or(input.ref_title.trim(), &title);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO kb_articles (
                id, title, summary, category, severity, status, current_version,
                created_by, updated_by, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&title)
        .bind(&summary)
        .bind(&category)
        .bind(severity.as_str())
        .bind(ArticleStatus::Draft.as_str())
        .bind(1i64)
        .bind(&created_by)
        .bind(&created_by)
        .bind(&created_at)
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;

        insert_version(
            &mut tx,
            &id,
            1,
            &content,
            &change_note,
            source_type.as_str(),
            &source_ref,
            &created_by,
            &created_at,
        )
        .await?;

        replace_tags(&mut tx, &id, &input.tags).await?;
        if !source_ref.is_empty() {
            upsert_reference(&mut tx, &id, source_type.as_str(), &source_ref, &ref_title).await?;
        }
        insert_review(&mut tx, &id, 1, "create", &change_note, &created_by, &created_at).await?;

        tx.commit().await?;
        info!(article = %id, "created knowledge article");
        self.get_article(&id).await
    }

    /// Appends a new version instead of overwriting the old one. Blank
    /// input fields fall back to the current values; a non-empty tag set
    /// replaces tags wholesale, an empty one leaves them untouched.
    pub async fn update_article(&self, id: &str, input: UpdateArticleInput) -> KbResult<Article> {
        let article_id = id.trim().to_string();
        if article_id.is_empty() {
            return Err(KbError::invalid("article id is required"));
        }
        let updated_by = normalize_operator(&input.updated_by);
        let updated_at = now_rfc3339();

        let mut tx = self.pool.begin().await?;
        let current = fetch_article_core(&mut *tx, &article_id, self.review_days).await?;

        let title = non_empty_or(input.title.trim(), &current.title);
        let summary = non_empty_or(input.summary.trim(), &current.summary);
        let category = non_empty_or(input.category.trim(), &current.category);
        let category = non_empty_or(&category, "general");
        let severity = if input.severity.trim().is_empty() {
            current.severity
        } else {
            Severity::parse_or_default(&input.severity)
        };
        let content = non_empty_or(input.content.trim(), &current.content);
        let next_version = current.current_version + 1;
        let change_note = non_empty_or(input.change_note.trim(), "update content");
        let source_type = SourceType::parse_or_default(&input.source_type);
        let source_ref = input.source_ref.trim().to_string();
        let ref_title = non_empty_or(input.ref_title.trim(), &title);

        sqlx::query(
            r#"
            UPDATE kb_articles
            SET title = ?, summary = ?, category = ?, severity = ?, current_version = ?,
                updated_by = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&title)
        .bind(&summary)
        .bind(&category)
        .bind(severity.as_str())
        .bind(next_version)
        .bind(&updated_by)
        .bind(&updated_at)
        .bind(&article_id)
        .execute(&mut *tx)
        .await?;

        insert_version(
            &mut tx,
            &article_id,
            next_version,
            &content,
            &change_note,
            source_type.as_str(),
            &source_ref,
            &updated_by,
            &updated_at,
        )
        .await?;

        if !input.tags.is_empty() {
            replace_tags(&mut tx, &article_id, &input.tags).await?;
        }
        if !source_ref.is_empty() {
            upsert_reference(&mut tx, &article_id, source_type.as_str(), &source_ref, &ref_title)
                .await?;
        }
        insert_review(
            &mut tx,
            &article_id,
            next_version,
            "update",
            &change_note,
            &updated_by,
            &updated_at,
        )
        .await?;

        tx.commit().await?;
        info!(article = %article_id, version = next_version, "updated knowledge article");
        self.get_article(&article_id).await
    }

    /// Returns the article hydrated with tags, references, the version
    /// history, and the review trail.
    pub async fn get_article(&self, id: &str) -> KbResult<Article> {
        let article_id = id.trim();
        if article_id.is_empty() {
            return Err(KbError::invalid("article id is required"));
        }
        let mut article = fetch_article_core(&self.pool, article_id, self.review_days).await?;
        article.tags = self.article_tags(article_id).await?;
        article.references = self.article_refs(article_id).await?;
        article.versions = self.article_versions(article_id).await?;
        article.reviews = self.article_reviews(article_id).await?;
        Ok(article)
    }

    /// Filtered, paginated listing ordered by most recently updated.
    /// Archived articles are excluded by default unless an explicit status
    /// filter or `include_archived` asks for them.
    pub async fn list_articles(&self, query: &ListQuery) -> KbResult<(Vec<Article>, i64)> {
        let page = if query.page <= 0 { 1 } else { query.page };
        let page_size = clamp_page_size(query.page_size);
        let offset = (page - 1) * page_size;

        let (where_sql, args) = build_list_where(query);

        let count_sql = format!("SELECT COUNT(1) FROM kb_articles a{}", where_sql);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_query = count_query.bind(arg);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let list_sql = format!(
            "{}{} ORDER BY a.updated_at DESC LIMIT ? OFFSET ?",
            ARTICLE_CORE_SELECT, where_sql
        );
        let mut list_query = sqlx::query(&list_sql);
        for arg in &args {
            list_query = list_query.bind(arg);
        }
        let rows = list_query
            .bind(page_size)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut out: Vec<Article> = rows
            .iter()
            .map(|row| article_from_row(row, self.review_days))
            .collect();

        for article in &mut out {
            article.tags = self.article_tags(&article.id).await?;
        }
        Ok((out, total))
    }

    /// Draft and reviewing articles first, then published articles whose
    /// review window has lapsed, capped at `limit`.
    pub async fn pending_reviews(&self, limit: i64) -> KbResult<Vec<Article>> {
        let limit = clamp_page_size(limit);

        let mut out = Vec::new();
        for status in [ArticleStatus::Draft, ArticleStatus::Reviewing] {
            let (items, _) = self
                .list_articles(&ListQuery {
                    status: Some(status),
                    page: 1,
                    page_size: limit,
                    ..ListQuery::default()
                })
                .await?;
            out.extend(items);
        }
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        out.truncate(limit as usize);

        if (out.len() as i64) < limit {
            let (published, _) = self
                .list_articles(&ListQuery {
                    status: Some(ArticleStatus::Published),
                    page: 1,
                    page_size: limit * 2,
                    ..ListQuery::default()
                })
                .await?;
            for item in published {
                if !item.needs_review {
                    continue;
                }
                out.push(item);
                if out.len() as i64 >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Dispatches a reviewer action through the lifecycle guard table and
    /// appends a review record, submit included.
    pub async fn apply_action(
        &self,
        id: &str,
        action: &str,
        operator: &str,
        comment: &str,
    ) -> KbResult<Article> {
        let article_id = id.trim().to_string();
        if article_id.is_empty() {
            return Err(KbError::invalid("article id is required"));
        }
        let action = LifecycleAction::parse(action)
            .ok_or_else(|| KbError::invalid(format!("unsupported action {}", action.trim())))?;
        let operator = normalize_operator(operator);
        let comment = comment.trim().to_string();
        let updated_at = now_rfc3339();

        let mut tx = self.pool.begin().await?;
        let current = fetch_article_core(&mut *tx, &article_id, self.review_days).await?;

        let next_status = lifecycle::transition(current.status, action)?;
        if next_status != current.status {
            sqlx::query(
                r#"
                UPDATE kb_articles
                SET status = ?, updated_by = ?, updated_at = ?
                WHERE id = ?
                "#,
            )
            .bind(next_status.as_str())
            .bind(&operator)
            .bind(&updated_at)
            .bind(&article_id)
            .execute(&mut *tx)
            .await?;
        }
        insert_review(
            &mut tx,
            &article_id,
            current.current_version,
            action.as_str(),
            &comment,
            &operator,
            &updated_at,
        )
        .await?;

        tx.commit().await?;
        info!(
            article = %article_id,
            action = action.as_str(),
            status = next_status.as_str(),
            "applied lifecycle action"
        );
        self.get_article(&article_id).await
    }

    /// Rollback appends a new version whose content equals the target
    /// version's content. History is never rewritten.
    pub async fn rollback_article(
        &self,
        id: &str,
        target_version: i64,
        operator: &str,
        comment: &str,
    ) -> KbResult<Article> {
        let article_id = id.trim().to_string();
        if article_id.is_empty() {
            return Err(KbError::invalid("article id is required"));
        }
        if target_version <= 0 {
            return Err(KbError::invalid("targetVersion must be greater than zero"));
        }
        let operator = normalize_operator(operator);
        let updated_at = now_rfc3339();
        let comment = non_empty_or(
            comment.trim(),
            &format!("rollback to version {}", target_version),
        );

        let mut tx = self.pool.begin().await?;
        let current = fetch_article_core(&mut *tx, &article_id, self.review_days).await?;

        let rollback_content: Option<String> = sqlx::query_scalar(
            r#"
            SELECT content_markdown
            FROM kb_article_versions
            WHERE article_id = ? AND version = ?
            "#,
        )
        .bind(&article_id)
        .bind(target_version)
        .fetch_optional(&mut *tx)
        .await?;
        let rollback_content = rollback_content.ok_or_else(|| {
            KbError::invalid(format!("target version {} not found", target_version))
        })?;

        let next_version = current.current_version + 1;
        insert_version(
            &mut tx,
            &article_id,
            next_version,
            &rollback_content,
            &comment,
            SourceType::Rollback.as_str(),
            &format!("version:{}", target_version),
            &operator,
            &updated_at,
        )
        .await?;
        sqlx::query(
            r#"
            UPDATE kb_articles
            SET current_version = ?, updated_by = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(next_version)
        .bind(&operator)
        .bind(&updated_at)
        .bind(&article_id)
        .execute(&mut *tx)
        .await?;
        insert_review(
            &mut tx,
            &article_id,
            next_version,
            "rollback",
            &comment,
            &operator,
            &updated_at,
        )
        .await?;

        tx.commit().await?;
        info!(
            article = %article_id,
            target = target_version,
            version = next_version,
            "rolled back knowledge article"
        );
        self.get_article(&article_id).await
    }

    /// Looks up the article owning an external reference key. Backbone of
    /// the import pipeline's create-or-update decision.
    pub async fn find_article_by_reference(
        &self,
        ref_type: &str,
        ref_path: &str,
    ) -> KbResult<Option<String>> {
        let id: Option<String> = sqlx::query_scalar(
            r#"
            SELECT article_id
            FROM kb_references
            WHERE ref_type = ? AND ref_path = ?
            LIMIT 1
            "#,
        )
        .bind(ref_type.trim())
        .bind(ref_path.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn article_tags(&self, article_id: &str) -> KbResult<Vec<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT t.name
            FROM kb_tags t
            JOIN kb_article_tags at ON at.tag_id = t.id
            WHERE at.article_id = ?
            ORDER BY t.name ASC
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn article_refs(&self, article_id: &str) -> KbResult<Vec<ArticleRef>> {
        let rows = sqlx::query(
            r#"
            SELECT ref_type, ref_path, ref_title
            FROM kb_references
            WHERE article_id = ?
            ORDER BY ref_type ASC, ref_path ASC
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| ArticleRef {
                ref_type: row.get("ref_type"),
                ref_path: row.get("ref_path"),
                ref_title: row.get("ref_title"),
            })
            .collect())
    }

    async fn article_versions(&self, article_id: &str) -> KbResult<Vec<ArticleVersion>> {
        let rows = sqlx::query(
            r#"
            SELECT version, content_markdown, change_note, source_type, source_ref,
                   created_by, created_at
            FROM kb_article_versions
            WHERE article_id = ?
            ORDER BY version DESC
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| ArticleVersion {
                version: row.get("version"),
                content: row.get("content_markdown"),
                change_note: row.get("change_note"),
                source_type: row.get("source_type"),
                source_ref: row.get("source_ref"),
                created_by: row.get("created_by"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn article_reviews(&self, article_id: &str) -> KbResult<Vec<ReviewRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT action, comment, operator, created_at
            FROM kb_reviews
            WHERE article_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(article_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| ReviewRecord {
                action: row.get("action"),
                comment: row.get("comment"),
                operator: row.get("operator"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

// ============ Row mapping ============

async fn fetch_article_core<'e, E>(executor: E, id: &str, review_days: i64) -> KbResult<Article>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let sql = format!("{} WHERE a.id = ? LIMIT 1", ARTICLE_CORE_SELECT);
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?
        .ok_or(KbError::NotFound)?;
    Ok(article_from_row(&row, review_days))
}

fn article_from_row(row: &SqliteRow, review_days: i64) -> Article {
    let status = ArticleStatus::parse_lossy(&row.get::<String, _>("status"));
    let updated_at: String = row.get("updated_at");
    Article {
        id: row.get("id"),
        title: row.get("title"),
        summary: row.get("summary"),
        category: row.get("category"),
        severity: Severity::parse_or_default(&row.get::<String, _>("severity")),
        status,
        needs_review: lifecycle::needs_review(status, &updated_at, review_days),
        current_version: row.get("current_version"),
        content: row.get("content"),
        change_note: row.get("change_note"),
        tags: Vec::new(),
        references: Vec::new(),
        versions: Vec::new(),
        reviews: Vec::new(),
        created_by: row.get("created_by"),
        updated_by: row.get("updated_by"),
        created_at: row.get("created_at"),
        updated_at,
    }
}

// ============ Query building ============

fn clamp_page_size(requested: i64) -> i64 {
    if requested <= 0 {
        DEFAULT_PAGE_SIZE
    } else if requested > MAX_PAGE_SIZE {
        MAX_PAGE_SIZE
    } else {
        requested
    }
}

fn build_list_where(query: &ListQuery) -> (String, Vec<String>) {
    let mut parts: Vec<String> = Vec::new();
    let mut args: Vec<String> = Vec::new();

    let q = query.query.trim().to_lowercase();
    if !q.is_empty() {
        let pattern = format!("%{}%", q);
        parts.push(
            r#"(
                lower(a.title) LIKE ?
                OR lower(a.summary) LIKE ?
                OR EXISTS (
                    SELECT 1 FROM kb_article_versions v2
                    WHERE v2.article_id = a.id AND v2.version = a.current_version
                    AND lower(v2.content_markdown) LIKE ?
                )
                OR EXISTS (
                    SELECT 1
                    FROM kb_article_tags at
                    JOIN kb_tags t ON t.id = at.tag_id
                    WHERE at.article_id = a.id AND lower(t.name) LIKE ?
                )
            )"#
            .to_string(),
        );
        for _ in 0..4 {
            args.push(pattern.clone());
        }
    }

    match query.status {
        Some(status) => {
            parts.push("a.status = ?".to_string());
            args.push(status.as_str().to_string());
        }
        None if !query.include_archived => {
            parts.push("a.status != ?".to_string());
            args.push(ArticleStatus::Archived.as_str().to_string());
        }
        None => {}
    }

    if let Some(severity) = query.severity {
        parts.push("a.severity = ?".to_string());
        args.push(severity.as_str().to_string());
    }

    let tag = query.tag.trim().to_lowercase();
    if !tag.is_empty() {
        parts.push(
            r#"EXISTS (
                SELECT 1
                FROM kb_article_tags at
                JOIN kb_tags t ON t.id = at.tag_id
                WHERE at.article_id = a.id AND lower(t.name) = ?
            )"#
            .to_string(),
        );
        args.push(tag);
    }

    if parts.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", parts.join(" AND ")), args)
    }
}

// ============ Transaction helpers ============

#[allow(clippy::too_many_arguments)]
async fn insert_version(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    article_id: &str,
    version: i64,
    content: &str,
    change_note: &str,
    source_type: &str,
    source_ref: &str,
    created_by: &str,
    created_at: &str,
) -> KbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO kb_article_versions (
            article_id, version, content_markdown, change_note, source_type,
            source_ref, created_by, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(article_id)
    .bind(version)
    .bind(content)
    .bind(change_note)
    .bind(source_type)
    .bind(source_ref)
    .bind(created_by)
    .bind(created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Tags are replaced wholesale: delete-all-then-insert under the caller's
/// transaction.
async fn replace_tags(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    article_id: &str,
    tags: &[String],
) -> KbResult<()> {
    sqlx::query("DELETE FROM kb_article_tags WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut **tx)
        .await?;
    for tag in normalize_tags(tags) {
        let tag_id = get_or_create_tag(&mut **tx, &tag).await?;
        sqlx::query("INSERT OR IGNORE INTO kb_article_tags(article_id, tag_id) VALUES(?, ?)")
            .bind(article_id)
            .bind(&tag_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn get_or_create_tag(conn: &mut SqliteConnection, name: &str) -> KbResult<String> {
    let existing: Option<String> = sqlx::query_scalar("SELECT id FROM kb_tags WHERE name = ? LIMIT 1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }
    sqlx::query("INSERT OR IGNORE INTO kb_tags(id, name, type) VALUES(?, ?, ?)")
        .bind(new_id("tag"))
        .bind(name)
        .bind("custom")
        .execute(&mut *conn)
        .await?;
    // Re-read the canonical row in case a concurrent writer won the unique race.
    let id: String = sqlx::query_scalar("SELECT id FROM kb_tags WHERE name = ? LIMIT 1")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

async fn upsert_reference(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    article_id: &str,
    ref_type: &str,
    ref_path: &str,
    ref_title: &str,
) -> KbResult<()> {
    let ref_path = ref_path.trim();
    if ref_path.is_empty() {
        return Ok(());
    }
    let ref_title = non_empty_or(ref_title.trim(), ref_path);

    let existing: Option<String> = sqlx::query_scalar(
        "SELECT id FROM kb_references WHERE ref_type = ? AND ref_path = ? LIMIT 1",
    )
    .bind(ref_type)
    .bind(ref_path)
    .fetch_optional(&mut **tx)
    .await?;

    match existing {
        Some(ref_id) => {
            sqlx::query("UPDATE kb_references SET article_id = ?, ref_title = ? WHERE id = ?")
                .bind(article_id)
                .bind(&ref_title)
                .bind(&ref_id)
                .execute(&mut **tx)
                .await?;
        }
        None => {
            sqlx::query(
                "INSERT INTO kb_references(id, article_id, ref_type, ref_path, ref_title) VALUES(?, ?, ?, ?, ?)",
            )
            .bind(new_id("ref"))
            .bind(article_id)
            .bind(ref_type)
            .bind(ref_path)
            .bind(&ref_title)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

async fn insert_review(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    article_id: &str,
    target_version: i64,
    action: &str,
    comment: &str,
    operator: &str,
    created_at: &str,
) -> KbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO kb_reviews(id, article_id, target_version, action, comment, operator, created_at)
        VALUES(?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new_id("review"))
    .bind(article_id)
    .bind(target_version)
    .bind(action)
    .bind(comment)
    .bind(operator)
    .bind(created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// ============ Normalization helpers ============

/// Stateless id scheme: timestamp plus a random suffix. No shared counter
/// or coordination service involved.
pub(crate) fn new_id(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let random = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, nanos, &random[..8])
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now()
        .to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

pub(crate) fn normalize_operator(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        "system".to_string()
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let t = tag.trim().to_lowercase();
        if t.is_empty() || out.contains(&t) {
            continue;
        }
        out.push(t);
    }
    out.sort();
    out
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.trim().to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped_to_the_hard_maximum() {
        assert_eq!(clamp_page_size(0), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(-3), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(7), 7);
        assert_eq!(clamp_page_size(500), MAX_PAGE_SIZE);
    }

    #[test]
    fn list_where_excludes_archived_by_default() {
        let (sql, args) = build_list_where(&ListQuery::default());
        assert!(sql.contains("a.status != ?"));
        assert_eq!(args, vec!["archived".to_string()]);

        let (sql, args) = build_list_where(&ListQuery {
            include_archived: true,
            ..ListQuery::default()
        });
        assert!(sql.is_empty());
        assert!(args.is_empty());
    }

    #[test]
    fn list_where_binds_one_pattern_per_matched_field() {
        let (sql, args) = build_list_where(&ListQuery {
            query: "Queue".to_string(),
            status: Some(ArticleStatus::Published),
            tag: "Runbook".to_string(),
            ..ListQuery::default()
        });
        assert!(sql.contains("lower(a.title) LIKE ?"));
        assert_eq!(args.len(), 6);
        assert_eq!(args[0], "%queue%");
        assert_eq!(args[4], "published");
        assert_eq!(args[5], "runbook");
    }

    #[test]
    fn tags_normalize_lowercased_deduped_sorted() {
        let tags = vec![
            " Upload ".to_string(),
            "QUEUE".to_string(),
            "queue".to_string(),
            String::new(),
            "runbook".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["queue", "runbook", "upload"]);
    }

    #[test]
    fn ids_carry_prefix_and_random_suffix() {
        let a = new_id("kb");
        let b = new_id("kb");
        assert!(a.starts_with("kb_"));
        assert_ne!(a, b);
        assert_eq!(a.split('_').count(), 3);
    }
}
