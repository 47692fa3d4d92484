use anyhow::Result;
use sqlx::SqlitePool;

/// Idempotent schema migration. Structure only, no business writes.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Article heads: one row per knowledge entry, pointing at the current
    // version. Archival is a status, never a row deletion.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kb_articles (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            summary TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            severity TEXT NOT NULL DEFAULT 'medium',
            status TEXT NOT NULL DEFAULT 'draft',
            current_version INTEGER NOT NULL DEFAULT 1,
            created_by TEXT NOT NULL DEFAULT 'system',
            updated_by TEXT NOT NULL DEFAULT 'system',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only version snapshots; (article_id, version) is never reused.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kb_article_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            article_id TEXT NOT NULL,
            version INTEGER NOT NULL,
            content_markdown TEXT NOT NULL,
            change_note TEXT NOT NULL DEFAULT '',
            source_type TEXT NOT NULL DEFAULT 'manual',
            source_ref TEXT NOT NULL DEFAULT '',
            created_by TEXT NOT NULL DEFAULT 'system',
            created_at TEXT NOT NULL,
            UNIQUE(article_id, version)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kb_tags (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            type TEXT NOT NULL DEFAULT 'custom'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kb_article_tags (
            article_id TEXT NOT NULL,
            tag_id TEXT NOT NULL,
            UNIQUE(article_id, tag_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Audit trail: one record per lifecycle-affecting call.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kb_reviews (
            id TEXT PRIMARY KEY,
            article_id TEXT NOT NULL,
            target_version INTEGER NOT NULL,
            action TEXT NOT NULL,
            comment TEXT NOT NULL DEFAULT '',
            operator TEXT NOT NULL DEFAULT 'system',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // External origins of imported content; (ref_type, ref_path) keys the
    // import pipeline's create-or-update decision.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kb_references (
            id TEXT PRIMARY KEY,
            article_id TEXT NOT NULL,
            ref_type TEXT NOT NULL,
            ref_path TEXT NOT NULL,
            ref_title TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_kb_articles_status_updated ON kb_articles(status, updated_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_kb_versions_article_version ON kb_article_versions(article_id, version)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_kb_reviews_article_created ON kb_reviews(article_id, created_at)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_kb_references_type_path ON kb_references(ref_type, ref_path)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
