//! End-to-end tests for the knowledge base service against a scratch
//! SQLite database.

use tempfile::TempDir;

use opskb::config::Config;
use opskb::error::KbError;
use opskb::lifecycle::{ArticleStatus, Severity};
use opskb::models::{Article, CreateArticleInput, ListQuery, UpdateArticleInput};
use opskb::store::KnowledgeStore;

async fn open_store(tmp: &TempDir) -> KnowledgeStore {
    let mut config = Config::default();
    config.db.path = tmp.path().join("knowledge.db");
    KnowledgeStore::open(&config).await.expect("open store")
}

async fn create_simple(store: &KnowledgeStore, title: &str) -> Article {
    store
        .create_article(CreateArticleInput {
            title: title.to_string(),
            summary: format!("{} summary", title),
            category: "runbook".to_string(),
            content: "step1\nstep2".to_string(),
            created_by: "tester".to_string(),
            ..CreateArticleInput::default()
        })
        .await
        .expect("create article")
}

async fn publish(
    store: &KnowledgeStore,
    title: &str,
    summary: &str,
    content: &str,
    tags: &[&str],
) -> Article {
    let article = store
        .create_article(CreateArticleInput {
            title: title.to_string(),
            summary: summary.to_string(),
            category: "ops".to_string(),
            severity: "medium".to_string(),
            content: content.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_by: "tester".to_string(),
            ..CreateArticleInput::default()
        })
        .await
        .expect("create article");
    store
        .apply_action(&article.id, "submit", "tester", "submit")
        .await
        .expect("submit article");
    store
        .apply_action(&article.id, "approve", "reviewer", "approve")
        .await
        .expect("approve article")
}

#[tokio::test]
async fn create_requires_a_title() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let err = store
        .create_article(CreateArticleInput {
            title: "   ".to_string(),
            ..CreateArticleInput::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::InvalidInput(_)));
}

#[tokio::test]
async fn create_applies_defaults_and_writes_the_audit_trail() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let article = store
        .create_article(CreateArticleInput {
            title: "Connection pool exhaustion".to_string(),
            severity: "catastrophic".to_string(),
            created_by: "tester".to_string(),
            ..CreateArticleInput::default()
        })
        .await
        .unwrap();

    assert_eq!(article.status, ArticleStatus::Draft);
    assert_eq!(article.severity, Severity::Medium);
    assert_eq!(article.category, "general");
    assert_eq!(article.current_version, 1);
    assert_eq!(article.versions.len(), 1);
    assert_eq!(article.versions[0].change_note, "initial version");
    assert_eq!(article.reviews.len(), 1);
    assert_eq!(article.reviews[0].action, "create");
    assert!(article.id.starts_with("kb_"));
}

#[tokio::test]
async fn lifecycle_actions_respect_the_guard_table() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let article = create_simple(&store, "Connection pool troubleshooting").await;
    assert_eq!(article.status, ArticleStatus::Draft);

    let err = store
        .apply_action(&article.id, "approve", "reviewer", "approve without submit")
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::InvalidInput(_)));

    let submitted = store
        .apply_action(&article.id, "submit", "reviewer", "submit")
        .await
        .unwrap();
    assert_eq!(submitted.status, ArticleStatus::Reviewing);

    let rejected = store
        .apply_action(&article.id, "reject", "reviewer", "needs work")
        .await
        .unwrap();
    assert_eq!(rejected.status, ArticleStatus::Draft);

    let resubmitted = store
        .apply_action(&article.id, "submit", "reviewer", "submit again")
        .await
        .unwrap();
    assert_eq!(resubmitted.status, ArticleStatus::Reviewing);

    let approved = store
        .apply_action(&article.id, "approve", "reviewer", "looks good")
        .await
        .unwrap();
    assert_eq!(approved.status, ArticleStatus::Published);

    let err = store
        .apply_action(&article.id, "submit", "reviewer", "submit published")
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::InvalidInput(_)));

    let archived = store
        .apply_action(&article.id, "archive", "reviewer", "retired")
        .await
        .unwrap();
    assert_eq!(archived.status, ArticleStatus::Archived);

    // Archived is terminal for lifecycle actions.
    let err = store
        .apply_action(&article.id, "archive", "reviewer", "again")
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::InvalidInput(_)));

    // Every call above (including the create) left a review record.
    let trail = store.get_article(&article.id).await.unwrap().reviews;
    assert_eq!(trail.len(), 6);
}

#[tokio::test]
async fn unknown_actions_are_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let article = create_simple(&store, "Some runbook").await;

    let err = store
        .apply_action(&article.id, "publish", "reviewer", "")
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::InvalidInput(_)));
}

#[tokio::test]
async fn update_appends_a_version_and_keeps_blank_fields() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let created = create_simple(&store, "Upload retry policy").await;

    let updated = store
        .update_article(
            &created.id,
            UpdateArticleInput {
                content: "step1\nstep2\nstep3".to_string(),
                updated_by: "editor".to_string(),
                ..UpdateArticleInput::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.title, "Upload retry policy");
    assert_eq!(updated.summary, created.summary);
    assert_eq!(updated.current_version, 2);
    assert_eq!(updated.content, "step1\nstep2\nstep3");
    // current_version always equals the highest stored version number.
    let max_version = updated.versions.iter().map(|v| v.version).max().unwrap();
    assert_eq!(updated.current_version, max_version);
    assert_eq!(updated.versions.len(), 2);
    assert!(updated.reviews.iter().any(|r| r.action == "update"));
}

#[tokio::test]
async fn update_of_unknown_article_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let err = store
        .update_article("kb_missing", UpdateArticleInput::default())
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::NotFound));

    let err = store.get_article("kb_missing").await.unwrap_err();
    assert!(matches!(err, KbError::NotFound));
}

#[tokio::test]
async fn tags_are_replaced_wholesale_only_when_supplied() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let article = store
        .create_article(CreateArticleInput {
            title: "Queue tuning".to_string(),
            tags: vec!["Upload".to_string(), "queue".to_string(), "QUEUE".to_string()],
            ..CreateArticleInput::default()
        })
        .await
        .unwrap();
    assert_eq!(article.tags, vec!["queue", "upload"]);

    // Empty tag set leaves tags unchanged.
    let updated = store
        .update_article(
            &article.id,
            UpdateArticleInput {
                summary: "new summary".to_string(),
                ..UpdateArticleInput::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.tags, vec!["queue", "upload"]);

    // Non-empty tag set replaces the whole set.
    let replaced = store
        .update_article(
            &article.id,
            UpdateArticleInput {
                tags: vec!["runbook".to_string()],
                ..UpdateArticleInput::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(replaced.tags, vec!["runbook"]);
}

#[tokio::test]
async fn rollback_appends_and_never_rewrites_history() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let article = store
        .create_article(CreateArticleInput {
            title: "Disk pressure".to_string(),
            content: "original steps".to_string(),
            ..CreateArticleInput::default()
        })
        .await
        .unwrap();
    store
        .update_article(
            &article.id,
            UpdateArticleInput {
                content: "revised steps".to_string(),
                ..UpdateArticleInput::default()
            },
        )
        .await
        .unwrap();

    let rolled = store
        .rollback_article(&article.id, 1, "operator", "")
        .await
        .unwrap();

    assert_eq!(rolled.current_version, 3);
    assert_eq!(rolled.content, "original steps");
    // Version 1 is untouched and version 3 is a fresh snapshot of it.
    let v1 = rolled.versions.iter().find(|v| v.version == 1).unwrap();
    assert_eq!(v1.content, "original steps");
    let v3 = rolled.versions.iter().find(|v| v.version == 3).unwrap();
    assert_eq!(v3.source_type, "rollback");
    assert_eq!(v3.source_ref, "version:1");
    assert!(v3.change_note.contains("rollback to version 1"));

    let err = store
        .rollback_article(&article.id, 99, "operator", "")
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::InvalidInput(_)));
    let err = store
        .rollback_article(&article.id, 0, "operator", "")
        .await
        .unwrap_err();
    assert!(matches!(err, KbError::InvalidInput(_)));
}

#[tokio::test]
async fn list_filters_exclude_archived_by_default() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let keep = publish(&store, "Upload queue runbook", "queue", "body", &["upload"]).await;
    let gone = publish(&store, "Legacy watcher notes", "old", "body", &["legacy"]).await;
    store
        .apply_action(&gone.id, "archive", "ops", "superseded")
        .await
        .unwrap();

    let (items, total) = store.list_articles(&ListQuery::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, keep.id);

    let (items, total) = store
        .list_articles(&ListQuery {
            include_archived: true,
            ..ListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(items.len(), 2);

    let (items, _) = store
        .list_articles(&ListQuery {
            status: Some(ArticleStatus::Archived),
            ..ListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, gone.id);

    let (items, _) = store
        .list_articles(&ListQuery {
            tag: "upload".to_string(),
            ..ListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, keep.id);
}

#[tokio::test]
async fn list_pagination_is_one_indexed_and_ordered_by_recency() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    for i in 0..3 {
        create_simple(&store, &format!("Runbook {}", i)).await;
    }

    let (page1, total) = store
        .list_articles(&ListQuery {
            page: 1,
            page_size: 2,
            ..ListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 3);
    assert_eq!(page1.len(), 2);
    // Most recently updated first.
    assert_eq!(page1[0].title, "Runbook 2");

    let (page2, _) = store
        .list_articles(&ListQuery {
            page: 2,
            page_size: 2,
            ..ListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(page2.len(), 1);
    assert_eq!(page2[0].title, "Runbook 0");
}

#[tokio::test]
async fn pending_reviews_surface_draft_and_reviewing_work() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let draft = create_simple(&store, "Draft entry").await;
    let reviewing = create_simple(&store, "Entry under review").await;
    store
        .apply_action(&reviewing.id, "submit", "tester", "submit")
        .await
        .unwrap();
    let fresh = publish(&store, "Fresh published entry", "s", "body", &[]).await;

    let pending = store.pending_reviews(10).await.unwrap();
    let ids: Vec<&str> = pending.iter().map(|a| a.id.as_str()).collect();
    assert!(ids.contains(&draft.id.as_str()));
    assert!(ids.contains(&reviewing.id.as_str()));
    // A recently published article is not due for review yet.
    assert!(!ids.contains(&fresh.id.as_str()));
}

#[tokio::test]
async fn search_finds_published_articles_by_substring() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let published = publish(
        &store,
        "Upload Queue Saturation Runbook",
        "Handle upload queue full and retry behaviors",
        "When upload queue full occurs, tune upload workers and queue size first.",
        &["upload", "queue", "runbook"],
    )
    .await;
    // Drafts are not eligible for retrieval.
    create_simple(&store, "Upload draft notes").await;

    let items = store.search("upload queue", 5, false).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, published.id);
}

#[tokio::test]
async fn search_falls_back_to_token_scoring() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let target = publish(
        &store,
        "Upload Queue Saturation Runbook",
        "Handle upload queue full and retry behaviors",
        "When upload queue full occurs, tune upload workers and queue size first.",
        &["upload", "queue", "runbook"],
    )
    .await;
    publish(
        &store,
        "AI Degraded Troubleshooting",
        "Fallback behavior",
        "Check AI endpoint timeout and network errors.",
        &["ai"],
    )
    .await;

    // No article contains this sentence verbatim, so tier 2 must recall it.
    let items = store
        .search("upload queue full 的处理步骤", 3, false)
        .await
        .unwrap();
    assert!(!items.is_empty());
    assert_eq!(items[0].id, target.id);
}

#[tokio::test]
async fn search_with_empty_query_returns_nothing() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    publish(&store, "Anything", "s", "body", &[]).await;

    let items = store.search("   ", 5, false).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn ask_on_an_empty_knowledge_base_is_low_confidence_not_an_error() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let result = store.ask("how to drain the upload queue", 3).await.unwrap();
    assert!((result.confidence - 0.2).abs() < f64::EPSILON);
    assert!(result.citations.is_empty());
    assert!(!result.answer.is_empty());
}

#[tokio::test]
async fn ask_cites_retrieved_articles() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let article = publish(
        &store,
        "上传队列堆积排查",
        "上传队列满时的处理步骤",
        "当上传队列堆积时，先检查 queue_size 与 workers，再查看 retry 和失败原因。",
        &["上传", "队列"],
    )
    .await;

    let result = store.ask("上传队列积压如何排查", 3).await.unwrap();
    assert!(!result.citations.is_empty());
    assert_eq!(result.citations[0].article_id, article.id);
    assert!((result.confidence - 0.75).abs() < f64::EPSILON);
    assert!(result.answer.contains(&article.title));
}

#[tokio::test]
async fn ask_requires_a_question() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let err = store.ask("  ", 3).await.unwrap_err();
    assert!(matches!(err, KbError::InvalidInput(_)));
}

#[tokio::test]
async fn recommendations_only_cover_published_articles() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;
    let published = publish(&store, "Upload workers tuning", "s", "body", &["upload"]).await;
    create_simple(&store, "Upload draft").await;

    let items = store.recommendations("upload workers", 5).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, published.id);
}

#[tokio::test]
async fn import_is_idempotent_across_reruns() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let docs = tmp.path().join("docs");
    std::fs::create_dir_all(docs.join("upload")).unwrap();
    std::fs::write(
        docs.join("upload").join("queue.md"),
        "# Upload Queue Runbook\n\nDrain the queue before restarting workers.\n",
    )
    .unwrap();
    std::fs::write(
        docs.join("watcher.md"),
        "# Watcher Notes\n\nThe watcher reports lag via the console.\n",
    )
    .unwrap();
    std::fs::write(docs.join("empty.md"), "").unwrap();
    std::fs::write(docs.join("ignored.txt"), "not markdown").unwrap();

    let first = store.import_docs(&docs, "importer").await.unwrap();
    assert_eq!(first.imported, 2);
    assert_eq!(first.updated, 0);
    assert_eq!(first.skipped, 1);
    assert_eq!(first.files.len(), 2);
    let mut sorted = first.files.clone();
    sorted.sort();
    assert_eq!(first.files, sorted);

    let second = store.import_docs(&docs, "importer").await.unwrap();
    assert_eq!(second.imported, 0);
    assert_eq!(second.updated, 2);
    assert_eq!(second.skipped, 1);

    let (_, total) = store
        .list_articles(&ListQuery {
            include_archived: true,
            ..ListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
}

#[tokio::test]
async fn import_parses_titles_tags_and_references() {
    let tmp = TempDir::new().unwrap();
    let store = open_store(&tmp).await;

    let docs = tmp.path().join("docs");
    std::fs::create_dir_all(docs.join("Upload")).unwrap();
    std::fs::write(
        docs.join("Upload").join("queue.md"),
        "# Upload Queue Runbook\n\nDrain the queue before restarting workers.\n",
    )
    .unwrap();

    store.import_docs(&docs, "importer").await.unwrap();

    let (items, _) = store
        .list_articles(&ListQuery {
            include_archived: true,
            ..ListQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    let article = store.get_article(&items[0].id).await.unwrap();
    assert_eq!(article.title, "Upload Queue Runbook");
    assert_eq!(article.summary, "Drain the queue before restarting workers.");
    assert_eq!(article.category, "docs");
    assert!(article.tags.contains(&"docs".to_string()));
    assert!(article.tags.contains(&"upload".to_string()));
    assert_eq!(article.references.len(), 1);
    assert_eq!(article.references[0].ref_type, "import");
    assert_eq!(article.versions[0].source_type, "import");
    assert_eq!(article.versions[0].change_note, "initial docs import");

    // The second run records the sync note on the appended version.
    store.import_docs(&docs, "importer").await.unwrap();
    let article = store.get_article(&article.id).await.unwrap();
    assert_eq!(article.current_version, 2);
    assert_eq!(article.versions[0].change_note, "sync docs import");
}
