//! # opskb CLI
//!
//! The `opskb` binary is the administrative interface to the knowledge
//! base. It provides commands for database initialization, docs import,
//! article inspection, lifecycle actions, retrieval, and starting the
//! console-facing HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! opskb --config ./config/opskb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `opskb init` | Create the SQLite database and run schema migrations |
//! | `opskb import [path]` | Import a markdown docs tree |
//! | `opskb list` | List articles with filters |
//! | `opskb get <id>` | Show a full article with history |
//! | `opskb search "<query>"` | Two-tier search |
//! | `opskb ask "<question>"` | Question answering with citations |
//! | `opskb pending` | Show the pending review queue |
//! | `opskb action <id> <action>` | Apply submit/approve/reject/archive |
//! | `opskb rollback <id> <version>` | Roll back to an earlier version |
//! | `opskb gates` | Print quality-gate thresholds |
//! | `opskb serve` | Start the HTTP server |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use opskb::config;
use opskb::gates::QualityGates;
use opskb::lifecycle::{ArticleStatus, Severity};
use opskb::models::{Article, ListQuery};
use opskb::server;
use opskb::store::KnowledgeStore;

/// Operational knowledge base with versioned articles, an editorial review
/// workflow, and two-tier retrieval.
#[derive(Parser)]
#[command(
    name = "opskb",
    about = "Operational knowledge base: versioned articles, review workflow, two-tier retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/opskb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables.
    /// Idempotent; running it multiple times is safe.
    Init,

    /// Import a markdown docs tree.
    ///
    /// Walks the tree, creates an article per markdown file, and keeps
    /// previously imported articles in sync on re-runs.
    Import {
        /// Root of the docs tree. Defaults to `[import].root` from config.
        path: Option<PathBuf>,

        /// Operator recorded in the audit trail.
        #[arg(long, default_value = "system")]
        operator: String,
    },

    /// List articles.
    List {
        /// Free-text filter over title, summary, content, and tags.
        #[arg(long, default_value = "")]
        query: String,

        /// Status filter: draft, reviewing, published, or archived.
        #[arg(long)]
        status: Option<String>,

        /// Severity filter: low, medium, or high.
        #[arg(long)]
        severity: Option<String>,

        /// Tag filter (exact, case-insensitive).
        #[arg(long, default_value = "")]
        tag: String,

        /// 1-indexed page.
        #[arg(long, default_value_t = 1)]
        page: i64,

        /// Page size (clamped to 100).
        #[arg(long, default_value_t = 20)]
        page_size: i64,

        /// Include archived articles.
        #[arg(long)]
        include_archived: bool,
    },

    /// Show a full article: metadata, content, versions, reviews.
    Get {
        /// Article id.
        id: String,
    },

    /// Search articles (structured query with token-scoring fallback).
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = 10)]
        limit: i64,

        /// Include archived articles.
        #[arg(long)]
        include_archived: bool,
    },

    /// Ask a question; the answer is composed from retrieved articles and
    /// always carries citations.
    Ask {
        /// The question.
        question: String,

        /// Maximum number of cited articles.
        #[arg(long, default_value_t = 3)]
        limit: i64,
    },

    /// Show the pending review queue.
    Pending {
        /// Maximum number of entries.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Apply a lifecycle action: submit, approve, reject, or archive.
    Action {
        /// Article id.
        id: String,

        /// Action name.
        action: String,

        /// Operator recorded in the audit trail.
        #[arg(long, default_value = "system")]
        operator: String,

        /// Review comment.
        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Roll back an article to an earlier version (appends a new version).
    Rollback {
        /// Article id.
        id: String,

        /// Target version number.
        version: i64,

        /// Operator recorded in the audit trail.
        #[arg(long, default_value = "system")]
        operator: String,

        /// Review comment.
        #[arg(long, default_value = "")]
        comment: String,
    },

    /// Print the quality-gate thresholds.
    Gates,

    /// Start the console-facing HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let store = KnowledgeStore::open(&config).await?;
            println!("initialized knowledge base at {}", store.db_path().display());
            store.close().await;
        }
        Commands::Import { path, operator } => {
            let store = KnowledgeStore::open(&config).await?;
            let root = path.unwrap_or_else(|| config.import.root.clone());
            let report = store.import_docs(&root, &operator).await?;
            println!("import {}", root.display());
            println!("  imported: {}", report.imported);
            println!("  updated:  {}", report.updated);
            println!("  skipped:  {}", report.skipped);
            for file in &report.files {
                println!("  - {}", file);
            }
            store.close().await;
        }
        Commands::List {
            query,
            status,
            severity,
            tag,
            page,
            page_size,
            include_archived,
        } => {
            let status = match status.as_deref() {
                None => None,
                Some(raw) => Some(
                    ArticleStatus::parse(raw)
                        .ok_or_else(|| anyhow::anyhow!("unknown status filter: {}", raw))?,
                ),
            };
            let severity = severity
                .as_deref()
                .map(Severity::parse_or_default);
            let store = KnowledgeStore::open(&config).await?;
            let (items, total) = store
                .list_articles(&ListQuery {
                    query,
                    status,
                    severity,
                    tag,
                    page,
                    page_size,
                    include_archived,
                })
                .await?;
            println!("{} articles (page {}):", total, page);
            for item in &items {
                print_article_line(item);
            }
            store.close().await;
        }
        Commands::Get { id } => {
            let store = KnowledgeStore::open(&config).await?;
            match store.get_article(&id).await {
                Ok(article) => print_article_full(&article),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            }
            store.close().await;
        }
        Commands::Search {
            query,
            limit,
            include_archived,
        } => {
            let store = KnowledgeStore::open(&config).await?;
            let items = store.search(&query, limit, include_archived).await?;
            if items.is_empty() {
                println!("No results.");
            }
            for (i, item) in items.iter().enumerate() {
                println!("{}. {} [{}] {}", i + 1, item.title, item.severity, item.id);
                if !item.summary.is_empty() {
                    println!("    {}", item.summary);
                }
            }
            store.close().await;
        }
        Commands::Ask { question, limit } => {
            let store = KnowledgeStore::open(&config).await?;
            let result = store.ask(&question, limit).await?;
            println!("{}", result.answer);
            println!("confidence: {:.2}", result.confidence);
            for citation in &result.citations {
                println!(
                    "  [{} v{}] {}",
                    citation.article_id, citation.version, citation.title
                );
            }
            store.close().await;
        }
        Commands::Pending { limit } => {
            let store = KnowledgeStore::open(&config).await?;
            let items = store.pending_reviews(limit).await?;
            if items.is_empty() {
                println!("Nothing pending review.");
            }
            for item in &items {
                print_article_line(item);
            }
            store.close().await;
        }
        Commands::Action {
            id,
            action,
            operator,
            comment,
        } => {
            let store = KnowledgeStore::open(&config).await?;
            let article = store.apply_action(&id, &action, &operator, &comment).await?;
            println!("{} -> {}", article.id, article.status);
            store.close().await;
        }
        Commands::Rollback {
            id,
            version,
            operator,
            comment,
        } => {
            let store = KnowledgeStore::open(&config).await?;
            let article = store
                .rollback_article(&id, version, &operator, &comment)
                .await?;
            println!(
                "{} rolled back to content of v{} (now v{})",
                article.id, version, article.current_version
            );
            store.close().await;
        }
        Commands::Gates => {
            let gates = QualityGates::default();
            println!("search hit ratio min:      {:.2}", gates.search_hit_ratio_min);
            println!("ask citation ratio min:    {:.2}", gates.ask_citation_ratio_min);
            println!(
                "review latency p95 max:    {} ms",
                gates.review_latency_p95_ms_max
            );
        }
        Commands::Serve => {
            let store = KnowledgeStore::open(&config).await?;
            server::run_server(&config, store).await?;
        }
    }

    Ok(())
}

fn print_article_line(item: &Article) {
    let review_flag = if item.needs_review { " needs-review" } else { "" };
    println!(
        "  {} [{}/{}{}] v{} {}",
        item.id, item.status, item.severity, review_flag, item.current_version, item.title
    );
}

fn print_article_full(article: &Article) {
    println!("--- Article ---");
    println!("id:        {}", article.id);
    println!("title:     {}", article.title);
    println!("status:    {}", article.status);
    println!("severity:  {}", article.severity);
    println!("category:  {}", article.category);
    println!("version:   {}", article.current_version);
    if !article.tags.is_empty() {
        println!("tags:      {}", article.tags.join(", "));
    }
    println!("created:   {} by {}", article.created_at, article.created_by);
    println!("updated:   {} by {}", article.updated_at, article.updated_by);
    if article.needs_review {
        println!("needs review: yes");
    }
    if !article.summary.is_empty() {
        println!();
        println!("{}", article.summary);
    }
    if !article.content.is_empty() {
        println!();
        println!("--- Content (v{}) ---", article.current_version);
        println!("{}", article.content);
    }
    if !article.references.is_empty() {
        println!();
        println!("--- References ---");
        for reference in &article.references {
            println!("  {}: {}", reference.ref_type, reference.ref_path);
        }
    }
    println!();
    println!("--- Versions ({}) ---", article.versions.len());
    for version in &article.versions {
        println!(
            "  v{} [{}] {} by {} @ {}",
            version.version, version.source_type, version.change_note, version.created_by, version.created_at
        );
    }
    println!();
    println!("--- Reviews ({}) ---", article.reviews.len());
    for review in &article.reviews {
        println!(
            "  {} by {} @ {}{}",
            review.action,
            review.operator,
            review.created_at,
            if review.comment.is_empty() {
                String::new()
            } else {
                format!(": {}", review.comment)
            }
        );
    }
}
