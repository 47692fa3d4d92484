//! HTTP API for the knowledge base.
//!
//! The published contract the operations console consumes. Handlers are
//! thin adapters over [`KnowledgeStore`]; no business logic lives here.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/api/kb/articles` | List articles (filters + pagination) |
//! | `POST` | `/api/kb/articles` | Create an article |
//! | `GET`  | `/api/kb/articles/{id}` | Get a hydrated article |
//! | `PUT`  | `/api/kb/articles/{id}` | Update (appends a version) |
//! | `POST` | `/api/kb/articles/{id}/action` | Lifecycle action |
//! | `POST` | `/api/kb/articles/{id}/rollback` | Roll back to a version |
//! | `POST` | `/api/kb/search` | Two-tier search |
//! | `POST` | `/api/kb/ask` | Question answering with citations |
//! | `GET`  | `/api/kb/recommendations` | Recommended articles |
//! | `GET`  | `/api/kb/reviews/pending` | Pending review queue |
//! | `GET`  | `/api/kb/gates` | Quality-gate thresholds |
//! | `POST` | `/api/kb/import` | Import a docs tree |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "invalid_input", "message": "title is required" } }
//! ```
//!
//! `not_found` maps to 404, `invalid_input` to 400, `storage_error` to 500.
//! Success bodies are `{"ok": true, ...}` envelopes.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted; the console is served
//! from a different origin than the agent.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::config::Config;
use crate::error::KbError;
use crate::gates::QualityGates;
use crate::lifecycle::{ArticleStatus, Severity};
use crate::models::{CreateArticleInput, ListQuery, UpdateArticleInput};
use crate::store::KnowledgeStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<KnowledgeStore>,
    config: Arc<Config>,
}

/// Starts the HTTP server on the configured bind address. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config, store: KnowledgeStore) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        store: Arc::new(store),
        config: Arc::new(config.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/kb/articles", get(handle_list).post(handle_create))
        .route("/api/kb/articles/{id}", get(handle_get).put(handle_update))
        .route("/api/kb/articles/{id}/action", post(handle_action))
        .route("/api/kb/articles/{id}/rollback", post(handle_rollback))
        .route("/api/kb/search", post(handle_search))
        .route("/api/kb/ask", post(handle_ask))
        .route("/api/kb/recommendations", get(handle_recommendations))
        .route("/api/kb/reviews/pending", get(handle_pending))
        .route("/api/kb/gates", get(handle_gates))
        .route("/api/kb/import", post(handle_import))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    println!("knowledge base listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<KbError> for AppError {
    fn from(err: KbError) -> Self {
        match err {
            KbError::NotFound => AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: err.to_string(),
            },
            KbError::InvalidInput(_) => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "invalid_input",
                message: err.to_string(),
            },
            KbError::Database(_) => {
                error!(error = %err, "storage failure");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "storage_error",
                    message: err.to_string(),
                }
            }
        }
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "invalid_input",
        message: message.into(),
    }
}

// ============ GET /health ============

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============ Articles ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ListParams {
    q: Option<String>,
    status: Option<String>,
    severity: Option<String>,
    tag: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
    include_archived: Option<bool>,
}

async fn handle_list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let status = parse_status_filter(params.status.as_deref())?;
    let severity = parse_severity_filter(params.severity.as_deref())?;
    let page = params.page.unwrap_or(1);
    let page_size = params.page_size.unwrap_or(0);

    let (items, total) = state
        .store
        .list_articles(&ListQuery {
            query: params.q.unwrap_or_default(),
            status,
            severity,
            tag: params.tag.unwrap_or_default(),
            page,
            page_size,
            include_archived: params.include_archived.unwrap_or(false),
        })
        .await?;
    Ok(Json(json!({
        "ok": true,
        "items": items,
        "total": total,
        "page": page,
    })))
}

async fn handle_create(
    State(state): State<AppState>,
    Json(input): Json<CreateArticleInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    let article = state.store.create_article(input).await?;
    Ok(Json(json!({ "ok": true, "article": article })))
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let article = state.store.get_article(&id).await?;
    Ok(Json(json!({ "ok": true, "article": article })))
}

async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<UpdateArticleInput>,
) -> Result<Json<serde_json::Value>, AppError> {
    let article = state.store.update_article(&id, input).await?;
    Ok(Json(json!({ "ok": true, "article": article })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ActionRequest {
    action: String,
    operator: String,
    comment: String,
}

async fn handle_action(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ActionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let article = state
        .store
        .apply_action(&id, &req.action, &req.operator, &req.comment)
        .await?;
    Ok(Json(json!({ "ok": true, "article": article })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RollbackRequest {
    target_version: i64,
    operator: String,
    comment: String,
}

async fn handle_rollback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RollbackRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let article = state
        .store
        .rollback_article(&id, req.target_version, &req.operator, &req.comment)
        .await?;
    Ok(Json(json!({ "ok": true, "article": article })))
}

// ============ Retrieval ============

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SearchRequest {
    query: String,
    limit: i64,
    include_archived: bool,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let items = state
        .store
        .search(&req.query, req.limit, req.include_archived)
        .await?;
    Ok(Json(json!({ "ok": true, "items": items })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AskRequest {
    question: String,
    limit: i64,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let result = state.store.ask(&req.question, req.limit).await?;
    Ok(Json(json!({
        "ok": true,
        "answer": result.answer,
        "citations": result.citations,
        "confidence": result.confidence,
    })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RecommendParams {
    query: Option<String>,
    limit: Option<i64>,
}

async fn handle_recommendations(
    State(state): State<AppState>,
    Query(params): Query<RecommendParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let items = state
        .store
        .recommendations(
            params.query.as_deref().unwrap_or_default(),
            params.limit.unwrap_or(0),
        )
        .await?;
    Ok(Json(json!({ "ok": true, "items": items })))
}

// ============ Reviews, gates, import ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PendingParams {
    limit: Option<i64>,
}

async fn handle_pending(
    State(state): State<AppState>,
    Query(params): Query<PendingParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let items = state.store.pending_reviews(params.limit.unwrap_or(0)).await?;
    Ok(Json(json!({ "ok": true, "items": items })))
}

async fn handle_gates() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "gates": QualityGates::default() }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ImportRequest {
    path: String,
    operator: String,
}

async fn handle_import(
    State(state): State<AppState>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let root = if req.path.trim().is_empty() {
        state.config.import.root.clone()
    } else {
        PathBuf::from(req.path.trim())
    };
    let report = state.store.import_docs(&root, &req.operator).await?;
    Ok(Json(json!({ "ok": true, "result": report })))
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<ArticleStatus>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => ArticleStatus::parse(value)
            .map(Some)
            .ok_or_else(|| bad_request(format!("unknown status filter: {}", value))),
    }
}

fn parse_severity_filter(raw: Option<&str>) -> Result<Option<Severity>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => match value.to_lowercase().as_str() {
            "low" => Ok(Some(Severity::Low)),
            "medium" => Ok(Some(Severity::Medium)),
            "high" => Ok(Some(Severity::High)),
            other => Err(bad_request(format!("unknown severity filter: {}", other))),
        },
    }
}
