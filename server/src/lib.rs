use anyhow::Result;
use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use search_core::cache::FsCache;
use search_core::config::{DataPaths, DEFAULT_SEARCH_LIMIT};
use search_core::jobs::{ReindexTrigger, SpoolQueue};
use search_core::store::DirStore;
use search_core::{Coherence, DocumentStore, IndexManager, NewDocument, RebuildMode, SearchResponse, StoreError, StoredDocument};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_limit() -> usize { DEFAULT_SEARCH_LIMIT }

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub documents: u64,
    pub terms: usize,
    pub generation: u64,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub coherence: Coherence,
    pub forced: bool,
    pub generation: u64,
    pub documents: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<IndexManager>,
    pub trigger: ReindexTrigger,
    pub admin_token: Option<String>,
}

/// Open the shared data directory, bring the index up to date and build the router.
///
/// The coherence check runs before the router exists, so no query is served
/// from a snapshot the check found stale.
pub fn build_app(data_dir: String) -> Result<Router> {
    let paths = DataPaths::new(&data_dir);
    let store = Arc::new(DirStore::open(paths.store_dir())?);
    let cache = Arc::new(FsCache::open(paths.cache_dir())?);
    let queue = Arc::new(SpoolQueue::open(paths.queue_dir())?);
    let manager = Arc::new(IndexManager::new(store, cache));

    match manager.refresh() {
        Ok(refresh) => tracing::info!(coherence = ?refresh.coherence, num_docs = refresh.snapshot.total_documents(), "index ready"),
        Err(e) => tracing::warn!(error = %e, "starting with an empty index"),
    }

    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState { manager, trigger: ReindexTrigger::new(queue), admin_token }))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status_handler))
        .route("/search", get(search_handler))
        .route("/documents", post(add_document))
        .route("/index/refresh", post(refresh_index))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let snapshot = state.manager.current();
    Json(StatusResponse {
        status: "API is up and running",
        message: "Operational",
        documents: snapshot.total_documents(),
        terms: snapshot.index().num_terms(),
        generation: snapshot.generation(),
    })
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    tracing::debug!(query = %params.query, limit = params.limit, "search request");
    Json(state.manager.search(&params.query, params.limit))
}

/// Store the article, then queue a rebuild without waiting for it. The new
/// article becomes searchable once a worker has rebuilt the index and this
/// process has refreshed.
pub async fn add_document(
    State(state): State<AppState>,
    Json(doc): Json<NewDocument>,
) -> Result<(StatusCode, Json<StoredDocument>), (StatusCode, String)> {
    let stored = match state.manager.store().insert(doc) {
        Ok(stored) => stored,
        Err(StoreError::DuplicateUrl(url)) => {
            return Err((StatusCode::CONFLICT, format!("Article with this URL already exists: {url}")));
        }
        Err(e) => {
            tracing::error!(error = %e, "could not store document");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "An error occurred while storing the article.".into()));
        }
    };
    tracing::info!(doc_id = stored.id, title = %stored.title, "document admitted");
    state.trigger.document_admitted(stored.id);
    Ok((StatusCode::CREATED, Json(stored)))
}

/// On-demand coherence check: picks up a rebuild published by a worker.
async fn refresh_index(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<RefreshResponse>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let manager = Arc::clone(&state.manager);
    let refresh = tokio::task::spawn_blocking(move || manager.refresh())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    Ok(Json(RefreshResponse {
        coherence: refresh.coherence,
        forced: refresh.mode == RebuildMode::Force,
        generation: refresh.snapshot.generation(),
        documents: refresh.snapshot.total_documents(),
    }))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
