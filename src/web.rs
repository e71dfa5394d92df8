use crate::{
    config::RetrievalConfig,
    retrieval::{GenderFilter, Query, QueryError, RankedRow, RetrievalService},
};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    service: Arc<RetrievalService>,
    retrieval: RetrievalConfig,
}

pub fn router(service: Arc<RetrievalService>, retrieval: RetrievalConfig) -> Router {
    let shared_state = Arc::new(SharedState { service, retrieval });

    Router::new()
        .route("/api/search", post(search))
        .route("/api/health", get(health))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn start_app(
    service: RetrievalService,
    retrieval: RetrievalConfig,
    addr: &str,
) -> anyhow::Result<()> {
    async fn shutdown_signal() {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
        log::warn!("shutting down");
    }

    let app = router(Arc::new(service), retrieval);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Serve the retrieval service over HTTP until interrupted.
///
/// The service must be fully built before this is called; nothing is served
/// for a service that failed to start.
pub fn start_daemon(
    service: RetrievalService,
    retrieval: RetrievalConfig,
    addr: &str,
) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(service, retrieval, addr).await })
}

#[derive(Debug, thiserror::Error)]
enum HttpError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("query timed out after {0} seconds")]
    Timeout(u64),

    #[error("query task failed: {0}")]
    Task(String),
}

// Tell axum how to convert `HttpError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            HttpError::Query(QueryError::InvalidK) => axum::http::StatusCode::BAD_REQUEST,
            HttpError::Query(QueryError::Encoding(_)) => {
                log::error!("{self:?}");
                axum::http::StatusCode::SERVICE_UNAVAILABLE
            }
            HttpError::Timeout(_) => {
                log::warn!("{self}");
                axum::http::StatusCode::GATEWAY_TIMEOUT
            }
            HttpError::Query(QueryError::Index(_)) | HttpError::Task(_) => {
                log::error!("{self:?}");
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub text: String,

    /// Number of results, clamped to `1..=max_k`
    #[serde(default)]
    pub k: Option<usize>,

    #[serde(default)]
    pub gender: GenderFilter,
}

async fn search(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<Json<Vec<RankedRow>>, HttpError> {
    log::debug!("payload: {payload:?}");

    let query = Query::new(
        payload.text,
        state.retrieval.clamp_k(payload.k),
        payload.gender,
    );
    let timeout = state.retrieval.query_timeout_secs;

    // an abandoned query finishes on the blocking pool and only reads shared state
    let service = state.service.clone();
    let task = tokio::task::spawn_blocking(move || service.search(&query));

    match tokio::time::timeout(Duration::from_secs(timeout), task).await {
        Err(_) => Err(HttpError::Timeout(timeout)),
        Ok(Err(join_err)) => Err(HttpError::Task(join_err.to_string())),
        Ok(Ok(results)) => Ok(Json(results?)),
    }
}

async fn health(State(state): State<Arc<SharedState>>) -> impl IntoResponse {
    let service = &state.service;
    Json(json!({
        "status": "ok",
        "model": service.model_name(),
        "model_loaded": service.is_model_loaded(),
        "indexed": service.indexed_count(),
        "products": service.product_count(),
    }))
}
