//! HTTP surface: batch ingestion, the scheduled sync trigger, and health.

use crate::adapters::storage::SnapshotStore;
use crate::core::ingest::{parse_submission, IngestService};
use crate::core::orchestrator::SyncOrchestrator;
use crate::utils::error::{EtlError, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const CRON_SECRET_HEADER: &str = "x-cron-secret";
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
    pub ingest_api_key: String,
    pub cron_secret: String,
    /// Header set by the hosting platform's scheduler, accepted in place of the secret.
    pub scheduler_header: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    ingest: Arc<IngestService>,
    orchestrator: Arc<SyncOrchestrator>,
    snapshots: Option<Arc<SnapshotStore>>,
    settings: Arc<ServerSettings>,
    sync_running: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(
        ingest: Arc<IngestService>,
        orchestrator: Arc<SyncOrchestrator>,
        settings: ServerSettings,
    ) -> Self {
        Self {
            ingest,
            orchestrator,
            snapshots: None,
            settings: Arc::new(settings),
            sync_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Persist snapshots after every ingest batch and sync run.
    pub fn with_snapshots(mut self, snapshots: Arc<SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn sync_in_progress(&self) -> bool {
        self.sync_running.load(Ordering::SeqCst)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/ingest", get(ingest_docs).post(ingest))
        .route("/cron/sync", get(cron_sync).post(cron_sync))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("🌐 Listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

fn matches_secret(candidate: Option<&str>, secret: &str) -> bool {
    !secret.is_empty() && candidate == Some(secret)
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(json!({ "success": false, "error": error.into() }))).into_response()
}

fn unauthorized() -> Response {
    failure(StatusCode::UNAUTHORIZED, "unauthorized")
}

async fn ingest_docs() -> Json<serde_json::Value> {
    Json(json!({
        "service": "catalog ingest",
        "status": "ok",
        "usage": {
            "method": "POST",
            "auth": "Authorization: Bearer <key> or x-api-key: <key>",
            "body": [
                {"products": [{"title": "...", "price": "19.99", "url": "https://...", "category": "books"}]},
                {"product": {"title": "...", "price": "19.99", "url": "https://..."}}
            ]
        }
    }))
}

async fn ingest(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let key = &state.settings.ingest_api_key;
    if !matches_secret(bearer_token(&headers), key)
        && !matches_secret(header_value(&headers, API_KEY_HEADER), key)
    {
        return unauthorized();
    }

    let items = match parse_submission(&body) {
        Ok(items) => items,
        Err(EtlError::SerializationError(e)) => {
            return failure(StatusCode::BAD_REQUEST, format!("invalid JSON body: {}", e))
        }
        Err(EtlError::ValidationError { message }) => {
            return failure(StatusCode::BAD_REQUEST, message)
        }
        Err(e) => return failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };

    let stats = state.ingest.ingest(items).await;

    if let Some(snapshots) = &state.snapshots {
        if let Err(e) = snapshots.save().await {
            tracing::error!("❌ Snapshot after ingest failed: {}", e);
            return failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    }

    (
        StatusCode::OK,
        Json(json!({ "success": true, "stats": stats })),
    )
        .into_response()
}

/// Clears the running flag even if the sync task panics.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn cron_sync(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let secret = &state.settings.cron_secret;
    let scheduled = state
        .settings
        .scheduler_header
        .as_deref()
        .is_some_and(|name| headers.contains_key(name));
    let authorized = scheduled
        || matches_secret(header_value(&headers, CRON_SECRET_HEADER), secret)
        || matches_secret(bearer_token(&headers), secret);
    if !authorized {
        tracing::warn!("⚠️ Rejected unauthenticated sync trigger");
        return unauthorized();
    }

    if state
        .sync_running
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return failure(StatusCode::CONFLICT, "sync already running");
    }

    let guard = RunningGuard(Arc::clone(&state.sync_running));
    let orchestrator = Arc::clone(&state.orchestrator);
    let snapshots = state.snapshots.clone();
    tokio::spawn(async move {
        let _guard = guard;
        match orchestrator.run_all(&[]).await {
            Ok(reports) => tracing::info!("⏰ Scheduled sync done ({} partners)", reports.len()),
            Err(e) => tracing::error!("❌ Scheduled sync failed: {}", e.user_friendly_message()),
        }
        if let Some(snapshots) = snapshots {
            if let Err(e) = snapshots.save().await {
                tracing::error!("❌ Snapshot after sync failed: {}", e);
            }
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({ "success": true, "message": "sync started" })),
    )
        .into_response()
}
