//! HTTP view service.
//!
//! A timeline writer posts events and diagnostics while any number of
//! viewers fetch replayed views. The in-memory [`SharedSession`] is the
//! source of truth for reads; when a [`SessionStore`] is attached every
//! mutation is journaled to it under the store lock, so the database sees
//! mutations in the same order as the session. Events are journaled before
//! they are appended, so a failed write leaves the session unchanged.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use gp_core::{ColumnSet, Diagnostics, Event, GridError, SessionStats, SharedSession, StateView};
use gp_store::{SessionStore, StoreError};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, MutexGuard};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub struct AppState {
    session: SharedSession,
    store: Option<Mutex<SessionStore>>,
}

impl AppState {
    /// In-memory only; nothing is persisted.
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            store: None,
        }
    }

    pub fn with_store(session: SharedSession, store: SessionStore) -> Self {
        Self {
            session,
            store: Some(Mutex::new(store)),
        }
    }

    /// Serializes writers. Held across the journal write and the in-memory
    /// mutation it guards.
    async fn writer(&self) -> Option<MutexGuard<'_, SessionStore>> {
        match &self.store {
            Some(store) => Some(store.lock().await),
            None => None,
        }
    }
}

#[derive(Debug)]
pub enum ApiError {
    Grid(GridError),
    Store(StoreError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Grid(e) => write!(f, "{e}"),
            ApiError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl From<GridError> for ApiError {
    fn from(e: GridError) -> Self {
        ApiError::Grid(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Core(e) => ApiError::Grid(e),
            other => ApiError::Store(other),
        }
    }
}

fn grid_status(e: &GridError) -> StatusCode {
    match e {
        GridError::OrderingViolation { .. } => StatusCode::CONFLICT,
        GridError::IndexOutOfRange { .. } => StatusCode::NOT_FOUND,
        GridError::InvalidConfig(_) | GridError::Wire(_) => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Grid(e) => grid_status(e),
            ApiError::Store(e) => {
                tracing::error!("store failure: {e}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct FocusRequest {
    index: usize,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/view", get(get_view))
        .route("/api/view/{index}", get(get_view_at))
        .route("/api/events", post(post_event))
        .route("/api/focus", post(post_focus))
        .route("/api/follow", post(post_follow))
        .route("/api/reset", post(post_reset))
        .route("/api/diagnostics", put(put_diagnostics))
        .route("/api/columns", get(get_columns))
        .route("/api/stats", get(get_stats))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "view service listening");
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for ctrl-c: {e}");
            }
        })
        .await?;
    tracing::info!("view service stopped");
    Ok(())
}

async fn get_view(State(state): State<Arc<AppState>>) -> Json<StateView> {
    Json(state.session.view())
}

async fn get_view_at(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> ApiResult<Json<StateView>> {
    Ok(Json(state.session.view_at(index)?))
}

async fn post_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Event>,
) -> ApiResult<(StatusCode, Json<SessionStats>)> {
    let writer = state.writer().await;
    // Journal first: a failed write must leave the session untouched.
    state.session.with_mut(|s| -> ApiResult<()> {
        let event = s.prepare(event)?;
        if let Some(store) = writer.as_deref() {
            store.store().append_event(&event)?;
        }
        s.append(event)?;
        Ok(())
    })?;
    tracing::debug!("event accepted");
    Ok((StatusCode::CREATED, Json(state.session.with(|s| s.stats()))))
}

async fn post_focus(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FocusRequest>,
) -> ApiResult<Json<StateView>> {
    let writer = state.writer().await;
    state.session.set_focus(req.index)?;
    if let Some(store) = writer.as_deref() {
        store.store().save_focus(Some(req.index), true)?;
    }
    Ok(Json(state.session.view()))
}

async fn post_follow(State(state): State<Arc<AppState>>) -> ApiResult<Json<StateView>> {
    let writer = state.writer().await;
    state.session.follow_latest();
    if let Some(store) = writer.as_deref() {
        let focus = state.session.with(|s| s.log().focus());
        store.store().save_focus(focus, false)?;
    }
    Ok(Json(state.session.view()))
}

async fn post_reset(State(state): State<Arc<AppState>>) -> ApiResult<Json<StateView>> {
    let writer = state.writer().await;
    state.session.reset();
    if let Some(store) = writer.as_deref() {
        store.store().clear_events()?;
    }
    tracing::info!("timeline reset");
    Ok(Json(state.session.view()))
}

async fn put_diagnostics(
    State(state): State<Arc<AppState>>,
    Json(diagnostics): Json<Diagnostics>,
) -> ApiResult<Json<StateView>> {
    let writer = state.writer().await;
    state.session.set_diagnostics(diagnostics);
    if let Some(store) = writer.as_deref() {
        let normalized = state.session.with(|s| s.diagnostics().clone());
        store.store().save_diagnostics(&normalized)?;
    }
    Ok(Json(state.session.view()))
}

async fn get_columns(State(state): State<Arc<AppState>>) -> Json<ColumnSet> {
    Json(state.session.with(|s| s.columns().clone()))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Json<SessionStats> {
    Json(state.session.with(|s| s.stats()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use gp_core::{GridConfig, Session};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn test_state(with_store: bool) -> Arc<AppState> {
        let session = Session::new(GridConfig::default(), vec![42, 17, 89]).unwrap();
        let shared = SharedSession::new(session.clone());
        if with_store {
            let store = SessionStore::open_in_memory().unwrap();
            store.save(&session).unwrap();
            Arc::new(AppState::with_store(shared, store))
        } else {
            Arc::new(AppState::new(shared))
        }
    }

    async fn send(
        state: &Arc<AppState>,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn event(step: u64, x: u32, y: u32) -> Value {
        json!({ "step": step, "text": format!("e{step}"), "locations": [{ "x": x, "y": y }] })
    }

    #[tokio::test]
    async fn test_empty_view_is_seed_fallback() {
        let state = test_state(false);
        let (status, body) = send(&state, "GET", "/api/view", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["index"], Value::Null);
        assert_eq!(body["current_locations"], json!([{ "x": 15, "y": 14 }]));
        assert_eq!(body["visited"], json!([]));
    }

    #[tokio::test]
    async fn test_post_events_then_view() {
        let state = test_state(false);
        for (step, x) in [(1, 3), (2, 4), (5, 6)] {
            let (status, _) = send(&state, "POST", "/api/events", Some(event(step, x, 0))).await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (_, body) = send(&state, "GET", "/api/view", None).await;
        assert_eq!(body["index"], 2);
        assert_eq!(body["current_locations"], json!([{ "x": 6, "y": 0 }]));

        let (status, body) = send(&state, "GET", "/api/view/0", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["visited"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ordering_violation_is_conflict() {
        let state = test_state(true);
        send(&state, "POST", "/api/events", Some(event(1, 0, 0))).await;
        send(&state, "POST", "/api/events", Some(event(2, 0, 0))).await;
        let (status, body) = send(&state, "POST", "/api/events", Some(event(2, 0, 0))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["status"], 409);
        assert!(body["error"].as_str().unwrap().contains("ordering violation"));
        assert_eq!(state.session.with(|s| s.log().len()), 2);
    }

    #[tokio::test]
    async fn test_failed_journal_leaves_session_untouched() {
        let state = test_state(true);
        // past i64::MAX: valid for the log, unrepresentable in SQLite
        let huge = json!({ "step": 9_223_372_036_854_775_808u64 });
        let (status, body) = send(&state, "POST", "/api/events", Some(huge)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 500);
        assert_eq!(state.session.with(|s| s.log().len()), 0);
        {
            let writer = state.writer().await.unwrap();
            assert_eq!(writer.store().event_count().unwrap(), 0);
        }

        let (status, _) = send(&state, "POST", "/api/events", Some(event(5, 1, 1))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(state.session.with(|s| s.log().len()), 1);
        let writer = state.writer().await.unwrap();
        assert_eq!(writer.store().event_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_view_out_of_range_is_not_found() {
        let state = test_state(false);
        let (status, body) = send(&state, "GET", "/api/view/3", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn test_pinned_focus_survives_append() {
        let state = test_state(false);
        for step in 1..=3 {
            send(&state, "POST", "/api/events", Some(event(step, step as u32, 0))).await;
        }
        let (status, body) = send(&state, "POST", "/api/focus", Some(json!({ "index": 0 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["index"], 0);

        send(&state, "POST", "/api/events", Some(event(4, 9, 9))).await;
        let (_, body) = send(&state, "GET", "/api/view", None).await;
        assert_eq!(body["index"], 0);

        let (_, body) = send(&state, "POST", "/api/follow", None).await;
        assert_eq!(body["index"], 3);
    }

    #[tokio::test]
    async fn test_reset_clears_timeline() {
        let state = test_state(true);
        send(&state, "POST", "/api/events", Some(event(1, 1, 1))).await;
        let (status, body) = send(&state, "POST", "/api/reset", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["index"], Value::Null);

        let writer = state.writer().await.unwrap();
        assert_eq!(writer.store().event_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_diagnostics_best_candidate() {
        let state = test_state(false);
        let diagnostics = json!({
            "candidates": [
                { "location": { "x": 1, "y": 1 }, "score": 0.2 },
                { "location": { "x": 7, "y": 8 }, "score": 0.9 },
                { "location": { "x": 3, "y": 3 }, "score": 0.9 }
            ],
            "column_positions": []
        });
        let (status, body) = send(&state, "PUT", "/api/diagnostics", Some(diagnostics)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["best_candidate"]["location"], json!({ "x": 7, "y": 8 }));
    }

    #[tokio::test]
    async fn test_events_are_journaled() {
        let state = test_state(true);
        send(&state, "POST", "/api/events", Some(event(1, 70, 2))).await;
        send(&state, "POST", "/api/focus", Some(json!({ "index": 0 }))).await;

        let writer = state.writer().await.unwrap();
        let loaded = writer.load().unwrap().unwrap();
        assert_eq!(loaded.log().len(), 1);
        assert!(loaded.log().is_pinned());
        // stored location is already wrapped onto the 64 grid
        assert_eq!(loaded.log().events()[0].locations[0].x, 6);
    }

    #[tokio::test]
    async fn test_columns_and_stats() {
        let state = test_state(false);
        let (status, body) = send(&state, "GET", "/api/columns", None).await;
        assert_eq!(status, StatusCode::OK);
        let steps = &body["columns"][0]["path"]["steps"];
        assert_eq!(steps[1]["position"], json!({ "x": 14, "y": 15 }));
        assert_eq!(steps[2]["position"], json!({ "x": 14, "y": 16 }));

        let (_, stats) = send(&state, "GET", "/api/stats", None).await;
        assert_eq!(stats["tokens"], 3);
        assert_eq!(stats["events"], 0);
    }

    #[tokio::test]
    async fn test_malformed_event_rejected() {
        let state = test_state(false);
        let (status, _) = send(&state, "POST", "/api/events", Some(json!({ "text": "no step" }))).await;
        assert!(status.is_client_error());
        assert_eq!(state.session.with(|s| s.log().len()), 0);
    }
}
