//! GenBridge server library logic.

pub mod api;
pub mod api_dashboard;
pub mod api_sse;
pub mod api_tasks;
pub mod api_voice;
pub mod config;
pub mod controller;

use api_dashboard::SummaryCache;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use config::{Config, TasksConfig};
use genbridge_gateway::AiGateway;
use genbridge_tasks::{seed, TaskStore, UserDirectory};
use genbridge_types::Task;
use genbridge_voice::LiveConfig;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// Maximum request body size (2 MiB). Audio frames arrive over the
/// WebSocket, not as request bodies.
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Task store changes, streamed to clients over SSE.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    TaskCreated { task: Task },
    TaskUpdated { task: Task },
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: TaskStore,
    pub users: UserDirectory,
    /// Hosted model client used for classification, location and summaries.
    pub gateway: Arc<dyn AiGateway>,
    /// Template for each voice session.
    pub live: Arc<LiveConfig>,
    pub tasks: TasksConfig,
    /// Broadcast channel for task store changes (SSE stream).
    pub task_events: broadcast::Sender<TaskEvent>,
    pub summary_cache: Arc<SummaryCache>,
    /// Built web client to serve at `/`, if any.
    pub client_dir: Option<String>,
}

impl AppState {
    /// Builds state from configuration, seeding demo data when enabled.
    pub fn new(config: &Config, gateway: Arc<dyn AiGateway>) -> Self {
        let (store, users) = if config.tasks.seed_demo_data {
            let now = chrono::Utc::now().timestamp_millis();
            (
                TaskStore::with_tasks(seed::demo_tasks(now)),
                UserDirectory::new(seed::demo_users()),
            )
        } else {
            (TaskStore::new(), UserDirectory::new(Vec::new()))
        };
        Self {
            store,
            users,
            gateway,
            live: Arc::new(config.live_config()),
            tasks: config.tasks.clone(),
            task_events: broadcast::channel(256).0,
            summary_cache: Arc::new(SummaryCache::default()),
            client_dir: config.server.client_dir.clone(),
        }
    }

    /// Publishes a store change. Having no subscribers is not an error.
    pub fn publish(&self, event: TaskEvent) {
        if self.task_events.send(event).is_err() {
            tracing::trace!("no task event subscribers");
        }
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .route("/api/users", get(api::list_users_handler))
        .route("/api/users/{userId}", get(api::get_user_handler))
        .route(
            "/api/tasks",
            get(api_tasks::list_tasks_handler).post(api_tasks::create_task_handler),
        )
        .route(
            "/api/tasks/{taskId}/actions",
            post(api_tasks::task_action_handler),
        )
        .route(
            "/api/tasks/{taskId}/location",
            get(api_tasks::task_location_handler),
        )
        .route("/api/dashboard", get(api_dashboard::dashboard_handler))
        .route("/events/tasks", get(api_sse::get_task_stream_handler))
        .route("/ws/voice", get(api_voice::voice_ws_handler));

    let router = match state.client_dir.as_deref() {
        Some(dir) if std::path::Path::new(dir).join("index.html").exists() => {
            tracing::info!(path = %dir, "serving client static files");
            let index = format!("{}/index.html", dir);
            router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)))
        }
        Some(dir) => {
            tracing::info!(path = %dir, "client directory not found, skipping static file serving");
            router
        }
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
