//! Administrator dashboard.

use crate::AppState;
use axum::extract::{Extension, Json};
use genbridge_gateway::summary_or_fallback;
use genbridge_tasks::{category_counts, impact};
use genbridge_types::{CategoryCount, CommunityImpact};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The last generated impact summary and the store revision it describes.
///
/// The lock is held across the gateway call; concurrent loads wait for a
/// single refresh.
#[derive(Debug, Default)]
pub struct SummaryCache {
    entry: Mutex<Option<(u64, String)>>,
}

impl SummaryCache {
    /// Returns the summary for `revision`, calling `generate` only when the
    /// cached one is stale.
    pub async fn get_or_refresh<F, Fut>(&self, revision: u64, generate: F) -> String
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = String>,
    {
        let mut entry = self.entry.lock().await;
        if let Some((cached_revision, summary)) = entry.as_ref() {
            if *cached_revision == revision {
                return summary.clone();
            }
        }
        let summary = generate().await;
        *entry = Some((revision, summary.clone()));
        summary
    }
}

/// Response body for `GET /api/dashboard`.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub stats: CommunityImpact,
    pub categories: Vec<CategoryCount>,
    pub summary: String,
}

/// Handler for `GET /api/dashboard`.
pub async fn dashboard_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<DashboardResponse> {
    let (revision, tasks) = state.store.snapshot();
    let summary = state
        .summary_cache
        .get_or_refresh(revision, || async {
            tracing::debug!(revision, "refreshing impact summary");
            summary_or_fallback(state.gateway.as_ref(), &tasks).await
        })
        .await;

    Json(DashboardResponse {
        stats: impact(&tasks),
        categories: category_counts(&tasks),
        summary,
    })
}
