//! Client for the hosted generative-language service.
//!
//! The gateway offers three single request/response operations used by the
//! task pipeline:
//!
//! - classify a free-text help request into a structured [`TaskAnalysis`],
//! - describe a place and list map links for it ([`LocationContext`]),
//! - summarize the community impact of a task snapshot.
//!
//! No retries or timeouts beyond the HTTP client's are applied here. Callers
//! decide what a failure means: the task pipeline abandons the pending task,
//! the dashboard substitutes [`FALLBACK_IMPACT_SUMMARY`].

mod config;
mod error;
mod gemini;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use gemini::GeminiGateway;

use async_trait::async_trait;
use genbridge_types::{Task, TaskCategory};
use serde::{Deserialize, Serialize};

/// Summary shown when the service cannot produce one.
pub const FALLBACK_IMPACT_SUMMARY: &str = "Youth and elders are working together to build a stronger, more connected community through every shared task.";

/// Structured reading of a help request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAnalysis {
    pub title: String,
    pub category: TaskCategory,
    pub refined_description: String,
    pub suggested_credits: u32,
}

/// Latitude/longitude hint for location lookups.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A map link attached to a location description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLink {
    pub uri: String,
    pub title: String,
}

/// Short description of a place plus any map links found for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationContext {
    pub text: String,
    pub links: Vec<MapLink>,
}

/// Operations the task pipeline needs from the hosted model.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Classifies a free-text request.
    ///
    /// A response naming a category outside the five known ones is an
    /// [`GatewayError::InvalidResponse`].
    async fn classify_task(&self, text: &str) -> Result<TaskAnalysis, GatewayError>;

    /// Describes `query`, optionally biased towards `near`.
    async fn location_context(
        &self,
        query: &str,
        near: Option<Coordinates>,
    ) -> Result<LocationContext, GatewayError>;

    /// Writes a short impact paragraph for the given tasks.
    async fn impact_summary(&self, tasks: &[Task]) -> Result<String, GatewayError>;
}

/// Returns the impact summary, or [`FALLBACK_IMPACT_SUMMARY`] if the gateway
/// fails or answers with nothing.
pub async fn summary_or_fallback(gateway: &dyn AiGateway, tasks: &[Task]) -> String {
    match gateway.impact_summary(tasks).await {
        Ok(summary) if !summary.trim().is_empty() => summary,
        Ok(_) => {
            tracing::warn!("impact summary was empty, using fallback");
            FALLBACK_IMPACT_SUMMARY.to_string()
        }
        Err(e) => {
            tracing::warn!(error = %e, "impact summary unavailable, using fallback");
            FALLBACK_IMPACT_SUMMARY.to_string()
        }
    }
}
