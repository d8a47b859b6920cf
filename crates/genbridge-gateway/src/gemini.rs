//! `generateContent` REST implementation of [`AiGateway`].

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::{AiGateway, Coordinates, LocationContext, MapLink, TaskAnalysis};
use async_trait::async_trait;
use genbridge_tasks::task_digest;
use genbridge_types::{Task, TaskCategory};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Longest error body kept in [`GatewayError::Http`].
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Maximum tokens requested for the impact summary.
const SUMMARY_MAX_OUTPUT_TOKENS: u32 = 100;

#[derive(Debug, Clone)]
pub struct GeminiGateway {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl GeminiGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn generate(&self, model: &str, body: Value) -> Result<GenerateResponse, GatewayError> {
        if !self.config.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let response = self
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY_CHARS)
                .collect();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("undecodable body: {}", e)))
    }
}

#[async_trait]
impl AiGateway for GeminiGateway {
    async fn classify_task(&self, text: &str) -> Result<TaskAnalysis, GatewayError> {
        let prompt = format!(
            "Analyze the following help request from an elderly resident and suggest a category, \
             title, and a refined professional description for a youth volunteer platform.\n\n\
             Request: \"{}\"",
            text
        );
        let categories = TaskCategory::ALL.map(TaskCategory::label).join(", ");
        let body = json!({
            "contents": [user_content(&prompt)],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": {
                        "title": { "type": "STRING" },
                        "category": {
                            "type": "STRING",
                            "description": format!("Must be one of: {}", categories),
                        },
                        "refinedDescription": { "type": "STRING" },
                        "suggestedCredits": { "type": "NUMBER" },
                    },
                    "required": ["title", "category", "refinedDescription", "suggestedCredits"],
                },
            },
        });

        let response = self.generate(&self.config.classify_model, body).await?;
        let analysis = parse_analysis(&response.text())?;
        tracing::debug!(
            title = %analysis.title,
            category = %analysis.category,
            credits = analysis.suggested_credits,
            "classified help request"
        );
        Ok(analysis)
    }

    async fn location_context(
        &self,
        query: &str,
        near: Option<Coordinates>,
    ) -> Result<LocationContext, GatewayError> {
        let prompt = format!(
            "Provide a very brief description of \"{}\" and its accessibility for a local \
             community service. Include specific details if it's a park, community center, or \
             commercial hub.",
            query
        );
        let mut body = json!({
            "contents": [user_content(&prompt)],
            "tools": [{ "googleMaps": {} }, { "googleSearch": {} }],
        });
        if let Some(coords) = near {
            body["toolConfig"] = json!({
                "retrievalConfig": {
                    "latLng": {
                        "latitude": coords.latitude,
                        "longitude": coords.longitude,
                    }
                }
            });
        }

        let response = self.generate(&self.config.location_model, body).await?;
        Ok(LocationContext {
            text: response.text(),
            links: response.map_links(),
        })
    }

    async fn impact_summary(&self, tasks: &[Task]) -> Result<String, GatewayError> {
        let prompt = format!(
            "Based on these community tasks: {}, write a short, inspiring 2-sentence paragraph \
             for a city newsletter about the social impact of these intergenerational connections.",
            task_digest(tasks)
        );
        let body = json!({
            "contents": [user_content(&prompt)],
            "generationConfig": { "maxOutputTokens": SUMMARY_MAX_OUTPUT_TOKENS },
        });

        let response = self.generate(&self.config.summary_model, body).await?;
        Ok(response.text().trim().to_string())
    }
}

fn user_content(text: &str) -> Value {
    json!({ "role": "user", "parts": [{ "text": text }] })
}

/// Subset of the `generateContent` response body that the gateway reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct GroundingChunk {
    #[serde(default)]
    maps: Option<GroundingSource>,
}

#[derive(Debug, Default, Deserialize)]
struct GroundingSource {
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// Map links from the first candidate's grounding chunks.
    fn map_links(&self) -> Vec<MapLink> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.maps.as_ref())
                    .filter_map(|maps| {
                        let uri = maps.uri.clone().filter(|u| !u.is_empty())?;
                        Some(MapLink {
                            title: maps.title.clone().unwrap_or_else(|| uri.clone()),
                            uri,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    title: String,
    category: String,
    refined_description: String,
    suggested_credits: f64,
}

fn parse_analysis(text: &str) -> Result<TaskAnalysis, GatewayError> {
    let raw: RawAnalysis = serde_json::from_str(text.trim())
        .map_err(|e| GatewayError::InvalidResponse(format!("classification: {}", e)))?;

    let category = raw
        .category
        .parse::<TaskCategory>()
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

    let suggested_credits = if raw.suggested_credits.is_finite() && raw.suggested_credits > 0.0 {
        raw.suggested_credits.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    };

    Ok(TaskAnalysis {
        title: raw.title,
        category,
        refined_description: raw.refined_description,
        suggested_credits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_analysis() {
        let analysis = parse_analysis(
            r#"{"title":"Fix Leaking Sink","category":"Light Admin",
                "refinedDescription":"Help arrange a plumber.","suggestedCredits":35.4}"#,
        )
        .unwrap();
        assert_eq!(analysis.category, TaskCategory::Admin);
        assert_eq!(analysis.suggested_credits, 35);
    }

    #[test]
    fn rejects_unknown_category() {
        let err = parse_analysis(
            r#"{"title":"Fix Sink","category":"Plumbing",
                "refinedDescription":"x","suggestedCredits":10}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse(msg) if msg.contains("Plumbing")));
    }

    #[test]
    fn rejects_missing_fields_and_garbage() {
        assert!(parse_analysis(r#"{"title":"Fix Sink"}"#).is_err());
        assert!(parse_analysis("").is_err());
        assert!(parse_analysis("not json").is_err());
    }

    #[test]
    fn negative_credits_clamp_to_zero() {
        let analysis = parse_analysis(
            r#"{"title":"t","category":"Garden Help","refinedDescription":"d","suggestedCredits":-5}"#,
        )
        .unwrap();
        assert_eq!(analysis.suggested_credits, 0);
    }

    #[test]
    fn map_links_skip_chunks_without_maps_uri() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "A quiet " }, { "text": "park." }] },
                "groundingMetadata": { "groundingChunks": [
                    { "web": { "uri": "https://example.org", "title": "web" } },
                    { "maps": { "uri": "https://maps.example/oak", "title": "Oak Park" } },
                    { "maps": { "title": "no uri" } },
                ]}
            }]
        }))
        .unwrap();

        assert_eq!(response.text(), "A quiet park.");
        assert_eq!(
            response.map_links(),
            vec![MapLink {
                uri: "https://maps.example/oak".to_string(),
                title: "Oak Park".to_string(),
            }]
        );
    }

    #[test]
    fn empty_response_has_no_text() {
        let response = GenerateResponse::default();
        assert_eq!(response.text(), "");
        assert!(response.map_links().is_empty());
    }
}
