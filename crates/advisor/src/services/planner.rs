//! Itinerary planner service client.
//!
//! The planner is a text-generation service with two endpoints, always called
//! in sequence: itinerary generation, then points-of-interest extraction. The
//! second call forwards an opaque prompt returned by the first, and its
//! response carries the points as a JSON-encoded array inside a JSON string
//! field, so the body is decoded twice.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use thiserror::Error;

use crate::config::PlannerConfig;

/// Errors that can occur when talking to the planner service.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse a response body.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// A generated itinerary plus the prompt to forward for extraction.
#[derive(Debug, Clone, Deserialize)]
pub struct ItineraryDraft {
    /// Free markdown, day-delimited by the literal token "Day".
    pub itinerary: String,
    /// Opaque prompt to forward to the points-of-interest endpoint.
    #[serde(rename = "pointsOfInterestPrompt")]
    pub points_of_interest_prompt: String,
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    #[serde(rename = "pointsOfInterest")]
    points_of_interest: String,
}

/// Client for the itinerary planner service.
#[derive(Clone)]
pub struct PlannerClient {
    inner: Arc<PlannerClientInner>,
}

struct PlannerClientInner {
    client: reqwest::Client,
    api_url: String,
}

impl PlannerClient {
    /// Create a new planner service client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &PlannerConfig) -> Result<Self, PlannerError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.api_key.expose_secret());
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PlannerError::Parse(format!("Invalid API key format: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(PlannerClientInner {
                client,
                api_url: config.api_url.trim_end_matches('/').to_string(),
            }),
        })
    }

    /// Generate an itinerary for a city and day count.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be parsed.
    pub async fn generate(&self, days: &str, city: &str) -> Result<ItineraryDraft, PlannerError> {
        let url = format!("{}/itinerary", self.inner.api_url);
        let body = serde_json::json!({ "days": days, "city": city });

        let response = self.inner.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PlannerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PlannerError::Parse(e.to_string()))
    }

    /// Extract points of interest using the prompt from a generated draft.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or either decoding layer fails.
    pub async fn points_of_interest(&self, prompt: &str) -> Result<Vec<String>, PlannerError> {
        let url = format!("{}/points-of-interest", self.inner.api_url);
        let body = serde_json::json!({ "pointsOfInterestPrompt": prompt });

        let response = self.inner.client.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PlannerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let points: PointsResponse = response
            .json()
            .await
            .map_err(|e| PlannerError::Parse(e.to_string()))?;

        parse_points(&points.points_of_interest)
    }
}

/// Decode the inner JSON-encoded array of place names.
fn parse_points(encoded: &str) -> Result<Vec<String>, PlannerError> {
    serde_json::from_str(encoded)
        .map_err(|e| PlannerError::Parse(format!("points of interest not a JSON array: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_points_decodes_array() {
        let points = parse_points(r#"["Eiffel Tower", "Louvre"]"#).expect("parse");
        assert_eq!(points, vec!["Eiffel Tower", "Louvre"]);
    }

    #[test]
    fn test_parse_points_empty_array() {
        let points = parse_points("[]").expect("parse");
        assert!(points.is_empty());
    }

    #[test]
    fn test_parse_points_rejects_non_array() {
        let err = parse_points("not json").expect_err("should fail");
        assert!(matches!(err, PlannerError::Parse(_)));
    }

    #[test]
    fn test_draft_parses_camel_case_prompt() {
        let json = r#"{"itinerary": "Day 1: ...", "pointsOfInterestPrompt": "extract from ..."}"#;
        let draft: ItineraryDraft = serde_json::from_str(json).expect("parse");
        assert_eq!(draft.itinerary, "Day 1: ...");
        assert_eq!(draft.points_of_interest_prompt, "extract from ...");
    }
}
