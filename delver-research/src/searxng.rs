//! SearxNG search provider
//!
//! Implements the [`SearchProvider`] capability against a self-hosted
//! SearxNG instance using its JSON output format. The engine itself never
//! sees this type; it is wired in at the application boundary.

use crate::provider::{SearchOptions, SearchProvider};
use async_trait::async_trait;
use delver_core::{DelverError, DelverResult, ErrorContext, RetrievedDocument};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// SearxNG JSON response envelope
#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// Search provider backed by a SearxNG instance
pub struct SearxngProvider {
    client: reqwest::Client,
    base_url: String,
}

impl SearxngProvider {
    /// Create a provider for the instance at `base_url`
    ///
    /// `timeout_ms` caps the underlying HTTP request; the dispatcher applies
    /// its own timeout on top, so this is a second line of defense against
    /// a stalled connection.
    pub fn new(base_url: &str, timeout_ms: u64) -> DelverResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| provider_error("Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SearchProvider for SearxngProvider {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> DelverResult<Vec<RetrievedDocument>> {
        let url = format!("{}/search", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| provider_error("Search request failed", e))?;

        if !response.status().is_success() {
            return Err(DelverError::Provider {
                message: format!("Search returned status {}", response.status()),
                provider: Some("searxng".to_string()),
                source: None,
                context: ErrorContext::new("searxng")
                    .with_operation("search")
                    .with_suggestion("Check that the SearxNG instance allows the json format"),
            });
        }

        let payload: SearxngResponse = response
            .json()
            .await
            .map_err(|e| provider_error("Failed to decode search response", e))?;

        let documents: Vec<RetrievedDocument> = payload
            .results
            .into_iter()
            .take(options.max_results)
            .map(|result| {
                let content = if result.content.is_empty() {
                    result.title
                } else if result.title.is_empty() {
                    result.content
                } else {
                    format!("{}\n\n{}", result.title, result.content)
                };
                RetrievedDocument {
                    url: result.url,
                    content,
                }
            })
            .collect();

        debug!(
            query = query,
            documents = documents.len(),
            "SearxNG search completed"
        );

        Ok(documents)
    }
}

fn provider_error(
    message: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> DelverError {
    DelverError::Provider {
        message: format!("{}: {}", message, source),
        provider: Some("searxng".to_string()),
        source: Some(Box::new(source)),
        context: ErrorContext::new("searxng")
            .with_operation("search")
            .with_suggestion("Check that the SearxNG instance is reachable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped_from_base_url() {
        let provider = SearxngProvider::new("http://localhost:8888/", 1000).unwrap();
        assert_eq!(provider.base_url, "http://localhost:8888");
    }

    #[test]
    fn response_with_missing_fields_deserializes() {
        let raw = r#"{"results": [{"url": "https://example.com"}]}"#;
        let payload: SearxngResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.results.len(), 1);
        assert!(payload.results[0].title.is_empty());
        assert!(payload.results[0].content.is_empty());
    }

    #[test]
    fn empty_response_deserializes() {
        let payload: SearxngResponse = serde_json::from_str("{}").unwrap();
        assert!(payload.results.is_empty());
    }
}
