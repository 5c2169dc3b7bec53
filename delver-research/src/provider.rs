//! Capability interfaces consumed by the research engine
//!
//! The engine never talks to a concrete search or generation service
//! directly; both capabilities are injected at construction time behind
//! these traits, so there is no process-wide provider state and tests can
//! substitute deterministic fakes.

use async_trait::async_trait;
use delver_core::{DelverError, DelverResult, ErrorContext, RetrievedDocument};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Options applied to each individual search call
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Upper-bound timeout per query in milliseconds
    pub timeout_ms: u64,
    /// Maximum documents returned per query
    pub max_results: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 15_000,
            max_results: 5,
        }
    }
}

/// External search capability
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one search query and return the retrieved documents
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> DelverResult<Vec<RetrievedDocument>>;
}

/// External text-generation capability
///
/// Implementations return the model's raw text output; call sites parse it
/// into their statically-typed result contract with [`parse_structured`].
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Generate a response for the given system prompt and user prompt
    async fn generate(&self, system: &str, prompt: &str) -> DelverResult<String>;
}

/// Typed result contract for query planning
#[derive(Debug, Clone, Deserialize)]
pub struct QueryPlanPayload {
    pub queries: Vec<PlannedQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannedQuery {
    pub query: String,
    #[serde(default)]
    pub research_goal: String,
}

/// Typed result contract for learning extraction
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LearningsPayload {
    #[serde(default)]
    pub learnings: Vec<String>,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

/// Parse a generated response into its typed contract
///
/// Tolerates prose around the JSON object by slicing from the first `{` to
/// the last `}`. A response that does not conform to the expected schema is
/// a typed generation error, never silently reshaped.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> DelverResult<T> {
    let json_str = match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end >= start => &raw[start..=end],
        _ => raw.trim(),
    };

    serde_json::from_str(json_str).map_err(|e| DelverError::Generation {
        message: format!("Response does not conform to the expected schema: {}", e),
        provider: None,
        model: None,
        context: ErrorContext::new("provider")
            .with_operation("parse_structured")
            .with_suggestion("Check that the prompt states the required JSON shape"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_json_object() {
        let payload: LearningsPayload =
            parse_structured(r#"{"learnings": ["a"], "follow_up_questions": []}"#).unwrap();
        assert_eq!(payload.learnings, vec!["a"]);
        assert!(payload.follow_up_questions.is_empty());
    }

    #[test]
    fn tolerates_prose_around_the_object() {
        let raw = "Here is the plan you asked for:\n\n\
                   {\"queries\": [{\"query\": \"rust async\", \"research_goal\": \"overview\"}]}\n\
                   Let me know if you need more.";
        let payload: QueryPlanPayload = parse_structured(raw).unwrap();
        assert_eq!(payload.queries.len(), 1);
        assert_eq!(payload.queries[0].query, "rust async");
    }

    #[test]
    fn missing_optional_fields_default() {
        let payload: QueryPlanPayload =
            parse_structured(r#"{"queries": [{"query": "q"}]}"#).unwrap();
        assert_eq!(payload.queries[0].research_goal, "");
    }

    #[test]
    fn nonconforming_output_is_a_generation_error() {
        let result = parse_structured::<QueryPlanPayload>("I could not produce a plan.");
        assert!(matches!(result, Err(DelverError::Generation { .. })));
    }
}
