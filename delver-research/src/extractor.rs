//! Learning extraction
//!
//! Distills the documents retrieved for one query into atomic,
//! information-dense learnings plus follow-up questions for the next
//! recursion level. Each document is trimmed through the chunker so the
//! extraction prompt never exceeds the generation service's input budget.

use crate::prompts;
use crate::provider::{parse_structured, LearningsPayload, StructuredGenerator};
use delver_core::{
    ConcurrencyLimiter, DelverResult, RetrievedDocument, SearchQuery, TextChunker, TokenEstimator,
};
use std::sync::Arc;
use tracing::debug;

/// Learnings and follow-up questions distilled from one query's documents
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub learnings: Vec<String>,
    pub follow_ups: Vec<String>,
}

/// Extracts learnings through the injected generation capability
pub struct LearningExtractor {
    generator: Arc<dyn StructuredGenerator>,
    limiter: ConcurrencyLimiter,
    chunker: TextChunker,
    estimator: Arc<TokenEstimator>,
    trim_token_budget: usize,
}

impl LearningExtractor {
    pub fn new(
        generator: Arc<dyn StructuredGenerator>,
        limiter: ConcurrencyLimiter,
        chunker: TextChunker,
        estimator: Arc<TokenEstimator>,
        trim_token_budget: usize,
    ) -> Self {
        Self {
            generator,
            limiter,
            chunker,
            estimator,
            trim_token_budget,
        }
    }

    /// Extract up to `num_learnings` learnings and `num_follow_ups`
    /// follow-up questions from the documents retrieved for `query`
    ///
    /// An empty document set is the graceful-degradation path: it yields an
    /// empty extraction without touching the generator.
    pub async fn extract(
        &self,
        query: &SearchQuery,
        documents: &[RetrievedDocument],
        num_learnings: usize,
        num_follow_ups: usize,
    ) -> DelverResult<Extraction> {
        if documents.is_empty() {
            return Ok(Extraction::default());
        }

        let contents: Vec<String> = documents
            .iter()
            .map(|doc| {
                self.chunker
                    .trim_to_fit(&doc.content, self.trim_token_budget, &self.estimator)
            })
            .collect();

        let prompt =
            prompts::extract_learnings(&query.text, &contents, num_learnings, num_follow_ups);

        let raw = {
            let _guard = self.limiter.acquire().await?;
            self.generator
                .generate(&prompts::system_prompt(), &prompt)
                .await?
        };

        let payload: LearningsPayload = parse_structured(&raw)?;

        let mut learnings = payload.learnings;
        learnings.truncate(num_learnings);
        let mut follow_ups = payload.follow_up_questions;
        follow_ups.truncate(num_follow_ups);

        debug!(
            query = %query.text,
            learnings = learnings.len(),
            follow_ups = follow_ups.len(),
            "Extracted learnings"
        );

        Ok(Extraction {
            learnings,
            follow_ups,
        })
    }
}
