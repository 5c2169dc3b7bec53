//! Final synthesis
//!
//! Turns the aggregated learnings of a research tree into either a
//! long-form report or a short direct answer. Unlike the branch-level
//! steps, a generation failure here is fatal to the invocation: there is no
//! partial-report fallback.

use crate::prompts;
use crate::provider::StructuredGenerator;
use delver_core::{BranchResult, DelverResult};
use std::sync::Arc;
use tracing::info;

/// Synthesizes the final deliverable from aggregated branch results
pub struct Synthesizer {
    generator: Arc<dyn StructuredGenerator>,
}

impl Synthesizer {
    pub fn new(generator: Arc<dyn StructuredGenerator>) -> Self {
        Self { generator }
    }

    /// Write a long-form report ending with an enumerated sources section
    ///
    /// The sources section is built directly from the visited URLs, with no
    /// model involvement, so a source can never be hallucinated into it.
    pub async fn write_report(&self, topic: &str, result: &BranchResult) -> DelverResult<String> {
        info!(
            topic = topic,
            learnings = result.learnings.len(),
            sources = result.visited_urls.len(),
            "Writing final report"
        );

        let raw = self
            .generator
            .generate(
                &prompts::system_prompt(),
                &prompts::final_report(topic, &result.learnings),
            )
            .await?;

        let mut report = raw.trim().to_string();
        report.push_str("\n\n## Sources\n");
        for url in &result.visited_urls {
            report.push_str(&format!("\n- {url}"));
        }
        Ok(report)
    }

    /// Write a short direct answer, no sources section
    pub async fn write_answer(&self, topic: &str, result: &BranchResult) -> DelverResult<String> {
        info!(
            topic = topic,
            learnings = result.learnings.len(),
            "Writing final answer"
        );

        let raw = self
            .generator
            .generate(
                &prompts::system_prompt(),
                &prompts::final_answer(topic, &result.learnings),
            )
            .await?;

        Ok(raw.trim().to_string())
    }
}
