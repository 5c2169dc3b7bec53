//! Query planning
//!
//! Turns a topic, plus any learnings accumulated on the way down the tree,
//! into a bounded set of search queries with stated research goals.

use crate::prompts;
use crate::provider::{parse_structured, QueryPlanPayload, StructuredGenerator};
use delver_core::{ConcurrencyLimiter, DelverError, DelverResult, ErrorContext, SearchQuery};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Plans search queries through the injected generation capability
pub struct QueryPlanner {
    generator: Arc<dyn StructuredGenerator>,
    limiter: ConcurrencyLimiter,
}

impl QueryPlanner {
    pub fn new(generator: Arc<dyn StructuredGenerator>, limiter: ConcurrencyLimiter) -> Self {
        Self { generator, limiter }
    }

    /// Plan at most `num_queries` queries for a topic
    ///
    /// The generator may return fewer queries when the topic is narrow;
    /// anything beyond the requested count is truncated. Failures map to a
    /// planning error that aborts only the branch that requested the plan.
    pub async fn plan(
        &self,
        topic: &str,
        prior_learnings: &BTreeSet<String>,
        num_queries: usize,
    ) -> DelverResult<Vec<SearchQuery>> {
        let prompt = prompts::plan_queries(topic, prior_learnings, num_queries);

        let raw = {
            let _guard = self.limiter.acquire().await?;
            self.generator
                .generate(&prompts::system_prompt(), &prompt)
                .await
                .map_err(planning_failed)?
        };

        let payload: QueryPlanPayload = parse_structured(&raw).map_err(planning_failed)?;

        let mut queries: Vec<SearchQuery> = payload
            .queries
            .into_iter()
            .map(|planned| SearchQuery {
                text: planned.query,
                research_goal: planned.research_goal,
            })
            .collect();
        queries.truncate(num_queries);

        debug!(topic = topic, count = queries.len(), "Planned search queries");
        Ok(queries)
    }
}

fn planning_failed(source: DelverError) -> DelverError {
    DelverError::Planning {
        message: format!("Query generation failed: {}", source),
        source: Some(Box::new(source)),
        context: ErrorContext::new("planner")
            .with_operation("plan")
            .with_suggestion("Check the generation provider configuration"),
    }
}
