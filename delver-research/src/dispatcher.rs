//! Search dispatch
//!
//! Runs a batch of planned queries against the search capability, all
//! concurrently but gated by the tree-wide concurrency limiter. Failures
//! stay confined to the query that raised them: a timed-out or failed query
//! yields an error slot in the batch result and never cancels its siblings.

use crate::provider::{SearchOptions, SearchProvider};
use delver_core::{
    retry_async, with_timeout, ConcurrencyLimiter, DelverResult, RetrievedDocument, RetryConfig,
    SearchQuery,
};
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Outcome of dispatching one query
pub struct DispatchOutcome {
    pub query: SearchQuery,
    pub result: DelverResult<Vec<RetrievedDocument>>,
}

/// Executes search queries under the shared concurrency limiter
pub struct SearchDispatcher {
    provider: Arc<dyn SearchProvider>,
    limiter: ConcurrencyLimiter,
    options: SearchOptions,
    /// Attempts per query; 1 is the zero-retry baseline
    max_attempts: usize,
}

impl SearchDispatcher {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        limiter: ConcurrencyLimiter,
        options: SearchOptions,
        max_attempts: usize,
    ) -> Self {
        Self {
            provider,
            limiter,
            options,
            max_attempts,
        }
    }

    /// Dispatch all queries concurrently, one outcome per query in order
    pub async fn dispatch(&self, queries: Vec<SearchQuery>) -> Vec<DispatchOutcome> {
        let tasks = queries.into_iter().map(|query| self.run_query(query));
        futures::future::join_all(tasks).await
    }

    async fn run_query(&self, query: SearchQuery) -> DispatchOutcome {
        let result = self.fetch(&query).await;

        match &result {
            Ok(documents) => {
                debug!(
                    query = %query.text,
                    documents = documents.len(),
                    "Search query completed"
                );
            }
            Err(e) if e.is_branch_local() => {
                warn!(
                    query = %query.text,
                    error = %e,
                    "Search query failed, sibling queries proceed"
                );
            }
            Err(e) => {
                error!(
                    query = %query.text,
                    error = %e,
                    "Unexpected search failure, sibling queries proceed"
                );
            }
        }

        DispatchOutcome { query, result }
    }

    /// Run one search call: permit, then timeout-wrapped provider call
    ///
    /// The permit is re-acquired on every attempt so a retrying query cannot
    /// hold a concurrency slot while it sleeps out its backoff.
    async fn fetch(&self, query: &SearchQuery) -> DelverResult<Vec<RetrievedDocument>> {
        let provider = Arc::clone(&self.provider);
        let limiter = self.limiter.clone();
        let options = self.options.clone();
        let text = query.text.clone();

        retry_async(
            move || {
                let provider = Arc::clone(&provider);
                let limiter = limiter.clone();
                let options = options.clone();
                let text = text.clone();
                async move {
                    let _guard = limiter.acquire().await?;
                    let documents = with_timeout(
                        provider.search(&text, &options),
                        options.timeout_ms,
                        "search",
                    )
                    .await??;
                    Ok(documents)
                }
                .boxed()
            },
            RetryConfig::with_attempts(self.max_attempts),
            "search",
        )
        .await
    }
}
