//! The recursion controller
//!
//! Drives the research tree: plan queries, dispatch searches, extract
//! learnings, then recurse with halved breadth and decremented depth for
//! every query that produced follow-up questions.
//!
//! Recursion is expressed as an explicit worklist rather than nested calls:
//! a `FuturesUnordered` holds one future per live node, completed branches
//! are merged in arrival order (safe because merge is commutative and
//! associative), and newly spawned children are pushed back into the same
//! set. Stack depth stays constant regardless of the requested depth, and
//! no branch can outlive the invocation that spawned it.

use crate::dispatcher::SearchDispatcher;
use crate::extractor::LearningExtractor;
use crate::planner::QueryPlanner;
use crate::prompts;
use crate::provider::{SearchOptions, SearchProvider, StructuredGenerator};
use crate::synthesizer::Synthesizer;
use delver_core::{
    validation_error, BranchResult, ConcurrencyLimiter, DelverConfig, DelverResult, OutputMode,
    ResearchOutcome, ResearchRequest, TextChunker, TokenEstimator,
};
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One level of the recursion tree
///
/// Exists only in the worklist; nothing is persisted between nodes except
/// the learnings handed down to sharpen the child's planning.
struct ResearchNode {
    query: String,
    prior_learnings: BTreeSet<String>,
    breadth: usize,
    depth: usize,
}

/// The deep research engine
///
/// Both external capabilities are injected at construction; the engine owns
/// no provider state of its own.
pub struct DeepResearcher {
    provider: Arc<dyn SearchProvider>,
    generator: Arc<dyn StructuredGenerator>,
    config: DelverConfig,
    chunker: TextChunker,
    estimator: Arc<TokenEstimator>,
}

impl DeepResearcher {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        generator: Arc<dyn StructuredGenerator>,
        config: DelverConfig,
    ) -> DelverResult<Self> {
        config.validate()?;
        let chunker = TextChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        let estimator = Arc::new(TokenEstimator::for_model(&config.llm.model));

        Ok(Self {
            provider,
            generator,
            config,
            chunker,
            estimator,
        })
    }

    /// Top-level entry point: research a topic and synthesize the result
    ///
    /// `breadth` and `depth` fall back to the configured defaults when
    /// omitted. An empty topic is a validation error raised before any work
    /// is performed.
    pub async fn run(
        &self,
        topic: &str,
        breadth: Option<usize>,
        depth: Option<usize>,
        mode: OutputMode,
    ) -> DelverResult<ResearchOutcome> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(validation_error!(
                "Research topic is required",
                "topic",
                "engine"
            ));
        }

        let request = ResearchRequest::new(
            topic,
            breadth.unwrap_or(self.config.research.breadth),
            depth.unwrap_or(self.config.research.depth),
            self.config.research.concurrency,
        );

        info!(
            topic = topic,
            breadth = request.breadth,
            depth = request.depth,
            concurrency = request.concurrency,
            "Starting deep research"
        );

        let aggregate = self.research(&request).await?;

        info!(
            learnings = aggregate.learnings.len(),
            sources = aggregate.visited_urls.len(),
            "Research tree complete, synthesizing"
        );

        let synthesizer = Synthesizer::new(Arc::clone(&self.generator));
        let result = match mode {
            OutputMode::Report => synthesizer.write_report(topic, &aggregate).await?,
            OutputMode::Answer => synthesizer.write_answer(topic, &aggregate).await?,
        };

        Ok(ResearchOutcome {
            result,
            learnings: aggregate.learnings.into_iter().collect(),
            visited_urls: aggregate.visited_urls.into_iter().collect(),
        })
    }

    /// Execute the research tree for a validated request
    ///
    /// Returns the set union of every branch's learnings and visited URLs.
    pub async fn research(&self, request: &ResearchRequest) -> DelverResult<BranchResult> {
        request.validate()?;

        // One limiter per invocation, shared by every external call in the
        // tree regardless of recursion level.
        let limiter = ConcurrencyLimiter::new(request.concurrency)?;
        let workers = self.branch_workers(limiter);

        let root = ResearchNode {
            query: request.query.clone(),
            prior_learnings: BTreeSet::new(),
            breadth: request.breadth,
            depth: request.depth,
        };

        let mut aggregate = BranchResult::default();
        let mut inflight: FuturesUnordered<BoxFuture<'_, (BranchResult, Vec<ResearchNode>)>> =
            FuturesUnordered::new();
        inflight.push(workers.explore(root).boxed());

        while let Some((branch, children)) = inflight.next().await {
            aggregate.absorb(branch);
            for child in children {
                inflight.push(workers.explore(child).boxed());
            }
        }

        Ok(aggregate)
    }

    fn branch_workers(&self, limiter: ConcurrencyLimiter) -> BranchWorkers {
        let options = SearchOptions {
            timeout_ms: self.config.search.timeout_ms,
            max_results: self.config.search.max_results,
        };

        BranchWorkers {
            planner: QueryPlanner::new(Arc::clone(&self.generator), limiter.clone()),
            dispatcher: SearchDispatcher::new(
                Arc::clone(&self.provider),
                limiter.clone(),
                options,
                self.config.search.max_attempts,
            ),
            extractor: LearningExtractor::new(
                Arc::clone(&self.generator),
                limiter,
                self.chunker.clone(),
                Arc::clone(&self.estimator),
                self.config.chunking.trim_token_budget,
            ),
            num_learnings: self.config.research.num_learnings,
            num_follow_ups: self.config.research.num_follow_ups,
        }
    }
}

/// Per-invocation pipeline components sharing one concurrency limiter
struct BranchWorkers {
    planner: QueryPlanner,
    dispatcher: SearchDispatcher,
    extractor: LearningExtractor,
    num_learnings: usize,
    num_follow_ups: usize,
}

impl BranchWorkers {
    /// Process one node: plan, dispatch, extract, and describe the children
    /// to spawn
    ///
    /// Never fails: branch-local errors are logged and degrade to an empty
    /// contribution so sibling branches proceed unaffected.
    async fn explore(&self, node: ResearchNode) -> (BranchResult, Vec<ResearchNode>) {
        debug!(
            query = %node.query,
            breadth = node.breadth,
            depth = node.depth,
            "Exploring research node"
        );

        let queries = match self
            .planner
            .plan(&node.query, &node.prior_learnings, node.breadth)
            .await
        {
            Ok(queries) => queries,
            Err(e) => {
                e.log();
                return (BranchResult::default(), Vec::new());
            }
        };

        let outcomes = self.dispatcher.dispatch(queries).await;

        // Extraction for each successfully dispatched query runs
        // concurrently; the shared limiter still bounds the generation calls.
        let extracted = futures::future::join_all(outcomes.into_iter().map(|outcome| async move {
            match outcome.result {
                Ok(documents) => {
                    let extraction = self
                        .extractor
                        .extract(
                            &outcome.query,
                            &documents,
                            self.num_learnings,
                            self.num_follow_ups,
                        )
                        .await;
                    (outcome.query, documents, Some(extraction))
                }
                Err(_) => (outcome.query, Vec::new(), None),
            }
        }))
        .await;

        let mut branch = BranchResult::default();
        let mut children = Vec::new();

        for (query, documents, extraction) in extracted {
            for document in &documents {
                branch.record_url(document.url.clone());
            }

            let Some(extraction) = extraction else {
                continue;
            };

            match extraction {
                Ok(extraction) => {
                    for learning in &extraction.learnings {
                        branch.add_learning(learning.clone());
                    }

                    // A query with no follow-ups simply does not recurse
                    if node.depth > 0 && !extraction.follow_ups.is_empty() {
                        let mut prior = node.prior_learnings.clone();
                        prior.extend(extraction.learnings.iter().cloned());

                        children.push(ResearchNode {
                            query: prompts::continuation_query(
                                &query.research_goal,
                                &extraction.follow_ups,
                            ),
                            prior_learnings: prior,
                            breadth: (node.breadth / 2).max(1),
                            depth: node.depth - 1,
                        });
                    }
                }
                Err(e) => {
                    warn!(
                        query = %query.text,
                        error = %e,
                        "Learning extraction failed, dropping this query's contribution"
                    );
                }
            }
        }

        (branch, children)
    }
}
