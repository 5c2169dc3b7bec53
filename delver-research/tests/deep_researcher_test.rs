//! Integration tests for the deep research engine
//!
//! All scenarios run against fake capability implementations so the tree
//! shape, aggregation semantics and failure isolation can be asserted
//! deterministically.

use async_trait::async_trait;
use delver_core::{
    DelverConfig, DelverError, DelverResult, ErrorContext, OutputMode, ResearchRequest,
    RetrievedDocument,
};
use delver_research::{DeepResearcher, SearchOptions, SearchProvider, StructuredGenerator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Generator that routes canned responses on prompt markers and counts
/// calls per kind
#[derive(Default)]
struct FakeGenerator {
    plan_calls: AtomicUsize,
    extract_calls: AtomicUsize,
    synthesis_calls: AtomicUsize,
}

#[async_trait]
impl StructuredGenerator for FakeGenerator {
    async fn generate(&self, _system: &str, prompt: &str) -> DelverResult<String> {
        if prompt.contains("generate a list of search queries") {
            self.plan_calls.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{"queries": [
                {"query": "q1", "research_goal": "goal one"},
                {"query": "q2", "research_goal": "goal two"}
            ]}"#
                .to_string())
        } else if prompt.contains("generate a list of learnings") {
            self.extract_calls.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{"learnings": ["l1", "l2"], "follow_up_questions": ["f1"]}"#.to_string())
        } else {
            self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
            Ok("synthesized output".to_string())
        }
    }
}

/// Search provider returning one shared and one query-specific URL, with a
/// probe for the peak number of concurrent in-flight calls
struct FakeSearchProvider {
    current: AtomicUsize,
    peak: AtomicUsize,
    delay: Duration,
    /// Queries that fail instead of returning documents
    failing: Vec<String>,
    /// When set, every query returns no documents
    empty: bool,
}

impl Default for FakeSearchProvider {
    fn default() -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay: Duration::from_millis(5),
            failing: Vec::new(),
            empty: false,
        }
    }
}

#[async_trait]
impl SearchProvider for FakeSearchProvider {
    async fn search(
        &self,
        query: &str,
        _options: &SearchOptions,
    ) -> DelverResult<Vec<RetrievedDocument>> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);

        if self.failing.iter().any(|q| q == query) {
            return Err(DelverError::Provider {
                message: "simulated search failure".to_string(),
                provider: Some("fake".to_string()),
                source: None,
                context: ErrorContext::new("fake"),
            });
        }

        if self.empty {
            return Ok(Vec::new());
        }

        Ok(vec![
            RetrievedDocument {
                url: "https://example.com/shared".to_string(),
                content: "shared page content".to_string(),
            },
            RetrievedDocument {
                url: format!("https://example.com/{query}"),
                content: format!("content for {query}"),
            },
        ])
    }
}

fn test_config() -> DelverConfig {
    let mut config = DelverConfig::default();
    config.research.concurrency = 2;
    config.search.timeout_ms = 1_000;
    config
}

fn researcher_with(
    provider: Arc<FakeSearchProvider>,
    generator: Arc<FakeGenerator>,
) -> DeepResearcher {
    DeepResearcher::new(provider, generator, test_config()).unwrap()
}

#[tokio::test]
async fn depth_zero_plans_once_and_never_recurses() {
    let provider = Arc::new(FakeSearchProvider::default());
    let generator = Arc::new(FakeGenerator::default());
    let engine = researcher_with(provider.clone(), generator.clone());

    let request = ResearchRequest::new("test topic", 2, 0, 2);
    let result = engine.research(&request).await.unwrap();

    assert_eq!(generator.plan_calls.load(Ordering::SeqCst), 1);
    assert!(result.learnings.contains("l1"));
    assert!(result.learnings.contains("l2"));
}

#[tokio::test]
async fn depth_one_recurses_once_per_query_with_halved_breadth() {
    let provider = Arc::new(FakeSearchProvider::default());
    let generator = Arc::new(FakeGenerator::default());
    let engine = researcher_with(provider.clone(), generator.clone());

    let request = ResearchRequest::new("test topic", 2, 1, 2);
    let result = engine.research(&request).await.unwrap();

    // Root plans 2 queries, each spawns one child that plans again.
    assert_eq!(generator.plan_calls.load(Ordering::SeqCst), 3);
    // Children run with breadth 1, so each dispatches a single query:
    // 2 root extractions plus 1 per child.
    assert_eq!(generator.extract_calls.load(Ordering::SeqCst), 4);

    // Duplicate URLs across branches collapse in the aggregate: the shared
    // URL plus one per distinct query text.
    assert!(result.visited_urls.contains("https://example.com/shared"));
    assert!(result.visited_urls.contains("https://example.com/q1"));
    assert!(result.visited_urls.contains("https://example.com/q2"));
    assert_eq!(result.visited_urls.len(), 3);
}

#[tokio::test]
async fn concurrent_searches_never_exceed_the_limit() {
    let provider = Arc::new(FakeSearchProvider {
        delay: Duration::from_millis(20),
        ..FakeSearchProvider::default()
    });
    let generator = Arc::new(FakeGenerator::default());
    let engine = researcher_with(provider.clone(), generator.clone());

    let request = ResearchRequest::new("test topic", 2, 1, 2);
    engine.research(&request).await.unwrap();

    assert!(provider.peak.load(Ordering::SeqCst) <= 2);
    assert!(provider.peak.load(Ordering::SeqCst) >= 1);
}

#[tokio::test]
async fn failed_query_is_isolated_from_siblings() {
    let provider = Arc::new(FakeSearchProvider {
        failing: vec!["q2".to_string()],
        ..FakeSearchProvider::default()
    });
    let generator = Arc::new(FakeGenerator::default());
    let engine = researcher_with(provider.clone(), generator.clone());

    let request = ResearchRequest::new("test topic", 2, 0, 2);
    let result = engine.research(&request).await.unwrap();

    // q2 contributed nothing, but q1's learnings and URLs survive.
    assert!(result.learnings.contains("l1"));
    assert!(result.visited_urls.contains("https://example.com/q1"));
    assert!(!result.visited_urls.contains("https://example.com/q2"));
}

#[tokio::test]
async fn timed_out_query_is_isolated_from_siblings() {
    let provider = Arc::new(FakeSearchProvider {
        delay: Duration::from_millis(200),
        failing: Vec::new(),
        ..FakeSearchProvider::default()
    });
    let generator = Arc::new(FakeGenerator::default());

    let mut config = test_config();
    config.search.timeout_ms = 50;
    let engine = DeepResearcher::new(provider.clone(), generator.clone(), config).unwrap();

    // Every search sleeps past the timeout, so the whole tree degrades to
    // an empty result rather than an error.
    let request = ResearchRequest::new("test topic", 2, 0, 2);
    let result = engine.research(&request).await.unwrap();

    assert!(result.is_empty());
    assert_eq!(generator.extract_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_search_results_skip_extraction() {
    let provider = Arc::new(FakeSearchProvider {
        empty: true,
        ..FakeSearchProvider::default()
    });
    let generator = Arc::new(FakeGenerator::default());
    let engine = researcher_with(provider.clone(), generator.clone());

    let outcome = engine
        .run("test topic", Some(2), Some(0), OutputMode::Answer)
        .await
        .unwrap();

    assert_eq!(generator.extract_calls.load(Ordering::SeqCst), 0);
    assert!(outcome.learnings.is_empty());
    assert!(outcome.visited_urls.is_empty());
    assert_eq!(outcome.result, "synthesized output");
}

#[tokio::test]
async fn report_mode_appends_sources_section() {
    let provider = Arc::new(FakeSearchProvider::default());
    let generator = Arc::new(FakeGenerator::default());
    let engine = researcher_with(provider.clone(), generator.clone());

    let outcome = engine
        .run("test topic", Some(2), Some(0), OutputMode::Report)
        .await
        .unwrap();

    assert!(outcome.result.starts_with("synthesized output"));
    assert!(outcome.result.contains("## Sources"));
    assert!(outcome.result.contains("- https://example.com/shared"));
    assert_eq!(generator.synthesis_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn blank_topic_is_rejected_before_any_work() {
    let provider = Arc::new(FakeSearchProvider::default());
    let generator = Arc::new(FakeGenerator::default());
    let engine = researcher_with(provider.clone(), generator.clone());

    let err = engine
        .run("   ", None, None, OutputMode::Report)
        .await
        .unwrap_err();

    assert!(matches!(err, DelverError::Validation { .. }));
    assert_eq!(generator.plan_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn invalid_request_is_rejected() {
    let provider = Arc::new(FakeSearchProvider::default());
    let generator = Arc::new(FakeGenerator::default());
    let engine = researcher_with(provider, generator);

    let request = ResearchRequest::new("topic", 0, 1, 2);
    let err = engine.research(&request).await.unwrap_err();
    assert!(matches!(err, DelverError::Validation { .. }));
}
