//! Delver research engine
//!
//! Recursive deep-research orchestration: a topic is expanded into search
//! queries, retrieved documents are distilled into learnings, and follow-up
//! questions drive bounded recursion with halved breadth per level. The
//! aggregated learnings are finally synthesized into a report or a direct
//! answer.
//!
//! External capabilities (web search and text generation) are injected
//! through the [`SearchProvider`] and [`StructuredGenerator`] traits;
//! concrete implementations for SearxNG and siumai-backed LLM providers
//! ship in this crate but the engine works with any implementation.

pub mod dispatcher;
pub mod engine;
pub mod extractor;
pub mod llm;
pub mod planner;
pub mod prompts;
pub mod provider;
pub mod searxng;
pub mod synthesizer;

pub use dispatcher::{DispatchOutcome, SearchDispatcher};
pub use engine::DeepResearcher;
pub use extractor::{Extraction, LearningExtractor};
pub use llm::{create_auto_generator, SiumaiGenerator};
pub use planner::QueryPlanner;
pub use provider::{SearchOptions, SearchProvider, StructuredGenerator};
pub use searxng::SearxngProvider;
pub use synthesizer::Synthesizer;
