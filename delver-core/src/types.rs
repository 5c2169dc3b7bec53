//! Core data type definitions
//!
//! The research data model is deliberately value-oriented: everything a
//! branch produces is branch-local until it is merged upward by value, so
//! concurrent branches never share mutable state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::error::DelverResult;
use crate::validation_error;

/// Parameters for one research invocation
///
/// Breadth and depth shrink monotonically as the tree recurses: child nodes
/// get `max(1, breadth / 2)` and `depth - 1`. Depth 0 is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    /// The topic or question to research
    pub query: String,
    /// Number of independent search queries explored per recursion level
    pub breadth: usize,
    /// Number of remaining recursion levels
    pub depth: usize,
    /// Tree-wide cap on in-flight external calls
    pub concurrency: usize,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>, breadth: usize, depth: usize, concurrency: usize) -> Self {
        Self {
            query: query.into(),
            breadth,
            depth,
            concurrency,
        }
    }

    /// Validate request parameters before any work is performed
    pub fn validate(&self) -> DelverResult<()> {
        if self.query.trim().is_empty() {
            return Err(validation_error!(
                "Research topic must not be empty",
                "query",
                "research_request"
            ));
        }
        if self.breadth == 0 {
            return Err(validation_error!(
                "Breadth must be at least 1",
                "breadth",
                "research_request"
            ));
        }
        if self.concurrency == 0 {
            return Err(validation_error!(
                "Concurrency limit must be at least 1",
                "concurrency",
                "research_request"
            ));
        }
        Ok(())
    }
}

/// A single search query paired with the goal it is meant to advance
///
/// Produced by the query planner, consumed once by the search dispatcher.
/// The research goal survives the query itself: it seeds the continuation
/// query when a branch recurses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    pub research_goal: String,
}

/// A document retrieved for one search query
///
/// Owned by the branch that fetched it and never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub url: String,
    pub content: String,
}

/// Aggregated output of one research branch and everything below it
///
/// Learnings and visited URLs use set semantics keyed by value equality.
/// `merge` is commutative and associative, which is what makes concurrent,
/// out-of-order branch completion safe without extra synchronization.
/// `BTreeSet` additionally gives deterministic iteration for report output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchResult {
    pub learnings: BTreeSet<String>,
    pub visited_urls: BTreeSet<String>,
}

impl BranchResult {
    /// Union another branch's results into this one
    pub fn absorb(&mut self, other: BranchResult) {
        self.learnings.extend(other.learnings);
        self.visited_urls.extend(other.visited_urls);
    }

    /// Merge two branch results by set union
    pub fn merge(a: BranchResult, b: BranchResult) -> BranchResult {
        let mut merged = a;
        merged.absorb(b);
        merged
    }

    pub fn add_learning(&mut self, learning: impl Into<String>) {
        self.learnings.insert(learning.into());
    }

    pub fn record_url(&mut self, url: impl Into<String>) {
        self.visited_urls.insert(url.into());
    }

    pub fn is_empty(&self) -> bool {
        self.learnings.is_empty() && self.visited_urls.is_empty()
    }
}

/// Output shape of the final synthesis step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    /// Long-form structured report ending with an enumerated sources section
    Report,
    /// Short direct answer, no sources section
    Answer,
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "report" => Ok(OutputMode::Report),
            "answer" => Ok(OutputMode::Answer),
            other => Err(format!("unknown output mode: {other}")),
        }
    }
}

/// Result of a complete research invocation, as returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    /// The synthesized report or answer
    pub result: String,
    /// All deduplicated learnings gathered across the tree
    pub learnings: Vec<String>,
    /// All deduplicated source URLs visited across the tree
    pub visited_urls: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(learnings: &[&str], urls: &[&str]) -> BranchResult {
        BranchResult {
            learnings: learnings.iter().map(|s| s.to_string()).collect(),
            visited_urls: urls.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn merge_is_commutative() {
        let a = branch(&["x", "y"], &["https://a.example"]);
        let b = branch(&["y", "z"], &["https://b.example"]);

        assert_eq!(
            BranchResult::merge(a.clone(), b.clone()),
            BranchResult::merge(b, a)
        );
    }

    #[test]
    fn merge_is_associative() {
        let a = branch(&["a"], &["https://a.example"]);
        let b = branch(&["b"], &["https://b.example"]);
        let c = branch(&["a", "c"], &["https://a.example", "https://c.example"]);

        let left = BranchResult::merge(BranchResult::merge(a.clone(), b.clone()), c.clone());
        let right = BranchResult::merge(a, BranchResult::merge(b, c));
        assert_eq!(left, right);
    }

    #[test]
    fn merge_deduplicates_by_value() {
        let a = branch(&["same fact"], &["https://shared.example"]);
        let b = branch(&["same fact"], &["https://shared.example"]);

        let merged = BranchResult::merge(a, b);
        assert_eq!(merged.learnings.len(), 1);
        assert_eq!(merged.visited_urls.len(), 1);
    }

    #[test]
    fn empty_is_merge_identity() {
        let a = branch(&["fact"], &["https://a.example"]);
        assert_eq!(
            BranchResult::merge(a.clone(), BranchResult::default()),
            a.clone()
        );
        assert_eq!(BranchResult::merge(BranchResult::default(), a.clone()), a);
    }

    #[test]
    fn request_validation_rejects_bad_parameters() {
        assert!(ResearchRequest::new("topic", 4, 2, 2).validate().is_ok());
        assert!(ResearchRequest::new("  ", 4, 2, 2).validate().is_err());
        assert!(ResearchRequest::new("topic", 0, 2, 2).validate().is_err());
        assert!(ResearchRequest::new("topic", 4, 2, 0).validate().is_err());
        // Depth 0 is a valid terminal request, not an error
        assert!(ResearchRequest::new("topic", 1, 0, 1).validate().is_ok());
    }

    #[test]
    fn output_mode_parses_case_insensitively() {
        assert_eq!("Report".parse::<OutputMode>().unwrap(), OutputMode::Report);
        assert_eq!("answer".parse::<OutputMode>().unwrap(), OutputMode::Answer);
        assert!("essay".parse::<OutputMode>().is_err());
    }
}
