//! Token counting utilities
//!
//! Accurate token counts matter for keeping prompts inside a generation
//! service's context window. Counting uses tiktoken-rs when an encoder is
//! available for the configured model, with a conservative characters/4
//! heuristic as the fallback.

use tiktoken_rs::{get_bpe_from_model, CoreBPE};
use tracing::warn;

/// Estimates token counts for prompt budgeting
pub struct TokenEstimator {
    encoder: Option<CoreBPE>,
    model_name: String,
}

impl TokenEstimator {
    /// Create an estimator for the given model
    ///
    /// Falls back to the heuristic when tiktoken has no encoder for the
    /// model; an estimate that is slightly off is preferable to refusing to
    /// run against an unknown provider.
    pub fn for_model(model_name: &str) -> Self {
        let encoder = match get_bpe_from_model(model_name) {
            Ok(encoder) => Some(encoder),
            Err(e) => {
                warn!(
                    model = model_name,
                    error = %e,
                    "No tokenizer for model, falling back to character heuristic"
                );
                None
            }
        };
        Self {
            encoder,
            model_name: model_name.to_string(),
        }
    }

    /// Create an estimator that always uses the character heuristic
    pub fn heuristic() -> Self {
        Self {
            encoder: None,
            model_name: "heuristic".to_string(),
        }
    }

    /// Count the tokens in a text string
    pub fn count(&self, text: &str) -> usize {
        match &self.encoder {
            Some(encoder) => encoder.encode_with_special_tokens(text).len(),
            None => text.chars().count().div_ceil(4),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::for_model("gpt-4o-mini")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_rounds_up() {
        let estimator = TokenEstimator::heuristic();
        assert_eq!(estimator.count(""), 0);
        assert_eq!(estimator.count("abc"), 1);
        assert_eq!(estimator.count("abcd"), 1);
        assert_eq!(estimator.count("abcde"), 2);
    }

    #[test]
    fn unknown_model_falls_back_to_heuristic() {
        let estimator = TokenEstimator::for_model("definitely-not-a-real-model");
        assert_eq!(estimator.count("abcdefgh"), 2);
    }

    #[test]
    fn known_model_counts_tokens() {
        let estimator = TokenEstimator::for_model("gpt-4o-mini");
        let count = estimator.count("The quick brown fox jumps over the lazy dog.");
        assert!(count > 0);
        assert!(count < 20);
    }
}
