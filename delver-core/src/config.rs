//! Configuration management

use crate::error::{DelverError, DelverResult, ErrorContext};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for a Delver deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DelverConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub research: ResearchDefaults,
    pub chunking: ChunkingConfig,
}

/// Text-generation provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name: openai, anthropic, groq or ollama
    pub provider: String,
    pub model: String,
    /// API key; falls back to the provider's environment variable when unset
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.7,
            max_tokens: Some(4000),
        }
    }
}

/// Search provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base URL of a SearxNG-compatible JSON search endpoint
    pub base_url: String,
    /// Per-query timeout in milliseconds
    pub timeout_ms: u64,
    /// Maximum documents retrieved per query
    pub max_results: usize,
    /// Attempts per search call; 1 disables retries
    pub max_attempts: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8888".to_string(),
            timeout_ms: 15_000,
            max_results: 5,
            max_attempts: 1,
        }
    }
}

/// Defaults applied when a research request omits a parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchDefaults {
    pub breadth: usize,
    pub depth: usize,
    /// Tree-wide cap on concurrent external calls
    pub concurrency: usize,
    /// Facts requested from each extraction call
    pub num_learnings: usize,
    /// Follow-up questions requested from each extraction call
    pub num_follow_ups: usize,
}

impl Default for ResearchDefaults {
    fn default() -> Self {
        Self {
            breadth: 4,
            depth: 2,
            concurrency: 2,
            num_learnings: 3,
            num_follow_ups: 3,
        }
    }
}

/// Chunking and prompt-trimming settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Token budget each retrieved document is trimmed to before it is
    /// embedded in an extraction prompt
    pub trim_token_budget: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            trim_token_budget: 25_000,
        }
    }
}

impl DelverConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> DelverResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DelverError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: DelverConfig = toml::from_str(&content).map_err(|e| DelverError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> DelverResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| DelverError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| DelverError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> DelverResult<()> {
        if self.research.concurrency == 0 {
            return Err(DelverError::Config {
                message: "research.concurrency must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set research.concurrency to a positive value"),
            });
        }

        if self.research.breadth == 0 {
            return Err(DelverError::Config {
                message: "research.breadth must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set research.breadth to a positive value"),
            });
        }

        if self.chunking.chunk_size == 0 {
            return Err(DelverError::Config {
                message: "chunking.chunk_size must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set chunking.chunk_size to a positive value"),
            });
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(DelverError::Config {
                message: "chunking.chunk_overlap must be smaller than chunking.chunk_size"
                    .to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Reduce chunking.chunk_overlap"),
            });
        }

        if self.search.timeout_ms == 0 {
            return Err(DelverError::Config {
                message: "search.timeout_ms must be greater than 0".to_string(),
                source: None,
                context: ErrorContext::new("config")
                    .with_operation("validate")
                    .with_suggestion("Set search.timeout_ms to a positive value"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(DelverConfig::default().validate().is_ok());
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = DelverConfig::default();
        config.research.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = DelverConfig::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("delver.toml");

        let mut config = DelverConfig::default();
        config.research.breadth = 6;
        config.search.base_url = "https://searx.internal:8080".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = DelverConfig::from_file(&path).unwrap();
        assert_eq!(loaded.research.breadth, 6);
        assert_eq!(loaded.search.base_url, "https://searx.internal:8080");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let result = DelverConfig::from_file("/nonexistent/delver.toml");
        assert!(matches!(result, Err(DelverError::Config { .. })));
    }
}
