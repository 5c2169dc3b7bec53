//! Generation capability backed by siumai
//!
//! Wraps a siumai client behind the [`StructuredGenerator`] trait so the
//! engine never talks to a concrete provider directly. Provider selection,
//! API-key lookup and message framing all live here.

use crate::provider::StructuredGenerator;
use async_trait::async_trait;
use delver_core::{DelverError, DelverResult, ErrorContext, LlmConfig};
use siumai::prelude::*;
use std::time::Instant;
use tracing::{debug, info};

/// Unified generation client supporting multiple providers
pub struct SiumaiGenerator {
    client: Box<dyn LlmClient>,
    config: LlmConfig,
}

impl SiumaiGenerator {
    /// Create a generator for the configured provider
    pub async fn new(config: LlmConfig) -> DelverResult<Self> {
        let client = Self::build_client(&config).await?;

        info!(
            provider = %config.provider,
            model = %config.model,
            "Created generation client"
        );

        Ok(Self { client, config })
    }

    /// Build the appropriate siumai client based on configuration
    async fn build_client(config: &LlmConfig) -> DelverResult<Box<dyn LlmClient>> {
        match config.provider.as_str() {
            "openai" => {
                let api_key = config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                    .ok_or_else(|| missing_key_error("openai", "OPENAI_API_KEY"))?;

                let mut builder = LlmBuilder::new()
                    .openai()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                if let Some(base_url) = &config.base_url {
                    builder = builder.base_url(base_url);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| build_error(config, "Failed to build OpenAI client", e))?;

                Ok(Box::new(client))
            }
            "anthropic" => {
                let api_key = config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
                    .ok_or_else(|| missing_key_error("anthropic", "ANTHROPIC_API_KEY"))?;

                let mut builder = LlmBuilder::new()
                    .anthropic()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| build_error(config, "Failed to build Anthropic client", e))?;

                Ok(Box::new(client))
            }
            "ollama" => {
                let base_url = config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".to_string());

                let mut builder = LlmBuilder::new()
                    .ollama()
                    .model(&config.model)
                    .base_url(&base_url)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| build_error(config, "Failed to build Ollama client", e))?;

                Ok(Box::new(client))
            }
            "groq" => {
                let api_key = config
                    .api_key
                    .clone()
                    .or_else(|| std::env::var("GROQ_API_KEY").ok())
                    .ok_or_else(|| missing_key_error("groq", "GROQ_API_KEY"))?;

                let mut builder = LlmBuilder::new()
                    .groq()
                    .api_key(&api_key)
                    .model(&config.model)
                    .temperature(config.temperature);

                if let Some(max_tokens) = config.max_tokens {
                    builder = builder.max_tokens(max_tokens);
                }

                let client = builder
                    .build()
                    .await
                    .map_err(|e| build_error(config, "Failed to build Groq client", e))?;

                Ok(Box::new(client))
            }
            provider => Err(DelverError::Config {
                message: format!("Unsupported generation provider: {}", provider),
                source: None,
                context: ErrorContext::new("llm")
                    .with_operation("build_client")
                    .with_suggestion("Supported providers: openai, anthropic, ollama, groq"),
            }),
        }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

#[async_trait]
impl StructuredGenerator for SiumaiGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> DelverResult<String> {
        let start_time = Instant::now();
        let messages = vec![system!(system), user!(prompt)];

        let response = self.client.chat(messages).await.map_err(|e| {
            generation_error(&self.config, format!("Generation request failed: {}", e))
        })?;

        match response.content_text() {
            Some(content) => {
                debug!(
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    chars = content.len(),
                    "Generated response"
                );
                Ok(content.to_string())
            }
            None => Err(generation_error(
                &self.config,
                "No text content in generation response".to_string(),
            )),
        }
    }
}

/// Create a generator by probing well-known API key variables
///
/// Tries providers in order of preference, taking the first whose key is
/// present in the environment. Used when no provider is configured
/// explicitly.
pub async fn create_auto_generator() -> DelverResult<SiumaiGenerator> {
    let candidates = [
        ("openai", "OPENAI_API_KEY", "gpt-4o-mini"),
        ("anthropic", "ANTHROPIC_API_KEY", "claude-3-5-haiku-20241022"),
        ("groq", "GROQ_API_KEY", "llama-3.1-8b-instant"),
    ];

    for (provider, env_var, model) in candidates {
        if std::env::var(env_var).is_ok() {
            info!(provider = provider, "Auto-detected generation provider");
            let config = LlmConfig {
                provider: provider.to_string(),
                model: model.to_string(),
                ..LlmConfig::default()
            };
            return SiumaiGenerator::new(config).await;
        }
    }

    Err(DelverError::Config {
        message: "No generation provider available".to_string(),
        source: None,
        context: ErrorContext::new("llm")
            .with_operation("create_auto_generator")
            .with_suggestion("Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or GROQ_API_KEY")
            .with_suggestion("Or configure an explicit provider in the config file"),
    })
}

fn missing_key_error(provider: &str, env_var: &str) -> DelverError {
    DelverError::Config {
        message: format!("{} API key not found", provider),
        source: None,
        context: ErrorContext::new("llm")
            .with_operation("build_client")
            .with_suggestion(&format!("Set the {} environment variable", env_var))
            .with_suggestion("Or set llm.api_key in the config file"),
    }
}

fn build_error(
    config: &LlmConfig,
    message: &str,
    source: impl std::error::Error + Send + Sync + 'static,
) -> DelverError {
    DelverError::Provider {
        message: format!("{}: {}", message, source),
        provider: Some(config.provider.clone()),
        source: Some(Box::new(source)),
        context: ErrorContext::new("llm").with_operation("build_client"),
    }
}

fn generation_error(config: &LlmConfig, message: String) -> DelverError {
    DelverError::Generation {
        message,
        provider: Some(config.provider.clone()),
        model: Some(config.model.clone()),
        context: ErrorContext::new("llm").with_operation("generate"),
    }
}
