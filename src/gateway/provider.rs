//! Gateway over any `edgequake-llm` chat provider.
//!
//! The prompt goes out as a single user message; the provider reports token
//! usage on its response. Provider errors become failed replies with status
//! 0, since the provider abstraction does not expose HTTP status codes.

use super::{Gateway, GatewayReply};
use crate::config::AnalysisConfig;
use crate::report::TokenUsage;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct ProviderGateway {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    label: String,
}

impl ProviderGateway {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            options: CompletionOptions {
                temperature: Some(0.2),
                ..Default::default()
            },
            label: label.into(),
        }
    }

    /// Take sampling options from the analysis config.
    pub fn from_config(
        provider: Arc<dyn LLMProvider>,
        label: impl Into<String>,
        config: &AnalysisConfig,
    ) -> Self {
        Self {
            options: build_options(config),
            ..Self::new(provider, label)
        }
    }
}

#[async_trait]
impl Gateway for ProviderGateway {
    async fn send(&self, prompt: &str) -> GatewayReply {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(prompt)];

        match self.provider.chat(&messages, Some(&self.options)).await {
            Ok(response) => {
                let elapsed = start.elapsed();
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    self.label, response.prompt_tokens, response.completion_tokens, elapsed
                );
                GatewayReply::success(
                    response.content,
                    TokenUsage::new(
                        response.prompt_tokens as u64,
                        response.completion_tokens as u64,
                    ),
                    elapsed,
                )
            }
            Err(e) => {
                warn!("{}: chat call failed: {}", self.label, e);
                GatewayReply::failure(0, e.to_string(), start.elapsed())
            }
        }
    }

    fn name(&self) -> &str {
        &self.label
    }
}

fn build_options(config: &AnalysisConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let config = AnalysisConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(512));
    }

    #[test]
    fn build_options_follow_config() {
        let config = AnalysisConfig::builder()
            .temperature(0.7)
            .max_tokens(64)
            .build()
            .unwrap();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.7));
        assert_eq!(opts.max_tokens, Some(64));
    }
}
