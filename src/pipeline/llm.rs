//! Per-chunk model interaction: prompt in, [`ChunkOutcome`] out.
//!
//! This stage is deliberately thin. Prompt wording lives in
//! [`crate::prompts`], reply recovery in [`super::parse`]; here we only
//! render the prompt, bound the call by the request timeout, and turn the
//! gateway reply into a classification or a per-chunk error.
//!
//! ## No retries
//!
//! A failed chunk is recorded and the run moves on. The analyser's rate
//! delay already spaces calls out; retrying would multiply the cost of a
//! document against a quota-limited endpoint.

use super::parse::{classification_from_value, parse_response};
use crate::config::AnalysisConfig;
use crate::error::ChunkError;
use crate::gateway::{Gateway, GatewayReply};
use crate::prompts::{build_prompt, render_template};
use crate::report::{ChunkResult, ClassificationSet, TokenUsage};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// What came back for one chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// The call succeeded; the set may be empty.
    Classified {
        classification: ClassificationSet,
        usage: TokenUsage,
        elapsed: Duration,
        status: u16,
    },
    /// The call failed or timed out.
    Failed(ChunkResult),
}

/// Render the prompt for one chunk.
pub fn render_prompt(config: &AnalysisConfig, disease: &str, block: &str) -> String {
    match config.prompt_template.as_deref() {
        Some(template) => render_template(template, disease, block),
        None => build_prompt(disease, block),
    }
}

/// Classify one chunk through the gateway.
///
/// Never returns an error: failures come back as [`ChunkOutcome::Failed`]
/// so one bad chunk does not abort the document.
pub async fn process_chunk(
    gateway: &dyn Gateway,
    chunk_idx: usize,
    block: &str,
    disease: &str,
    config: &AnalysisConfig,
) -> ChunkOutcome {
    let prompt = render_prompt(config, disease, block);
    let start = Instant::now();

    let reply = match tokio::time::timeout(config.request_timeout, gateway.send(&prompt)).await {
        Ok(reply) => reply,
        Err(_) => {
            let secs = config.request_timeout.as_secs();
            warn!("Chunk {}: {} timed out after {}s", chunk_idx, gateway.name(), secs);
            return ChunkOutcome::Failed(ChunkResult::failure(
                chunk_idx,
                start.elapsed(),
                0,
                ChunkError::Timeout {
                    chunk: chunk_idx,
                    secs,
                },
            ));
        }
    };

    interpret_reply(chunk_idx, reply)
}

/// Turn a gateway reply into an outcome, preferring pre-parsed JSON.
pub fn interpret_reply(chunk_idx: usize, reply: GatewayReply) -> ChunkOutcome {
    if !reply.ok {
        warn!(
            "Chunk {}: gateway call failed (status {})",
            chunk_idx, reply.status
        );
        return ChunkOutcome::Failed(ChunkResult::failure(
            chunk_idx,
            reply.elapsed,
            reply.status,
            ChunkError::GatewayFailed {
                chunk: chunk_idx,
                status: reply.status,
                detail: reply.text,
            },
        ));
    }

    let classification = match reply.parsed {
        Some(ref value) => classification_from_value(value),
        None => parse_response(&reply.text),
    };
    debug!(
        "Chunk {}: {} relevant, {} irrelevant, {:?}",
        chunk_idx,
        classification.relevant().len(),
        classification.irrelevant().len(),
        reply.elapsed
    );

    ChunkOutcome::Classified {
        classification,
        usage: reply.usage,
        elapsed: reply.elapsed,
        status: reply.status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct Fixed(GatewayReply);

    #[async_trait]
    impl Gateway for Fixed {
        async fn send(&self, _prompt: &str) -> GatewayReply {
            self.0.clone()
        }
    }

    struct Stalled;

    #[async_trait]
    impl Gateway for Stalled {
        async fn send(&self, _prompt: &str) -> GatewayReply {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            GatewayReply::failure(0, "unreachable", Duration::ZERO)
        }
    }

    #[test]
    fn custom_template_is_used() {
        let config = AnalysisConfig::builder()
            .prompt_template("D={disease} B={block}")
            .build()
            .unwrap();
        assert_eq!(render_prompt(&config, "gout", "x"), "D=gout B=x");
    }

    #[test]
    fn failure_becomes_chunk_error() {
        let reply = GatewayReply::failure(429, "quota", Duration::ZERO);
        match interpret_reply(2, reply) {
            ChunkOutcome::Failed(result) => {
                assert_eq!(result.index, 2);
                assert_eq!(result.status, 429);
                assert!(matches!(
                    result.error,
                    Some(ChunkError::GatewayFailed { chunk: 2, status: 429, .. })
                ));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn pre_parsed_json_wins_over_text() {
        let reply = GatewayReply::success(
            r#"{"relevant":[{"name":"FromText","explanation":""}]}"#,
            TokenUsage::new(1, 1),
            Duration::ZERO,
        )
        .with_parsed(json!({"relevant":[{"name":"FromJson","explanation":""}]}));
        match interpret_reply(1, reply) {
            ChunkOutcome::Classified { classification, .. } => {
                assert_eq!(classification.relevant()[0].name(), "FromJson");
            }
            other => panic!("expected classification, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn raw_text_is_parsed() {
        let gw = Fixed(GatewayReply::success(
            "```json\n{\"relevant\":[],\"irrelevant\":[{\"name\":\"Ibuprofen\",\"explanation\":\"pain\"}]}\n```",
            TokenUsage::new(100, 20),
            Duration::from_millis(3),
        ));
        let config = AnalysisConfig::default();
        match process_chunk(&gw, 1, "block", "gout", &config).await {
            ChunkOutcome::Classified {
                classification,
                usage,
                ..
            } => {
                assert_eq!(classification.irrelevant()[0].name(), "Ibuprofen");
                assert_eq!(usage, TokenUsage::new(100, 20));
            }
            other => panic!("expected classification, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_gateway_times_out() {
        let config = AnalysisConfig::builder()
            .request_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        match process_chunk(&Stalled, 3, "block", "gout", &config).await {
            ChunkOutcome::Failed(result) => {
                assert_eq!(result.status, 0);
                assert_eq!(
                    result.error,
                    Some(ChunkError::Timeout { chunk: 3, secs: 2 })
                );
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
