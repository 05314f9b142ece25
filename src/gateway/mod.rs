//! Language-model gateway: send one prompt, get one reply.
//!
//! The analyser never talks to a model API directly. It hands each rendered
//! prompt to a [`Gateway`] and reads back a [`GatewayReply`]. Two backends
//! ship with the crate:
//!
//! * [`ProviderGateway`] — any `edgequake-llm` provider (OpenAI, Anthropic,
//!   Ollama, LM Studio, …); usage comes from the chat response.
//! * [`GeminiGateway`] — direct `generateContent` REST calls; candidate text
//!   parts are decoded up front into a pre-parsed JSON object.
//!
//! ## Why fold failures into the reply?
//!
//! A failed call is an ordinary outcome for the aggregator: it is recorded
//! on the chunk's result and the run continues. Returning a reply with
//! `ok = false` (status 0 for transport failures) keeps that path free of
//! error plumbing and lets test doubles script failures as plain data.

pub mod gemini;
pub mod provider;

pub use gemini::GeminiGateway;
pub use provider::ProviderGateway;

use crate::report::TokenUsage;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Outcome of one gateway call.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply {
    /// True when the model answered successfully.
    pub ok: bool,
    /// HTTP-like status; 0 when no status was ever received.
    pub status: u16,
    /// JSON the backend already decoded from the reply, if any.
    pub parsed: Option<Value>,
    /// Raw reply text on success, error body or message on failure.
    pub text: String,
    pub usage: TokenUsage,
    pub elapsed: Duration,
}

impl GatewayReply {
    /// A successful reply carrying raw model text.
    pub fn success(text: impl Into<String>, usage: TokenUsage, elapsed: Duration) -> Self {
        Self {
            ok: true,
            status: 200,
            parsed: None,
            text: text.into(),
            usage,
            elapsed,
        }
    }

    /// A failed reply. Failures never carry usage.
    pub fn failure(status: u16, text: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            ok: false,
            status,
            parsed: None,
            text: text.into(),
            usage: TokenUsage::default(),
            elapsed,
        }
    }

    pub fn with_parsed(mut self, parsed: Value) -> Self {
        self.parsed = Some(parsed);
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// A model endpoint that classifies one prompt at a time.
///
/// Implementations must be shareable across concurrent analyses; the
/// analyser itself issues calls strictly one after another.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send(&self, prompt: &str) -> GatewayReply;

    /// Short label for logs.
    fn name(&self) -> &str {
        "gateway"
    }
}
