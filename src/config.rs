//! Configuration types for document analysis.
//!
//! All analysis behaviour is controlled through [`AnalysisConfig`], built
//! via its [`AnalysisConfigBuilder`]. A config is created once at start-up
//! and never mutated afterwards; the [`crate::analyse::Analyzer`] takes it
//! by value at construction.

use crate::error::AnalysisError;
use crate::gateway::Gateway;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

/// Default number of normalized lines per chunk.
pub const DEFAULT_CHUNK_LINES: usize = 50;

/// Default pause between two gateway calls.
pub const DEFAULT_RATE_DELAY: Duration = Duration::from_millis(1250);

/// Default per-call gateway timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for one or more document analyses.
///
/// # Example
/// ```rust
/// use med_relevance::AnalysisConfig;
/// use std::time::Duration;
///
/// let config = AnalysisConfig::builder()
///     .chunk_lines(40)
///     .rate_delay(Duration::from_millis(500))
///     .model("gemini-1.5-flash-latest")
///     .build()
///     .unwrap();
/// assert_eq!(config.chunk_lines, 40);
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Normalized lines per chunk sent to the model. Must be > 0. Default: 50.
    pub chunk_lines: usize,

    /// Pause after each chunk before the next gateway call. Default: 1.25 s.
    ///
    /// Applied after failed and empty chunks too, so the collaborator's rate
    /// limit holds no matter how a chunk ended.
    pub rate_delay: Duration,

    /// Per-call gateway timeout. Default: 60 s.
    pub request_timeout: Duration,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "ollama", "gemini-rest").
    pub provider_name: Option<String>,

    /// Pre-constructed edgequake-llm provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed gateway. Takes precedence over every other source.
    pub gateway: Option<Arc<dyn Gateway>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate per chunk. Default: 512.
    pub max_tokens: usize,

    /// Prompt template override; must contain `{block}`, may contain `{disease}`.
    pub prompt_template: Option<String>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional per-chunk progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            chunk_lines: DEFAULT_CHUNK_LINES,
            rate_delay: DEFAULT_RATE_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            model: None,
            provider_name: None,
            provider: None,
            gateway: None,
            temperature: 0.2,
            max_tokens: 512,
            prompt_template: None,
            password: None,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("chunk_lines", &self.chunk_lines)
            .field("rate_delay", &self.rate_delay)
            .field("request_timeout", &self.request_timeout)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("gateway", &self.gateway.as_ref().map(|_| "<dyn Gateway>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("prompt_template", &self.prompt_template.is_some())
            .field("download_timeout_secs", &self.download_timeout_secs)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Chunk size as a non-zero count, validating `chunk_lines`.
    pub fn chunk_size(&self) -> Result<NonZeroUsize, AnalysisError> {
        NonZeroUsize::new(self.chunk_lines).ok_or_else(|| {
            AnalysisError::InvalidConfig("chunk_lines must be ≥ 1".into())
        })
    }
}

/// Builder for [`AnalysisConfig`].
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl fmt::Debug for AnalysisConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl AnalysisConfigBuilder {
    pub fn chunk_lines(mut self, n: usize) -> Self {
        self.config.chunk_lines = n;
        self
    }

    pub fn rate_delay(mut self, delay: Duration) -> Self {
        self.config.rate_delay = delay;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout.max(Duration::from_secs(1));
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn Gateway>) -> Self {
        self.config.gateway = Some(gateway);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n.max(1);
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalysisError> {
        let c = &self.config;
        if c.chunk_lines == 0 {
            return Err(AnalysisError::InvalidConfig(
                "chunk_lines must be ≥ 1".into(),
            ));
        }
        if let Some(ref template) = c.prompt_template {
            if !template.contains("{block}") {
                return Err(AnalysisError::InvalidConfig(
                    "prompt template must contain the {block} placeholder".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = AnalysisConfig::default();
        assert_eq!(c.chunk_lines, 50);
        assert_eq!(c.rate_delay, Duration::from_millis(1250));
        assert_eq!(c.request_timeout, Duration::from_secs(60));
        assert!(c.gateway.is_none());
    }

    #[test]
    fn zero_chunk_lines_is_rejected() {
        let err = AnalysisConfig::builder().chunk_lines(0).build().unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidConfig(_)));
    }

    #[test]
    fn template_without_block_is_rejected() {
        let err = AnalysisConfig::builder()
            .prompt_template("classify for {disease}")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("{block}"));
    }

    #[test]
    fn temperature_is_clamped() {
        let c = AnalysisConfig::builder().temperature(9.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn chunk_size_is_non_zero() {
        let c = AnalysisConfig::builder().chunk_lines(7).build().unwrap();
        assert_eq!(c.chunk_size().unwrap().get(), 7);
    }
}
