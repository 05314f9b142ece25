//! Document analysis entry points and the chunk aggregator.
//!
//! ## Why an `Analyzer` value?
//!
//! Aggregation state (the two first-write-wins maps, token counters, the
//! per-chunk results) lives on the stack of one [`Analyzer::run`] call. The
//! `Analyzer` itself only holds the immutable config and a shared gateway
//! handle, so one instance can serve any number of concurrent analyses
//! without them seeing each other's entries.
//!
//! The free functions ([`analyse`], [`analyse_bytes`], [`analyse_to_file`],
//! [`analyse_sync`]) resolve a gateway from the config and build a
//! throwaway `Analyzer`; use the type directly to inject a gateway.

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::gateway::{Gateway, GeminiGateway, ProviderGateway};
use crate::pipeline::chunk::{chunk_count, chunk_lines};
use crate::pipeline::extract::extract_pages;
use crate::pipeline::input::{self, check_pdf_bytes};
use crate::pipeline::llm::{process_chunk, ChunkOutcome};
use crate::pipeline::normalize::{normalize_pages, significant_lines, PageContent};
use crate::report::{ChunkResult, EntryMap, Report, Summary};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs analyses against one gateway with one configuration.
pub struct Analyzer {
    config: AnalysisConfig,
    gateway: Arc<dyn Gateway>,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig, gateway: Arc<dyn Gateway>) -> Self {
        Self { config, gateway }
    }

    /// Build an analyser whose gateway is resolved from the config.
    pub fn from_config(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        let gateway = resolve_gateway(&config)?;
        Ok(Self::new(config, gateway))
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyse normalized document text.
    ///
    /// # Errors
    /// [`AnalysisError::NoExtractableText`] when `text` is blank and
    /// [`AnalysisError::NoChunks`] when no chunk can be formed, both before
    /// any gateway call. Gateway failures are never errors here; they are
    /// recorded on the report.
    pub async fn analyse_text(&self, text: &str, disease: &str) -> Result<Report, AnalysisError> {
        if text.trim().is_empty() {
            return Err(AnalysisError::NoExtractableText);
        }

        let size = self.config.chunk_size()?;
        let lines = significant_lines(text);
        let total = chunk_count(lines.len(), size);
        if total == 0 {
            return Err(AnalysisError::NoChunks);
        }
        info!(
            "{} significant lines → {} chunks of up to {} lines",
            lines.len(),
            total,
            size
        );

        Ok(self.run(chunk_lines(&lines, size), total, disease).await)
    }

    /// Normalize extracted pages, then analyse the text.
    pub async fn analyse_pages(
        &self,
        pages: &[PageContent],
        disease: &str,
    ) -> Result<Report, AnalysisError> {
        let text = normalize_pages(pages);
        self.analyse_text(&text, disease).await
    }

    /// Extract, normalize and analyse in-memory PDF bytes.
    pub async fn analyse_bytes(&self, bytes: Vec<u8>, disease: &str) -> Result<Report, AnalysisError> {
        check_pdf_bytes(&bytes, "<bytes>")?;
        let pages = extract_pages(bytes, self.config.password.clone()).await?;
        self.analyse_pages(&pages, disease).await
    }

    /// Resolve a path or URL, then analyse it.
    pub async fn analyse_input(&self, input: &str, disease: &str) -> Result<Report, AnalysisError> {
        let doc = input::resolve_input(input, self.config.download_timeout_secs).await?;
        info!("Analysing {} for '{}'", doc.source_name, disease.trim());
        self.analyse_bytes(doc.bytes, disease).await
    }

    /// Process chunks strictly in order, aggregating as we go.
    async fn run(
        &self,
        chunks: impl Iterator<Item = String>,
        total: usize,
        disease: &str,
    ) -> Report {
        let run_start = Instant::now();
        let cb = self.config.progress_callback.as_ref();

        let mut relevant = EntryMap::new();
        let mut irrelevant = EntryMap::new();
        let mut results: Vec<ChunkResult> = Vec::new();
        let mut summary = Summary::default();

        if let Some(cb) = cb {
            cb.on_analysis_start(total);
        }

        for (i, block) in chunks.enumerate() {
            let idx = i + 1;
            if let Some(cb) = cb {
                cb.on_chunk_start(idx, total);
            }
            summary.calls += 1;

            match process_chunk(self.gateway.as_ref(), idx, &block, disease, &self.config).await {
                ChunkOutcome::Failed(result) => {
                    summary.failed_calls += 1;
                    if let Some(cb) = cb {
                        let detail = result
                            .error
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_default();
                        cb.on_chunk_error(idx, total, &detail);
                    }
                    results.push(result);
                }
                ChunkOutcome::Classified {
                    classification,
                    usage,
                    elapsed,
                    status,
                } => {
                    summary.tokens_in += usage.input;
                    summary.tokens_out += usage.output;
                    if let Some(cb) = cb {
                        cb.on_chunk_complete(
                            idx,
                            total,
                            classification.relevant().len(),
                            classification.irrelevant().len(),
                        );
                    }

                    if classification.is_empty() {
                        debug!("Chunk {}: nothing classified", idx);
                    } else {
                        for entry in classification.relevant() {
                            relevant.insert(entry.clone());
                        }
                        for entry in classification.irrelevant() {
                            irrelevant.insert(entry.clone());
                        }
                        results.push(ChunkResult::success(
                            idx,
                            elapsed,
                            usage,
                            &classification,
                            status,
                        ));
                    }
                }
            }

            // The delay separates calls; nothing follows the last chunk.
            if idx < total && !self.config.rate_delay.is_zero() {
                tokio::time::sleep(self.config.rate_delay).await;
            }
        }

        summary.duration_ms = run_start.elapsed().as_millis() as u64;
        let succeeded = summary.calls - summary.failed_calls;
        if let Some(cb) = cb {
            cb.on_analysis_complete(total, succeeded);
        }
        if summary.failed_calls > 0 {
            warn!(
                "{} of {} chunks failed",
                summary.failed_calls, summary.calls
            );
        }
        info!(
            "Analysis complete: {} relevant, {} irrelevant, {} calls, {} in / {} out tokens, {}ms",
            relevant.len(),
            irrelevant.len(),
            summary.calls,
            summary.tokens_in,
            summary.tokens_out,
            summary.duration_ms
        );

        Report {
            relevant: relevant.into_sorted(),
            irrelevant: irrelevant.into_sorted(),
            results,
            summary,
        }
    }
}

// ── Free-function entry points ───────────────────────────────────────────

/// Analyse a PDF file or URL for one disease.
///
/// # Returns
/// `Ok(Report)` even when some chunks failed (see `report.summary.failed_calls`).
///
/// # Errors
/// Only fatal conditions: unreadable input, not a PDF, no extractable text,
/// no chunks, or no gateway configured.
pub async fn analyse(
    input: impl AsRef<str>,
    disease: &str,
    config: &AnalysisConfig,
) -> Result<Report, AnalysisError> {
    let doc = input::resolve_input(input.as_ref(), config.download_timeout_secs).await?;
    let analyzer = Analyzer::from_config(config.clone())?;
    info!("Analysing {} for '{}'", doc.source_name, disease.trim());
    analyzer.analyse_bytes(doc.bytes, disease).await
}

/// Analyse uploaded PDF bytes. Empty uploads fail before anything else.
pub async fn analyse_bytes(
    bytes: Vec<u8>,
    disease: &str,
    config: &AnalysisConfig,
) -> Result<Report, AnalysisError> {
    check_pdf_bytes(&bytes, "<upload>")?;
    Analyzer::from_config(config.clone())?
        .analyse_bytes(bytes, disease)
        .await
}

/// Analyse and write the JSON report to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn analyse_to_file(
    input: impl AsRef<str>,
    disease: &str,
    output_path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<Summary, AnalysisError> {
    let report = analyse(input, disease, config).await?;
    write_report(&report, output_path.as_ref(), true).await?;
    Ok(report.summary)
}

/// Serialize `report` as JSON and write it atomically.
pub async fn write_report(report: &Report, path: &Path, pretty: bool) -> Result<(), AnalysisError> {
    let json = if pretty {
        serde_json::to_vec_pretty(report)
    } else {
        serde_json::to_vec(report)
    }
    .map_err(|e| AnalysisError::Internal(format!("report serialisation: {e}")))?;

    let write_err = |source| AnalysisError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

/// Synchronous wrapper around [`analyse`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyse_sync(
    input: impl AsRef<str>,
    disease: &str,
    config: &AnalysisConfig,
) -> Result<Report, AnalysisError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnalysisError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyse(input, disease, config))
}

/// Extract and normalize a document's text without calling any model.
///
/// Does not require a gateway or API key.
pub async fn inspect_text(
    input: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<String, AnalysisError> {
    let doc = input::resolve_input(input.as_ref(), config.download_timeout_secs).await?;
    let pages = extract_pages(doc.bytes, config.password.clone()).await?;
    Ok(normalize_pages(&pages))
}

// ── Gateway resolution ───────────────────────────────────────────────────

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, AnalysisError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        AnalysisError::GatewayNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the gateway, from most-specific to least-specific.
///
/// 1. **Pre-built gateway** (`config.gateway`), used as-is.
/// 2. **Pre-built provider** (`config.provider`), wrapped in a
///    [`ProviderGateway`].
/// 3. **`gemini-rest`** as `config.provider_name`: the direct REST backend,
///    keyed by `GEMINI_API_KEY`.
/// 4. **Named provider + model** (`config.provider_name`) via
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 5. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_gateway(config: &AnalysisConfig) -> Result<Arc<dyn Gateway>, AnalysisError> {
    if let Some(ref gateway) = config.gateway {
        return Ok(Arc::clone(gateway));
    }

    if let Some(ref provider) = config.provider {
        return Ok(Arc::new(ProviderGateway::from_config(
            Arc::clone(provider),
            "provider",
            config,
        )));
    }

    if let Some(ref name) = config.provider_name {
        if name.eq_ignore_ascii_case("gemini-rest") {
            return Ok(Arc::new(GeminiGateway::from_env(config)?));
        }
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let provider = create_provider(name, model)?;
        return Ok(Arc::new(ProviderGateway::from_config(provider, name.clone(), config)));
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            let provider = create_provider(&prov, &model)?;
            return Ok(Arc::new(ProviderGateway::from_config(provider, prov, config)));
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| AnalysisError::GatewayNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, GEMINI_API_KEY or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(ProviderGateway::from_config(llm_provider, "auto", config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayReply;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Counting(AtomicUsize);

    #[async_trait]
    impl Gateway for Counting {
        async fn send(&self, _prompt: &str) -> GatewayReply {
            self.0.fetch_add(1, Ordering::SeqCst);
            GatewayReply::success("{}", Default::default(), Duration::ZERO)
        }
    }

    fn analyzer(gw: Arc<Counting>) -> Analyzer {
        let config = AnalysisConfig::builder()
            .rate_delay(Duration::ZERO)
            .build()
            .unwrap();
        Analyzer::new(config, gw)
    }

    #[test]
    fn explicit_gateway_is_resolved_first() {
        let gw: Arc<dyn Gateway> = Arc::new(Counting(AtomicUsize::new(0)));
        let config = AnalysisConfig::builder()
            .gateway(Arc::clone(&gw))
            .provider_name("gemini-rest")
            .build()
            .unwrap();
        let resolved = resolve_gateway(&config).unwrap();
        assert!(Arc::ptr_eq(&resolved, &gw));
    }

    #[tokio::test]
    async fn blank_text_fails_before_any_call() {
        let gw = Arc::new(Counting(AtomicUsize::new(0)));
        let err = analyzer(Arc::clone(&gw))
            .analyse_text(" \n\t\n ", "asthma")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NoExtractableText));
        assert_eq!(gw.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_bytes_fail_before_any_call() {
        let gw = Arc::new(Counting(AtomicUsize::new(0)));
        let err = analyzer(Arc::clone(&gw))
            .analyse_bytes(Vec::new(), "asthma")
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyDocument));
        assert_eq!(gw.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_call_per_chunk() {
        let gw = Arc::new(Counting(AtomicUsize::new(0)));
        let config = AnalysisConfig::builder()
            .chunk_lines(2)
            .rate_delay(Duration::ZERO)
            .build()
            .unwrap();
        let text = "a\nb\n\nc\nd\ne";
        let report = Analyzer::new(config, Arc::clone(&gw) as Arc<dyn Gateway>)
            .analyse_text(text, "asthma")
            .await
            .unwrap();
        assert_eq!(gw.0.load(Ordering::SeqCst), 3);
        assert_eq!(report.summary.calls, 3);
        // "{}" parses to an empty set: no result entries.
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn write_report_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let report = Report {
            relevant: Vec::new(),
            irrelevant: Vec::new(),
            results: Vec::new(),
            summary: Summary::default(),
        };
        write_report(&report, &path, false).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"summary\""));
        assert!(!path.with_extension("json.tmp").exists());
    }
}
