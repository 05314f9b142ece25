//! # med-relevance
//!
//! Read a PDF, ask a language model which of the medicines it mentions are
//! relevant to a disease, and merge the answers into one deduplicated report.
//!
//! ## Why chunked classification?
//!
//! Medicine lists in clinical documents run to hundreds of lines, often split
//! across prose and tables. Sending the whole document in one prompt loses
//! entries and blows past output limits. Instead the text is normalized,
//! cut into fixed-size line blocks, classified block by block, and the
//! per-block verdicts are aggregated with deterministic dedup and ordering
//! rules. Model replies are treated as untrusted text: a tolerant parser
//! recovers what it can and never fails the run.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Extract    page text + text boxes via pdfium (spawn_blocking)
//!  ├─ 3. Normalize  text, then detected tables as tab-separated rows
//!  ├─ 4. Chunk      N significant lines per block (default 50)
//!  ├─ 5. Classify   one gateway call per block, rate-limited, sequential
//!  ├─ 6. Parse      fences → braces → lenient JSON → heuristic sections
//!  └─ 7. Aggregate  first-write-wins per category, sorted by name
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use med_relevance::{analyse, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = AnalysisConfig::default();
//!     let report = analyse("prescriptions.pdf", "Type 2 Diabetes", &config).await?;
//!     for entry in &report.relevant {
//!         println!("{}: {}", entry.name(), entry.explanation());
//!     }
//!     eprintln!("tokens: {} in / {} out",
//!         report.summary.tokens_in,
//!         report.summary.tokens_out);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `medrel` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! med-relevance = { version = "0.1", default-features = false }
//! ```
//!
//! ## Gateways
//!
//! | Provider name | Backend | Key |
//! |---------------|---------|-----|
//! | `gemini-rest` | direct Gemini `generateContent` | `GEMINI_API_KEY` |
//! | `openai`, `anthropic`, `ollama`, `lmstudio`, … | `edgequake-llm` provider | provider-specific |
//! | *(none)*      | auto-detected from the environment | any of the above |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyse;
pub mod config;
pub mod error;
pub mod gateway;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyse::{
    analyse, analyse_bytes, analyse_sync, analyse_to_file, inspect_text, resolve_gateway,
    write_report, Analyzer,
};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalysisError, ChunkError};
pub use gateway::{Gateway, GatewayReply, GeminiGateway, ProviderGateway};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use report::{
    ChunkResult, ClassificationSet, MedicineEntry, Report, Summary, TokenUsage,
};
