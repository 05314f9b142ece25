//! Error types for the med-relevance library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AnalysisError`] — **Fatal**: the analysis cannot start at all (empty
//!   upload, no extractable text, unreadable PDF, gateway not configured).
//!   Returned as `Err(AnalysisError)` from the top-level `analyse*`
//!   functions, always before the first gateway call.
//!
//! * [`ChunkError`] — **Non-fatal**: a single chunk's gateway call failed.
//!   Stored on the chunk's [`crate::report::ChunkResult`] so the report
//!   still aggregates every chunk that did succeed.
//!
//! Malformed model replies are not errors at all: the response parser
//! degrades to an empty classification for that chunk.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the med-relevance library.
#[derive(Debug, Error)]
pub enum AnalysisError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The uploaded document has zero bytes.
    #[error("Empty document: no bytes were supplied")]
    EmptyDocument,

    /// The document was read but contains no text or tables.
    #[error("No extractable text in document")]
    NoExtractableText,

    /// The normalized text produced no chunks to analyse.
    #[error("No text chunks generated from document")]
    NoChunks,

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes do not start with the `%PDF` magic.
    #[error("Input '{source_name}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { source_name: String, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF is corrupt: {detail}")]
    CorruptPdf { detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF")]
    WrongPassword,

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library in the working directory."
    )]
    PdfiumBindingFailed(String),

    // ── Gateway errors ────────────────────────────────────────────────────
    /// No language-model gateway could be built (missing API key etc.).
    #[error("LLM gateway '{provider}' is not configured.\n{hint}")]
    GatewayNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output report file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// True for the errors that mean "the document had nothing to analyse".
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::EmptyDocument
                | AnalysisError::NoExtractableText
                | AnalysisError::NoChunks
                | AnalysisError::NotAPdf { .. }
        )
    }
}

/// A non-fatal error for a single chunk.
///
/// Recorded on the chunk's result entry; the analysis continues with the
/// next chunk.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ChunkError {
    /// The gateway answered with a non-OK status or the transport failed.
    #[error("Chunk {chunk}: gateway call failed (status {status}): {detail}")]
    GatewayFailed {
        chunk: usize,
        status: u16,
        detail: String,
    },

    /// The gateway did not answer within the request timeout.
    #[error("Chunk {chunk}: gateway call timed out after {secs}s")]
    Timeout { chunk: usize, secs: u64 },
}
