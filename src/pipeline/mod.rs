//! Pipeline stages for PDF-to-classification analysis.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without the others (and without a PDF or a model for everything
//! after extraction).
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ normalize ──▶ chunk ──▶ llm ──▶ parse
//! (path/URL) (pdfium)   (text+tables) (N lines) (gateway) (JSON recovery)
//!              │
//!              └─ tables (geometric detection over text boxes)
//! ```
//!
//! 1. [`input`]     — resolve a path or URL to PDF bytes, check the `%PDF` magic
//! 2. [`extract`]   — page text and text boxes via pdfium; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`tables`]    — rebuild table rows and columns from positioned text
//! 4. [`normalize`] — one deterministic string: page text, then each table
//!    under a `# Page p – Table t` header
//! 5. [`chunk`]     — fixed-size, non-overlapping line blocks
//! 6. [`llm`]       — render the prompt and call the gateway under a timeout;
//!    the only stage with network I/O
//! 7. [`parse`]     — tolerant recovery of `{relevant, irrelevant}` from the reply

pub mod chunk;
pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
pub mod parse;
pub mod tables;
