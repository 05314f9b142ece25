//! Progress-callback trait for per-chunk analysis events.
//!
//! Inject an [`Arc<dyn AnalysisProgressCallback>`] via
//! [`crate::config::AnalysisConfigBuilder::progress_callback`] to receive
//! events as the analyser walks the chunks. The CLI forwards them to an
//! indicatif progress bar; a web surface could forward them to a socket.
//!
//! # Example
//!
//! ```rust
//! use med_relevance::{AnalysisConfig, AnalysisProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl AnalysisProgressCallback for Counter {
//!     fn on_chunk_complete(&self, _idx: usize, _total: usize, _rel: usize, _irr: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = AnalysisConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the analyser as it processes each chunk.
///
/// Chunks are processed one at a time, so events for one analysis never
/// overlap. Implementations are still `Send + Sync` because the same
/// callback may be shared by concurrent analyses of different documents.
/// All methods default to no-ops.
pub trait AnalysisProgressCallback: Send + Sync {
    /// Called once, after chunking and before the first gateway call.
    fn on_analysis_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called just before the gateway call for a chunk (1-based index).
    fn on_chunk_start(&self, chunk_idx: usize, total_chunks: usize) {
        let _ = (chunk_idx, total_chunks);
    }

    /// Called when a chunk's gateway call succeeded.
    ///
    /// Counts are the entries parsed from this chunk, before deduplication
    /// against earlier chunks.
    fn on_chunk_complete(
        &self,
        chunk_idx: usize,
        total_chunks: usize,
        relevant: usize,
        irrelevant: usize,
    ) {
        let _ = (chunk_idx, total_chunks, relevant, irrelevant);
    }

    /// Called when a chunk's gateway call failed.
    fn on_chunk_error(&self, chunk_idx: usize, total_chunks: usize, error: &str) {
        let _ = (chunk_idx, total_chunks, error);
    }

    /// Called once after every chunk has been attempted.
    fn on_analysis_complete(&self, total_chunks: usize, success_count: usize) {
        let _ = (total_chunks, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AnalysisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::AnalysisConfig`].
pub type ProgressCallback = Arc<dyn AnalysisProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        relevant_seen: AtomicUsize,
    }

    impl AnalysisProgressCallback for TrackingCallback {
        fn on_chunk_start(&self, _idx: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_complete(&self, _idx: usize, _total: usize, relevant: usize, _irr: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.relevant_seen.fetch_add(relevant, Ordering::SeqCst);
        }

        fn on_chunk_error(&self, _idx: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_analysis_start(3);
        cb.on_chunk_start(1, 3);
        cb.on_chunk_complete(1, 3, 2, 1);
        cb.on_chunk_error(2, 3, "status 500");
        cb.on_analysis_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_chunk_start(1, 2);
        tracker.on_chunk_complete(1, 2, 3, 0);
        tracker.on_chunk_start(2, 2);
        tracker.on_chunk_error(2, 2, "timeout");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.relevant_seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_analysis_start(10);
        cb.on_chunk_start(1, 10);
    }
}
