//! Progress-callback trait for per-page and per-attempt events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::RunConfigBuilder::progress_callback`] to receive events
//! as the pipeline walks the pages of an assignment.
//!
//! # Example
//!
//! ```rust
//! use handwrite2tex::{RunConfig, RunProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     accepted: AtomicUsize,
//! }
//!
//! impl RunProgressCallback for CountingCallback {
//!     fn on_page_accepted(&self, ordinal: usize, total_pages: usize, attempts: u32) {
//!         self.accepted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Page {}/{} accepted after {} attempts", ordinal, total_pages, attempts);
//!     }
//! }
//!
//! let config = RunConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { accepted: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::AttemptError;
use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Pages are processed one at a time, so events never
/// arrive concurrently, but the trait is `Send + Sync` so a callback can be
/// shared with other tasks.
pub trait RunProgressCallback: Send + Sync {
    /// Called once after the assignment's images have been sequenced.
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called just before a transcription request is sent.
    ///
    /// # Arguments
    /// * `ordinal` — 1-indexed page number
    /// * `label`   — what is being transcribed (`"page"`, `"top"`, `"bottom"`, `"combined"`)
    /// * `attempt` — 1-indexed attempt number for this page/fragment
    fn on_attempt_start(&self, ordinal: usize, label: &str, attempt: u32) {
        let _ = (ordinal, label, attempt);
    }

    /// Called when an attempt ends in a retry-triggering condition.
    fn on_attempt_failed(&self, ordinal: usize, label: &str, attempt: u32, error: &AttemptError) {
        let _ = (ordinal, label, attempt, error);
    }

    /// Called when a page document was accepted.
    fn on_page_accepted(&self, ordinal: usize, total_pages: usize, attempts: u32) {
        let _ = (ordinal, total_pages, attempts);
    }

    /// Called when the operator skipped a page.
    fn on_page_skipped(&self, ordinal: usize, total_pages: usize) {
        let _ = (ordinal, total_pages);
    }

    /// Called when the operator gave up on a page.
    fn on_page_abandoned(&self, ordinal: usize, total_pages: usize, error: &str) {
        let _ = (ordinal, total_pages, error);
    }

    /// Called once after consolidation.
    ///
    /// # Arguments
    /// * `accepted`  — pages whose document made it into the consolidated output
    /// * `compiled`  — whether the consolidated document compiled
    fn on_run_complete(&self, accepted: usize, compiled: bool) {
        let _ = (accepted, compiled);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RunConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;
