//! Result types reported by a run.
//!
//! Everything here is `Serialize` so the CLI can dump a run as JSON for
//! scripting (`hw2tex --json`).

use crate::config::ProcessMode;
use crate::error::AttemptError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a page ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    /// A page document was written and compiled.
    Accepted,
    /// The operator chose not to process the page.
    Skipped,
    /// The operator gave up after repeated failures.
    Abandoned { last_error: AttemptError },
    /// The source photo could not be read or cropped.
    Unreadable { detail: String },
}

/// Per-page outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageReport {
    /// 1-indexed page number.
    pub ordinal: usize,
    pub source: PathBuf,
    /// `None` for skipped pages.
    pub mode: Option<ProcessMode>,
    #[serde(flatten)]
    pub status: PageStatus,
    /// Transcription requests issued for this page, fragments included.
    pub attempts: u32,
    /// The page document, when accepted.
    pub document: Option<PathBuf>,
}

/// Outcome of a whole run over one assignment folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub assignment: String,
    pub total_pages: usize,
    pub pages: Vec<PageReport>,
    pub consolidated_tex: PathBuf,
    pub consolidated_pdf: PathBuf,
    /// Page documents merged into the consolidated file, in order.
    ///
    /// Includes documents left over from earlier runs in the same folder.
    pub merged_documents: usize,
    pub consolidated_compiled: bool,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn accepted(&self) -> usize {
        self.count(|s| matches!(s, PageStatus::Accepted))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, PageStatus::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, PageStatus::Abandoned { .. } | PageStatus::Unreadable { .. }))
    }

    fn count(&self, pred: impl Fn(&PageStatus) -> bool) -> usize {
        self.pages.iter().filter(|p| pred(&p.status)).count()
    }
}
