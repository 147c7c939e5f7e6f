//! Operator decisions, injected into the pipeline.
//!
//! The pipeline never reads a terminal. Every point where a human used to be
//! asked a question is a method on [`Operator`], so the attempt loop can be
//! driven by a scripted operator in tests and by a terminal prompt in the
//! `hw2tex` binary.

use crate::config::ProcessMode;
use crate::error::AttemptError;
use crate::sequence::Page;
use std::path::Path;

/// What to do with a page before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    Process(ProcessMode),
    Skip,
}

/// Verdict on a compiled page or fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    Accept,
    /// Discard the result and transcribe the same segment again.
    Rerun,
}

/// Supplies the decisions the pipeline cannot make itself.
pub trait Operator: Send {
    /// Decide whether and how to process `page`.
    fn page_action(&mut self, page: &Page, total_pages: usize) -> PageAction;

    /// Review a compiled fragment-mode result. Whole-page mode accepts the
    /// first compiled result without asking.
    ///
    /// `label` is `"top"`, `"bottom"` or `"combined"`; `compiled` is the
    /// rendered artifact.
    fn review(&mut self, page: &Page, label: &str, compiled: &Path) -> Review;

    /// Called after `failures` consecutive failed attempts reach the
    /// configured bound. Returning `true` resets the count and keeps trying;
    /// `false` abandons the page.
    fn keep_trying(&mut self, page: &Page, label: &str, failures: u32, last: &AttemptError) -> bool;
}

/// Unattended operator: processes every page in one mode, accepts every
/// compiled result, and gives up once the attempt bound is reached.
#[derive(Debug, Clone, Copy)]
pub struct AutoOperator {
    pub mode: ProcessMode,
}

impl AutoOperator {
    pub fn new(mode: ProcessMode) -> Self {
        Self { mode }
    }
}

impl Operator for AutoOperator {
    fn page_action(&mut self, _page: &Page, _total_pages: usize) -> PageAction {
        PageAction::Process(self.mode)
    }

    fn review(&mut self, _page: &Page, _label: &str, _compiled: &Path) -> Review {
        Review::Accept
    }

    fn keep_trying(&mut self, _page: &Page, _label: &str, _failures: u32, _last: &AttemptError) -> bool {
        false
    }
}
