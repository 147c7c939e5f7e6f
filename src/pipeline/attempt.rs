//! Attempt loop: drive one page (or fragment) through
//! request → validate → accept / retry.
//!
//! ```text
//!            ┌──────────────────────────────────────────┐
//!            ▼                                          │
//!      Requesting ──▶ Validating ──▶ Accepted ──(rerun)─┤
//!                         │              │              │
//!                         ▼              ▼ (done)       │
//!                      Retrying ────────────────────────┘
//! ```
//!
//! * `Validating` extracts the body; with a body it writes the document to a
//!   scratch name and compiles it. Compiled → `Accepted`. Anything else →
//!   `Retrying`, and the scratch files are removed.
//! * Only an accepted document is moved to its page-document name, so the
//!   consolidator never sees a failed or rejected attempt.
//! * `Retrying` backs off exponentially. Once `max_attempts` consecutive
//!   failures pile up the operator decides whether to keep going.
//! * `Accepted` exits immediately in whole-page mode; in fragment mode the
//!   operator reviews the compiled result and may force a rerun.

use crate::config::RunConfig;
use crate::error::{AttemptError, Hw2TexError};
use crate::operator::{Operator, Review};
use crate::pipeline::document::{attempt_paths, build, discard, promote, PageDocument};
use crate::pipeline::postprocess::clean_body;
use crate::pipeline::segment::Segment;
use crate::pipeline::transcribe::{transcribe, validate, Outcome, VisionBackend};
use crate::prompts::PromptKind;
use crate::sequence::Page;
use crate::tools::{Compiler, Viewer};
use std::path::{Path, PathBuf};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// States of the loop.
#[derive(Debug)]
pub enum AttemptState {
    Requesting,
    Validating(Outcome),
    Retrying(AttemptError),
    /// `document` still sits at its scratch paths.
    Accepted { body: String, document: PageDocument },
}

/// What one loop transcribes and where the result goes.
#[derive(Debug)]
pub struct Target<'a> {
    pub page: &'a Page,
    pub segment: &'a Segment,
    pub prompt: PromptKind,
    pub context: Option<&'a str>,
    pub preamble: &'a str,
    pub tex_path: PathBuf,
    pub pdf_path: PathBuf,
    /// `"page"`, `"top"`, `"bottom"` or `"combined"`.
    pub label: &'static str,
    /// Ask the operator to review each compiled result.
    pub review: bool,
}

/// Terminal result of a loop.
#[derive(Debug)]
pub enum LoopResult {
    Accepted {
        body: String,
        document: PageDocument,
        attempts: u32,
    },
    Abandoned {
        attempts: u32,
        last_error: AttemptError,
    },
}

impl LoopResult {
    pub fn attempts(&self) -> u32 {
        match self {
            LoopResult::Accepted { attempts, .. } | LoopResult::Abandoned { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Collaborators shared by every loop of a run.
pub struct AttemptLoop<'a> {
    pub backend: &'a dyn VisionBackend,
    pub compiler: &'a dyn Compiler,
    pub viewer: &'a dyn Viewer,
    pub config: &'a RunConfig,
}

impl AttemptLoop<'_> {
    /// Run the state machine for `target` until it is accepted or the
    /// operator abandons it.
    ///
    /// Only a failure to write an artifact is returned as `Err`.
    pub async fn run(
        &self,
        target: &Target<'_>,
        operator: &mut dyn Operator,
    ) -> Result<LoopResult, Hw2TexError> {
        let ordinal = target.page.ordinal;
        let cb = self.config.progress_callback.as_ref();
        let mut attempts = 0u32;
        let mut failures = 0u32;
        let mut state = AttemptState::Requesting;
        let (scratch_tex, scratch_pdf) = attempt_paths(&target.tex_path);

        loop {
            state = match state {
                AttemptState::Requesting => {
                    attempts += 1;
                    if let Some(cb) = cb {
                        cb.on_attempt_start(ordinal, target.label, attempts);
                    }
                    debug!("Page {} ({}): attempt {}", ordinal, target.label, attempts);
                    let outcome = transcribe(
                        self.backend,
                        target.segment,
                        target.prompt,
                        target.context,
                        target.preamble,
                    )
                    .await;
                    AttemptState::Validating(outcome)
                }

                AttemptState::Validating(outcome) => match validate(outcome) {
                    Err(e) => AttemptState::Retrying(e),
                    Ok(body) => {
                        let body = clean_body(&body);
                        let built = build(
                            &scratch_tex,
                            &scratch_pdf,
                            ordinal,
                            target.preamble,
                            &body,
                            self.compiler,
                        )
                        .await?;
                        match built.compile_error {
                            Some(detail) => {
                                discard(&built.document);
                                AttemptState::Retrying(AttemptError::CompileFailure { detail })
                            }
                            None => AttemptState::Accepted {
                                body,
                                document: built.document,
                            },
                        }
                    }
                },

                AttemptState::Retrying(error) => {
                    failures += 1;
                    warn!(
                        "Page {} ({}): attempt {} failed — {}",
                        ordinal, target.label, attempts, error
                    );
                    if let Some(cb) = cb {
                        cb.on_attempt_failed(ordinal, target.label, attempts, &error);
                    }

                    if let Some(max) = self.config.max_attempts {
                        if failures >= max {
                            if !operator.keep_trying(target.page, target.label, failures, &error) {
                                info!(
                                    "Page {} ({}): abandoned after {} attempts",
                                    ordinal, target.label, attempts
                                );
                                return Ok(LoopResult::Abandoned {
                                    attempts,
                                    last_error: error,
                                });
                            }
                            failures = 0;
                        }
                    }

                    let backoff = self.config.backoff_ms(failures);
                    if backoff > 0 {
                        sleep(Duration::from_millis(backoff)).await;
                    }
                    AttemptState::Requesting
                }

                AttemptState::Accepted { body, document } => {
                    info!(
                        "Page {} ({}): compiled after {} attempt(s)",
                        ordinal, target.label, attempts
                    );

                    if !target.review {
                        let document = promote(&document, &target.tex_path, &target.pdf_path)?;
                        self.show(&document.pdf_path).await;
                        return Ok(LoopResult::Accepted {
                            body,
                            document,
                            attempts,
                        });
                    }

                    self.show(&document.pdf_path).await;
                    match operator.review(target.page, target.label, &document.pdf_path) {
                        Review::Accept => {
                            let document =
                                promote(&document, &target.tex_path, &target.pdf_path)?;
                            return Ok(LoopResult::Accepted {
                                body,
                                document,
                                attempts,
                            });
                        }
                        Review::Rerun => {
                            discard(&document);
                            failures = 0;
                            AttemptState::Requesting
                        }
                    }
                }
            };
        }
    }

    /// Open a compiled document when asked to; a viewer failure only logs.
    async fn show(&self, pdf_path: &Path) {
        if !self.config.view_documents {
            return;
        }
        if let Err(e) = self.viewer.open(pdf_path).await {
            warn!("Could not show {}: {}", pdf_path.display(), e);
        }
    }
}
