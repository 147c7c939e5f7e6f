//! Run entry points: transcribe every page of an assignment folder, then
//! consolidate.
//!
//! Pages are handled strictly one at a time, in filename order. Each page
//! goes through the operator's page decision, then one attempt loop (whole
//! mode) or three (fragment mode: top, bottom, combined). Consolidation runs
//! at the end over every page document in the output folder, including ones
//! accepted in earlier runs.

use crate::config::{ProcessMode, RunConfig};
use crate::error::Hw2TexError;
use crate::operator::{Operator, PageAction};
use crate::output::{PageReport, PageStatus, RunSummary};
use crate::pipeline::attempt::{AttemptLoop, LoopResult, Target};
use crate::pipeline::consolidate::{consolidate, ConsolidatedDocument};
use crate::pipeline::document::{artifact_paths, preamble};
use crate::pipeline::segment::{load_segments, Segment, SegmentKind};
use crate::pipeline::transcribe::{DummyBackend, VisionBackend};
use crate::prompts::{fragment_combination_context, PromptKind};
use crate::sequence::{number_pages, sequence_folder, FileKind, Page};
use crate::tools::{Compiler, Viewer};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Assignment subfolders of `input_root`, sorted by name.
pub fn list_assignments(input_root: &Path) -> Result<Vec<String>, Hw2TexError> {
    let entries = std::fs::read_dir(input_root).map_err(|_| Hw2TexError::InputFolderNotFound {
        path: input_root.to_path_buf(),
    })?;

    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    names.sort();

    if names.is_empty() {
        return Err(Hw2TexError::NoSubfolders {
            path: input_root.to_path_buf(),
        });
    }
    Ok(names)
}

/// Transcribe, build and consolidate one assignment.
///
/// With `config.dummy_data` set, `backend` is replaced by a
/// [`DummyBackend`] and no request leaves the process.
///
/// # Errors
/// Returns `Err` only for fatal conditions: missing input folder, an
/// unwritable output folder or artifact. Failed pages are reported in the
/// returned [`RunSummary`].
pub async fn run_assignment(
    assignment: &str,
    config: &RunConfig,
    backend: &dyn VisionBackend,
    compiler: &dyn Compiler,
    viewer: &dyn Viewer,
    operator: &mut dyn Operator,
) -> Result<RunSummary, Hw2TexError> {
    let start = Instant::now();
    let input_dir = config.input_dir(assignment);
    let output_dir = config.output_dir(assignment);
    info!("Starting run: {}", input_dir.display());

    // ── Step 1: Sequence the page photos ─────────────────────────────────
    let pages = number_pages(sequence_folder(&input_dir, FileKind::Image)?);
    let total_pages = pages.len();
    info!("{} page(s) found", total_pages);

    // ── Step 2: Prepare the output folder ────────────────────────────────
    std::fs::create_dir_all(&output_dir).map_err(|e| Hw2TexError::OutputWriteFailed {
        path: output_dir.clone(),
        source: e,
    })?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total_pages);
    }

    // ── Step 3: Pages, one at a time ─────────────────────────────────────
    let dummy = DummyBackend::default();
    let backend: &dyn VisionBackend = if config.dummy_data {
        info!("Dummy data: {} will not be called", backend.name());
        &dummy
    } else {
        backend
    };
    let attempt_loop = AttemptLoop {
        backend,
        compiler,
        viewer,
        config,
    };
    let mut reports = Vec::with_capacity(total_pages);

    for page in &pages {
        if config.show_images {
            if let Err(e) = viewer.open(&page.image.path).await {
                warn!("Could not show {}: {}", page.image.path.display(), e);
            }
        }

        let report = match operator.page_action(page, total_pages) {
            PageAction::Skip => {
                info!("Page {}: skipped", page.ordinal);
                PageReport {
                    ordinal: page.ordinal,
                    source: page.image.path.clone(),
                    mode: None,
                    status: PageStatus::Skipped,
                    attempts: 0,
                    document: None,
                }
            }
            PageAction::Process(mode) => {
                process_page(&attempt_loop, page, mode, &output_dir, operator).await?
            }
        };

        if let Some(ref cb) = config.progress_callback {
            match &report.status {
                PageStatus::Accepted => cb.on_page_accepted(page.ordinal, total_pages, report.attempts),
                PageStatus::Skipped => cb.on_page_skipped(page.ordinal, total_pages),
                PageStatus::Abandoned { last_error } => {
                    cb.on_page_abandoned(page.ordinal, total_pages, &last_error.to_string())
                }
                PageStatus::Unreadable { detail } => {
                    cb.on_page_abandoned(page.ordinal, total_pages, detail)
                }
            }
        }
        reports.push(report);
    }

    // ── Step 4: Consolidate ──────────────────────────────────────────────
    let merged = consolidate(
        &output_dir,
        config.homework_number,
        &config.title_block,
        compiler,
    )
    .await?;

    let summary = summarise(assignment, total_pages, reports, merged, start);
    info!(
        "Run complete: {}/{} pages accepted, {}ms",
        summary.accepted(),
        total_pages,
        summary.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(summary.accepted(), summary.consolidated_compiled);
    }
    Ok(summary)
}

/// Re-run only the consolidation step over an existing output folder.
pub async fn consolidate_only(
    assignment: &str,
    config: &RunConfig,
    compiler: &dyn Compiler,
) -> Result<ConsolidatedDocument, Hw2TexError> {
    let output_dir = config.output_dir(assignment);
    if !output_dir.is_dir() {
        return Err(Hw2TexError::InputFolderNotFound { path: output_dir });
    }
    consolidate(
        &output_dir,
        config.homework_number,
        &config.title_block,
        compiler,
    )
    .await
}

fn summarise(
    assignment: &str,
    total_pages: usize,
    pages: Vec<PageReport>,
    merged: ConsolidatedDocument,
    start: Instant,
) -> RunSummary {
    RunSummary {
        assignment: assignment.to_string(),
        total_pages,
        pages,
        merged_documents: merged.sources.len(),
        consolidated_tex: merged.tex_path,
        consolidated_pdf: merged.pdf_path,
        consolidated_compiled: merged.compiled,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

/// Drive one page in the chosen mode.
async fn process_page(
    attempt_loop: &AttemptLoop<'_>,
    page: &Page,
    mode: ProcessMode,
    output_dir: &Path,
    operator: &mut dyn Operator,
) -> Result<PageReport, Hw2TexError> {
    let config = attempt_loop.config;
    let pre = preamble(page.ordinal, config.homework_number, &config.title_block);
    let mut report = PageReport {
        ordinal: page.ordinal,
        source: page.image.path.clone(),
        mode: Some(mode),
        status: PageStatus::Accepted,
        attempts: 0,
        document: None,
    };

    let segments = match load_segments(&page.image.path, mode) {
        Ok(s) => s,
        Err(e) => {
            warn!("Page {}: {}", page.ordinal, e);
            report.status = PageStatus::Unreadable {
                detail: e.to_string(),
            };
            return Ok(report);
        }
    };

    // Fragment mode: transcribe top and bottom first, collecting bodies.
    let mut fragment_bodies = Vec::new();
    if mode == ProcessMode::Fragment {
        for segment in &segments {
            let label = segment.kind.label();
            let (tex_path, pdf_path) = artifact_paths(output_dir, &page.image.stem, Some(label));
            let target = Target {
                page,
                segment,
                prompt: PromptKind::Fragment,
                context: None,
                preamble: &pre,
                tex_path,
                pdf_path,
                label,
                review: true,
            };
            let result = attempt_loop.run(&target, operator).await?;
            report.attempts += result.attempts();
            match result {
                LoopResult::Accepted { body, .. } => fragment_bodies.push(body),
                LoopResult::Abandoned { last_error, .. } => {
                    report.status = PageStatus::Abandoned { last_error };
                    return Ok(report);
                }
            }
        }
    }

    // Final pass over the whole page writes the real page document.
    let (whole, prompt, context, label, review) = match mode {
        ProcessMode::Whole => (segments.into_iter().next(), PromptKind::SinglePage, None, "page", false),
        ProcessMode::Fragment => {
            let whole = match load_segments(&page.image.path, ProcessMode::Whole) {
                Ok(s) => s.into_iter().next(),
                Err(e) => {
                    report.status = PageStatus::Unreadable {
                        detail: e.to_string(),
                    };
                    return Ok(report);
                }
            };
            let ctx = fragment_combination_context(
                fragment_bodies.first().map(String::as_str).unwrap_or_default(),
                fragment_bodies.get(1).map(String::as_str).unwrap_or_default(),
            );
            (whole, PromptKind::FragmentCombination, Some(ctx), "combined", true)
        }
    };
    let whole: Segment = whole.ok_or_else(|| {
        Hw2TexError::Internal(format!("no whole-page segment for page {}", page.ordinal))
    })?;
    debug_assert_eq!(whole.kind, SegmentKind::Whole);

    let (tex_path, pdf_path) = artifact_paths(output_dir, &page.image.stem, None);
    let target = Target {
        page,
        segment: &whole,
        prompt,
        context: context.as_deref(),
        preamble: &pre,
        tex_path,
        pdf_path,
        label,
        review,
    };
    let result = attempt_loop.run(&target, operator).await?;
    report.attempts += result.attempts();
    match result {
        LoopResult::Accepted { document, .. } => {
            report.document = Some(document.tex_path);
        }
        LoopResult::Abandoned { last_error, .. } => {
            report.status = PageStatus::Abandoned { last_error };
        }
    }
    Ok(report)
}
