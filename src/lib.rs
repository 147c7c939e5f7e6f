//! # handwrite2tex
//!
//! Turn photographed handwritten pages into one compiled LaTeX document
//! using a Vision Language Model (VLM).
//!
//! ## Pipeline Overview
//!
//! ```text
//! psets/<assignment>/signal-…-HHMMSS[_NNN].jpg
//!  │
//!  ├─ 1. Sequence    order photos by (time, sequence) from their filenames
//!  ├─ 2. Segment     whole page, or overlapping top (0–60 %) / bottom (40–100 %)
//!  ├─ 3. Transcribe  VLM answers with `\section … \end{document}`
//!  ├─ 4. Attempt     validate → write → compile; retry until accepted
//!  ├─ 5. Document    results/<assignment>/output_<stem>.tex (+ .pdf)
//!  └─ 6. Consolidate results/<assignment>/consolidated_output.tex (+ .pdf)
//! ```
//!
//! Pages are processed one at a time. Human decisions go through the
//! [`Operator`] trait; external programs go through [`Compiler`],
//! [`Viewer`] and [`VisionBackend`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use handwrite2tex::{
//!     run_assignment, AutoOperator, ChatCompletionsBackend, Credentials, LatexCompiler,
//!     NoopViewer, ProcessMode, RunConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RunConfig::builder().homework_number(3).build()?;
//!     let creds = Credentials::load("../data/params.json")?;
//!     let backend = ChatCompletionsBackend::new(&config, &creds)?;
//!     let compiler = LatexCompiler::new(&config.compiler);
//!     let mut operator = AutoOperator::new(ProcessMode::Whole);
//!
//!     let summary = run_assignment(
//!         "hw3", &config, &backend, &compiler, &NoopViewer, &mut operator,
//!     )
//!     .await?;
//!     println!("{} pages accepted → {}", summary.accepted(), summary.consolidated_tex.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `hw2tex` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod operator;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod sequence;
pub mod tools;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Credentials, ProcessMode, RunConfig, RunConfigBuilder, TitleBlock};
pub use error::{AttemptError, Hw2TexError, ToolError};
pub use operator::{AutoOperator, Operator, PageAction, Review};
pub use output::{PageReport, PageStatus, RunSummary};
pub use pipeline::consolidate::{consolidate, ConsolidatedDocument};
pub use pipeline::transcribe::{
    ChatCompletionsBackend, DummyBackend, ProviderBackend, VisionBackend,
};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use run::{consolidate_only, list_assignments, run_assignment};
pub use sequence::{FileKind, Page, SequencedFile, SortKey};
pub use tools::{CommandViewer, Compiler, LatexCompiler, NoopViewer, Viewer};
