//! CLI binary for handwrite2tex.
//!
//! A thin shim over the library crate: maps CLI flags to `RunConfig`,
//! answers the pipeline's operator questions on the terminal, and prints
//! a summary.

use anyhow::{Context, Result};
use clap::Parser;
use handwrite2tex::{
    consolidate_only, list_assignments, run_assignment, AttemptError, AutoOperator,
    ChatCompletionsBackend, CommandViewer, Credentials, DummyBackend, LatexCompiler, Operator,
    Page, PageAction, ProcessMode, ProviderBackend, Review, RunConfig, RunProgressCallback,
    TitleBlock, VisionBackend,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner shown while a request or compile is in flight, plus one log line
/// per page event. Prompts suspend the spinner through the shared bar.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(bar: ProgressBar) -> Arc<Self> {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        Arc::new(Self { bar })
    }
}

impl RunProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_pages} page(s) to transcribe"))
        ));
    }

    fn on_attempt_start(&self, ordinal: usize, label: &str, attempt: u32) {
        self.bar.set_prefix(format!("Page {ordinal}"));
        self.bar.set_message(format!("transcribing {label} (attempt {attempt})…"));
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }

    fn on_attempt_failed(&self, ordinal: usize, label: &str, attempt: u32, error: &AttemptError) {
        let msg = error.to_string();
        // Truncate very long error messages to keep output tidy.
        let msg = match msg.char_indices().nth(80) {
            Some((idx, _)) => format!("{}\u{2026}", &msg[..idx]),
            None => msg,
        };
        self.bar.println(format!(
            "  {} Page {:>3} {:<8} attempt {}  {}",
            red("✗"),
            ordinal,
            label,
            attempt,
            red(&msg)
        ));
    }

    fn on_page_accepted(&self, ordinal: usize, total_pages: usize, attempts: u32) {
        self.bar.disable_steady_tick();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            ordinal,
            total_pages,
            dim(&format!("{attempts} attempt(s)")),
        ));
    }

    fn on_page_skipped(&self, ordinal: usize, total_pages: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            dim("·"),
            ordinal,
            total_pages,
            dim("skipped")
        ));
    }

    fn on_page_abandoned(&self, ordinal: usize, total_pages: usize, error: &str) {
        self.bar.disable_steady_tick();
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            red("✘"),
            ordinal,
            total_pages,
            red(error)
        ));
    }

    fn on_run_complete(&self, accepted: usize, compiled: bool) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} page(s) accepted; consolidated document {}",
            if compiled { green("✔") } else { cyan("⚠") },
            bold(&accepted.to_string()),
            if compiled {
                green("compiled")
            } else {
                red("did not compile")
            }
        );
    }
}

// ── Terminal operator ────────────────────────────────────────────────────────

/// Answers operator questions on stdin/stderr.
struct TerminalOperator {
    bar: ProgressBar,
    default_mode: ProcessMode,
}

impl TerminalOperator {
    /// Print `question` and read one trimmed, lower-cased line.
    ///
    /// The spinner is suspended while waiting; stdin is read on a
    /// blocking-capable thread. EOF reads as an empty answer.
    fn ask(&self, question: &str) -> String {
        tokio::task::block_in_place(|| {
            self.bar.suspend(|| {
                eprint!("{question} ");
                io::stderr().flush().ok();
                let mut line = String::new();
                io::stdin().lock().read_line(&mut line).ok();
                line.trim().to_lowercase()
            })
        })
    }
}

impl Operator for TerminalOperator {
    fn page_action(&mut self, page: &Page, total_pages: usize) -> PageAction {
        let default = match self.default_mode {
            ProcessMode::Whole => "w",
            ProcessMode::Fragment => "f",
        };
        loop {
            let answer = self.ask(&format!(
                "Page {}/{} ({}): process [w]hole, [f]ragments or [s]kip? [{}]",
                page.ordinal,
                total_pages,
                page.image.path.display(),
                default
            ));
            match if answer.is_empty() { default } else { answer.as_str() } {
                "w" | "whole" | "y" | "yes" => return PageAction::Process(ProcessMode::Whole),
                "f" | "fragment" | "fragments" => return PageAction::Process(ProcessMode::Fragment),
                "s" | "skip" | "n" | "no" => return PageAction::Skip,
                _ => continue,
            }
        }
    }

    fn review(&mut self, page: &Page, label: &str, compiled: &Path) -> Review {
        loop {
            let answer = self.ask(&format!(
                "Page {} {} compiled to {}: [a]ccept or [r]etry? [a]",
                page.ordinal,
                label,
                compiled.display()
            ));
            match answer.as_str() {
                "" | "a" | "accept" | "y" | "yes" => return Review::Accept,
                "r" | "retry" | "n" | "no" => return Review::Rerun,
                _ => continue,
            }
        }
    }

    fn keep_trying(&mut self, page: &Page, label: &str, failures: u32, last: &AttemptError) -> bool {
        let answer = self.ask(&format!(
            "Page {} {} failed {} times in a row (last: {}). Keep trying? [y/N]",
            page.ordinal, label, failures, last
        ));
        matches!(answer.as_str(), "y" | "yes")
    }
}

/// Print the numbered assignment list and read a choice.
fn choose_assignment(names: &[String]) -> Result<String> {
    for (idx, name) in names.iter().enumerate() {
        eprintln!("{}: {}", idx + 1, name);
    }
    let stdin = io::stdin();
    loop {
        eprint!("Choose a subfolder by number: ");
        io::stderr().flush().ok();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("Failed to read stdin")? == 0 {
            anyhow::bail!("No assignment selected");
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=names.len()).contains(&n) => return Ok(names[n - 1].clone()),
            _ => eprintln!("Please enter a number between 1 and {}", names.len()),
        }
    }
}

/// Trailing digits of the folder name (`hw07` → 7), if any.
fn homework_from_name(name: &str) -> Option<u32> {
    let digits: String = name
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Pick an assignment interactively and transcribe it
  hw2tex

  # Transcribe a named assignment without prompts
  hw2tex --assignment hw3 --yes

  # Split dense pages into overlapping halves by default
  hw2tex --assignment hw3 --mode fragment

  # Offline dry run with canned responses
  hw2tex --assignment hw3 --dummy --yes

  # Rebuild only the consolidated document
  hw2tex --assignment hw3 --consolidate-only

  # Use an environment-configured provider instead of the params file
  ANTHROPIC_API_KEY=... hw2tex --provider anthropic --model claude-sonnet-4-20250514

LAYOUT:
  <input-root>/<assignment>/signal-2024-01-01-120000.jpg     source photos
  <output-root>/<assignment>/output_<stem>.tex / .pdf        page documents
  <output-root>/<assignment>/consolidated_output.tex / .pdf  merged document

PARAMS FILE (JSON):
  { "openai_api_key": "sk-...", "model": "gpt-4-turbo" }
"#;

/// Transcribe photographed handwritten pages into one LaTeX document.
#[derive(Parser, Debug)]
#[command(
    name = "hw2tex",
    version,
    about = "Transcribe photographed handwritten pages into one LaTeX document using Vision LLMs",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Assignment subfolder name. Prompted for when omitted.
    #[arg(short, long, env = "HW2TEX_ASSIGNMENT")]
    assignment: Option<String>,

    /// Folder holding one subfolder of photos per assignment.
    #[arg(long, env = "HW2TEX_INPUT_ROOT", default_value = "../psets")]
    input_root: PathBuf,

    /// Folder receiving per-assignment output.
    #[arg(long, env = "HW2TEX_OUTPUT_ROOT", default_value = "../results")]
    output_root: PathBuf,

    /// JSON params file with the service credential.
    #[arg(long, env = "HW2TEX_PARAMS", default_value = "../data/params.json")]
    params: PathBuf,

    /// Homework number in the title block. Default: trailing digits of the folder name, else 1.
    #[arg(long, env = "HW2TEX_HOMEWORK")]
    homework: Option<u32>,

    /// Author shown in the title block.
    #[arg(long, env = "HW2TEX_AUTHOR", default_value = "Student")]
    author: String,

    /// Course shown in the title block.
    #[arg(long, env = "HW2TEX_COURSE", default_value = "Problem Set")]
    course: String,

    /// Vision model ID.
    #[arg(long, env = "HW2TEX_MODEL")]
    model: Option<String>,

    /// Use an edgequake-llm provider (openai, anthropic, gemini, ollama, auto)
    /// configured from environment variables instead of the params file.
    #[arg(long, env = "HW2TEX_PROVIDER")]
    provider: Option<String>,

    /// Default processing mode offered for each page.
    #[arg(long, env = "HW2TEX_MODE", value_enum, default_value = "whole")]
    mode: ModeArg,

    /// Consecutive failures before asking whether to keep trying (0 = never ask).
    #[arg(long, env = "HW2TEX_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    /// Max output tokens per request.
    #[arg(long, env = "HW2TEX_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "HW2TEX_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Per-request timeout in seconds.
    #[arg(long, env = "HW2TEX_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// LaTeX engine.
    #[arg(long, env = "HW2TEX_COMPILER", default_value = "pdflatex")]
    compiler: String,

    /// Program used to open photos and compiled documents.
    #[arg(long, env = "HW2TEX_VIEWER", default_value = "xdg-open")]
    viewer: String,

    /// Open each photo before asking whether to process it.
    #[arg(long)]
    show_images: bool,

    /// Open each compiled page document.
    #[arg(long)]
    view: bool,

    /// Serve canned responses instead of calling the service.
    #[arg(long, env = "HW2TEX_DUMMY")]
    dummy: bool,

    /// Process every page in the default mode and accept every compiled result.
    #[arg(short, long)]
    yes: bool,

    /// Skip transcription; only rebuild the consolidated document.
    #[arg(long)]
    consolidate_only: bool,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HW2TEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and prompts.
    #[arg(short, long, env = "HW2TEX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Whole,
    Fragment,
}

impl From<ModeArg> for ProcessMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Whole => ProcessMode::Whole,
            ModeArg::Fragment => ProcessMode::Fragment,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // With the spinner on, library INFO lines stay hidden unless -v.
    let show_progress = !cli.quiet && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else if show_progress {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Pick the assignment ──────────────────────────────────────────────
    let assignment = match cli.assignment.clone() {
        Some(a) => a,
        None => {
            let names = list_assignments(&cli.input_root).context("Failed to list assignments")?;
            choose_assignment(&names)?
        }
    };

    let bar = ProgressBar::hidden();
    if show_progress {
        bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    }
    let callback = show_progress.then(|| CliProgressCallback::new(bar.clone()));
    let config = build_config(&cli, &assignment, callback)?;
    let compiler = LatexCompiler::new(&config.compiler);

    // ── Consolidate-only mode ────────────────────────────────────────────
    if cli.consolidate_only {
        let merged = consolidate_only(&assignment, &config, &compiler)
            .await
            .context("Consolidation failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::json!({
                    "tex": merged.tex_path,
                    "pdf": merged.pdf_path,
                    "sources": merged.sources,
                    "compiled": merged.compiled,
                })
            );
        } else if !cli.quiet {
            eprintln!(
                "{}  {} page document(s)  →  {}",
                if merged.compiled { green("✔") } else { cyan("⚠") },
                merged.sources.len(),
                bold(&merged.tex_path.display().to_string())
            );
        }
        return Ok(());
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let backend = build_backend(&cli, &config)?;
    let viewer = CommandViewer::new(&config.viewer);
    let mut operator: Box<dyn Operator> = if cli.yes {
        Box::new(AutoOperator::new(config.default_mode))
    } else {
        Box::new(TerminalOperator {
            bar: bar.clone(),
            default_mode: config.default_mode,
        })
    };

    let summary = run_assignment(
        &assignment,
        &config,
        backend.as_ref(),
        &compiler,
        &viewer,
        operator.as_mut(),
    )
    .await
    .context("Run failed")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        eprintln!(
            "   {} accepted  /  {} skipped  /  {} failed  ·  {}ms  →  {}",
            summary.accepted(),
            summary.skipped(),
            summary.failed(),
            summary.duration_ms,
            bold(&summary.consolidated_tex.display().to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `RunConfig`.
fn build_config(
    cli: &Cli,
    assignment: &str,
    progress: Option<Arc<CliProgressCallback>>,
) -> Result<RunConfig> {
    let homework = cli
        .homework
        .or_else(|| homework_from_name(assignment))
        .unwrap_or(1);

    let mut builder = RunConfig::builder()
        .input_root(&cli.input_root)
        .output_root(&cli.output_root)
        .homework_number(homework)
        .title_block(TitleBlock {
            author: cli.author.clone(),
            course: cli.course.clone(),
        })
        .max_attempts(if cli.max_attempts == 0 {
            None
        } else {
            Some(cli.max_attempts)
        })
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .compiler(&cli.compiler)
        .viewer(&cli.viewer)
        .show_images(cli.show_images)
        .view_documents(cli.view)
        .dummy_data(cli.dummy)
        .default_mode(cli.mode.into());

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Choose the transcription backend: dummy, named provider, or params file.
fn build_backend(cli: &Cli, config: &RunConfig) -> Result<Box<dyn VisionBackend>> {
    if config.dummy_data {
        return Ok(Box::new(DummyBackend::default()));
    }
    match cli.provider.as_deref() {
        Some("auto") => Ok(Box::new(
            ProviderBackend::from_env(config).context("Provider auto-detection failed")?,
        )),
        Some(name) => Ok(Box::new(
            ProviderBackend::from_name(name, config).context("Provider setup failed")?,
        )),
        None => {
            let creds = Credentials::load(&cli.params).context("Failed to load params file")?;
            Ok(Box::new(ChatCompletionsBackend::new(config, &creds)?))
        }
    }
}
