//! Configuration types for a transcription run.
//!
//! All run behaviour is controlled through [`RunConfig`], built via its
//! [`RunConfigBuilder`]. The service credential lives apart from it in a
//! JSON params file, loaded once at startup with [`Credentials::load`].
//!
//! Display toggles and the offline dummy-data switch are plain fields here
//! and travel into the pipeline with the config value; nothing in the
//! library reads process-wide mutable state.

use crate::error::Hw2TexError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default OpenAI chat-completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4-turbo";

/// Configuration for one transcription run over an assignment folder.
///
/// # Example
/// ```rust
/// use handwrite2tex::RunConfig;
///
/// let config = RunConfig::builder()
///     .homework_number(4)
///     .max_attempts(Some(3))
///     .build()
///     .unwrap();
/// assert_eq!(config.homework_number, 4);
/// ```
#[derive(Clone)]
pub struct RunConfig {
    /// Directory holding one subfolder of photographed pages per assignment.
    pub input_root: PathBuf,

    /// Directory receiving per-page and consolidated artifacts, mirroring
    /// the assignment subfolder names of `input_root`.
    pub output_root: PathBuf,

    /// Vision model identifier. Default: `gpt-4-turbo`.
    pub model: String,

    /// Chat-completions endpoint used by the HTTP backend.
    pub endpoint: String,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per request. Default: 1024.
    pub max_tokens: usize,

    /// Consecutive failed attempts before the operator is asked whether to
    /// keep trying. `None` retries forever. Default: `Some(5)`.
    pub max_attempts: Option<u32>,

    /// Initial delay between failed attempts in milliseconds. Default: 500.
    ///
    /// Doubles after each consecutive failure, capped at [`MAX_BACKOFF_MS`].
    pub retry_backoff_ms: u64,

    /// Per-request timeout for the HTTP backend in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Homework number printed in the page-1 title block. Default: 1.
    pub homework_number: u32,

    /// Author and course metadata for the page-1 title block.
    pub title_block: TitleBlock,

    /// Compiler binary invoked on every written document. Default: `pdflatex`.
    pub compiler: String,

    /// Viewer binary used to open images and compiled documents.
    /// Default: `xdg-open`.
    pub viewer: String,

    /// Open each source image before asking whether to process it.
    pub show_images: bool,

    /// Open each compiled page document after a successful compile.
    pub view_documents: bool,

    /// Serve canned responses instead of calling the service.
    pub dummy_data: bool,

    /// Mode used when the operator does not choose one. Default: whole page.
    pub default_mode: ProcessMode,

    /// Optional per-page / per-attempt event sink.
    pub progress_callback: Option<ProgressCallback>,
}

/// Upper bound for the exponential retry delay.
pub const MAX_BACKOFF_MS: u64 = 8_000;

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("../psets"),
            output_root: PathBuf::from("../results"),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            max_attempts: Some(5),
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            homework_number: 1,
            title_block: TitleBlock::default(),
            compiler: "pdflatex".to_string(),
            viewer: "xdg-open".to_string(),
            show_images: false,
            view_documents: false,
            dummy_data: false,
            default_mode: ProcessMode::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfig")
            .field("input_root", &self.input_root)
            .field("output_root", &self.output_root)
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_attempts", &self.max_attempts)
            .field("homework_number", &self.homework_number)
            .field("title_block", &self.title_block)
            .field("compiler", &self.compiler)
            .field("viewer", &self.viewer)
            .field("dummy_data", &self.dummy_data)
            .field("default_mode", &self.default_mode)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn RunProgressCallback>"),
            )
            .finish()
    }
}

impl RunConfig {
    /// Create a new builder for `RunConfig`.
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder {
            config: Self::default(),
        }
    }

    /// Input folder of the named assignment.
    pub fn input_dir(&self, assignment: &str) -> PathBuf {
        self.input_root.join(assignment)
    }

    /// Output folder of the named assignment.
    pub fn output_dir(&self, assignment: &str) -> PathBuf {
        self.output_root.join(assignment)
    }

    /// Delay before retry number `failures` (1-based count of consecutive
    /// failed attempts so far).
    pub fn backoff_ms(&self, failures: u32) -> u64 {
        if failures == 0 || self.retry_backoff_ms == 0 {
            return 0;
        }
        let shift = (failures - 1).min(16);
        self.retry_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(MAX_BACKOFF_MS)
    }
}

/// Builder for [`RunConfig`].
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn input_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.input_root = path.into();
        self
    }

    pub fn output_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_root = path.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_attempts(mut self, n: Option<u32>) -> Self {
        self.config.max_attempts = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn homework_number(mut self, n: u32) -> Self {
        self.config.homework_number = n;
        self
    }

    pub fn title_block(mut self, block: TitleBlock) -> Self {
        self.config.title_block = block;
        self
    }

    pub fn compiler(mut self, program: impl Into<String>) -> Self {
        self.config.compiler = program.into();
        self
    }

    pub fn viewer(mut self, program: impl Into<String>) -> Self {
        self.config.viewer = program.into();
        self
    }

    pub fn show_images(mut self, v: bool) -> Self {
        self.config.show_images = v;
        self
    }

    pub fn view_documents(mut self, v: bool) -> Self {
        self.config.view_documents = v;
        self
    }

    pub fn dummy_data(mut self, v: bool) -> Self {
        self.config.dummy_data = v;
        self
    }

    pub fn default_mode(mut self, mode: ProcessMode) -> Self {
        self.config.default_mode = mode;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RunConfig, Hw2TexError> {
        let c = &self.config;
        if c.max_attempts == Some(0) {
            return Err(Hw2TexError::InvalidConfig(
                "max_attempts must be ≥ 1 (use None for unbounded)".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(Hw2TexError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.compiler.trim().is_empty() {
            return Err(Hw2TexError::InvalidConfig(
                "compiler command must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums and small value types ──────────────────────────────────────────

/// How a page is submitted to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessMode {
    /// One request over the whole page. (default)
    #[default]
    Whole,
    /// Top and bottom fragments first, then a whole-page pass that sees
    /// both fragment transcriptions as context.
    Fragment,
}

/// Fixed metadata rendered into the page-1 title block.
///
/// Kept on a single line per LaTeX command so the consolidator can strip it
/// by prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleBlock {
    pub author: String,
    pub course: String,
}

impl Default for TitleBlock {
    fn default() -> Self {
        Self {
            author: "Student".to_string(),
            course: "Problem Set".to_string(),
        }
    }
}

/// Contents of the JSON params file.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    /// Bearer credential for the chat-completions service.
    pub openai_api_key: String,

    /// Optional model override.
    #[serde(default)]
    pub model: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl Credentials {
    /// Read the params file once.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Hw2TexError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Hw2TexError::ConfigNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Hw2TexError::ConfigInvalid {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                }
            }
        })?;
        Self::from_json(&text).map_err(|detail| Hw2TexError::ConfigInvalid {
            path: path.to_path_buf(),
            detail,
        })
    }

    fn from_json(text: &str) -> Result<Self, String> {
        let creds: Credentials = serde_json::from_str(text).map_err(|e| e.to_string())?;
        if creds.openai_api_key.trim().is_empty() {
            return Err("openai_api_key is empty".to_string());
        }
        Ok(creds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = RunConfig::default();
        assert_eq!(c.model, "gpt-4-turbo");
        assert_eq!(c.max_tokens, 1024);
        assert_eq!(c.max_attempts, Some(5));
        assert_eq!(c.default_mode, ProcessMode::Whole);
        assert!(!c.dummy_data);
    }

    #[test]
    fn builder_rejects_zero_attempts() {
        let err = RunConfig::builder().max_attempts(Some(0)).build().unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn builder_accepts_unbounded_attempts() {
        let c = RunConfig::builder().max_attempts(None).build().unwrap();
        assert_eq!(c.max_attempts, None);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let c = RunConfig::builder().retry_backoff_ms(500).build().unwrap();
        assert_eq!(c.backoff_ms(0), 0);
        assert_eq!(c.backoff_ms(1), 500);
        assert_eq!(c.backoff_ms(2), 1000);
        assert_eq!(c.backoff_ms(3), 2000);
        assert_eq!(c.backoff_ms(10), MAX_BACKOFF_MS);
        assert_eq!(c.backoff_ms(u32::MAX), MAX_BACKOFF_MS);
    }

    #[test]
    fn assignment_dirs_mirror_each_other() {
        let c = RunConfig::builder()
            .input_root("/in")
            .output_root("/out")
            .build()
            .unwrap();
        assert_eq!(c.input_dir("hw3"), PathBuf::from("/in/hw3"));
        assert_eq!(c.output_dir("hw3"), PathBuf::from("/out/hw3"));
    }

    #[test]
    fn credentials_parse() {
        let creds = Credentials::from_json(r#"{"openai_api_key": "sk-test"}"#).unwrap();
        assert_eq!(creds.openai_api_key, "sk-test");
        assert!(creds.model.is_none());
        assert!(!format!("{creds:?}").contains("sk-test"));
    }

    #[test]
    fn credentials_reject_empty_key() {
        assert!(Credentials::from_json(r#"{"openai_api_key": "  "}"#).is_err());
        assert!(Credentials::from_json(r#"{"model": "gpt-4o"}"#).is_err());
    }

    #[test]
    fn credentials_missing_file() {
        let err = Credentials::load("/definitely/not/here/params.json").unwrap_err();
        assert!(matches!(err, Hw2TexError::ConfigNotFound { .. }));
    }
}
