//! Error types for the handwrite2tex library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Hw2TexError`] — **Fatal**: the run cannot proceed at all (missing
//!   params file, missing assignment folder, unwritable output directory).
//!   Returned as `Err(Hw2TexError)` from the top-level entry points.
//!
//! * [`AttemptError`] — **Retryable**: one transcription attempt for a page
//!   (or fragment) failed. The attempt loop records it and requests a fresh
//!   transcription of the same segment. Never propagated as `Err` from
//!   [`crate::run::run_assignment`].
//!
//! * [`ToolError`] — an external binary (compiler or viewer) could not be
//!   started or exited non-zero. Compiler failures turn into
//!   [`AttemptError::CompileFailure`]; viewer failures are only logged.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the handwrite2tex library.
#[derive(Debug, Error)]
pub enum Hw2TexError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// The JSON params file holding the service credential does not exist.
    #[error("Params file not found: '{path}'\nCreate it with: {{\"openai_api_key\": \"sk-...\"}}")]
    ConfigNotFound { path: PathBuf },

    /// The params file exists but is not valid JSON or lacks the credential.
    #[error("Params file '{path}' is invalid: {detail}")]
    ConfigInvalid { path: PathBuf, detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// The input root or the selected assignment folder does not exist.
    #[error("Input folder not found: '{path}'")]
    InputFolderNotFound { path: PathBuf },

    /// The input root contains no assignment subfolders.
    #[error("No assignment folders found under '{path}'")]
    NoSubfolders { path: PathBuf },

    /// A source image could not be read from disk.
    #[error("Failed to read image '{path}': {source}")]
    ImageReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source image could not be decoded or re-encoded for cropping.
    #[error("Failed to decode image '{path}': {detail}")]
    ImageDecodeFailed { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A retryable failure of a single transcription attempt.
///
/// Every variant loops back to a fresh transcription request for the same
/// page or fragment.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum AttemptError {
    /// Non-success status or transport error from the transcription call.
    #[error("transcription service unavailable: {detail}")]
    ServiceUnavailable { detail: String },

    /// The service answered but returned an empty candidate list.
    #[error("transcription service returned no candidates")]
    NoCandidates,

    /// The first candidate lacks the document start/end markers.
    #[error("response does not contain the expected \\section … \\end{{document}} markers")]
    MarkersNotFound,

    /// The external compiler rejected the written page document.
    #[error("compilation failed: {detail}")]
    CompileFailure { detail: String },
}

/// Failure of an external binary (compiler or viewer).
#[derive(Debug, Error)]
pub enum ToolError {
    /// The binary could not be started at all.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The binary ran and exited with a non-zero status.
    #[error("'{program}' exited with {status}")]
    ExitStatus { program: String, status: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_not_found_display() {
        let e = Hw2TexError::ConfigNotFound {
            path: PathBuf::from("../data/params.json"),
        };
        let msg = e.to_string();
        assert!(msg.contains("params.json"), "got: {msg}");
        assert!(msg.contains("openai_api_key"), "got: {msg}");
    }

    #[test]
    fn markers_not_found_display() {
        let msg = AttemptError::MarkersNotFound.to_string();
        assert!(msg.contains("\\end{document}"), "got: {msg}");
    }

    #[test]
    fn compile_failure_display() {
        let e = AttemptError::CompileFailure {
            detail: "'pdflatex' exited with exit status: 1".into(),
        };
        assert!(e.to_string().contains("pdflatex"));
    }

    #[test]
    fn tool_error_display() {
        let e = ToolError::ExitStatus {
            program: "xdg-open".into(),
            status: "exit status: 4".into(),
        };
        assert!(e.to_string().contains("xdg-open"));
        assert!(e.to_string().contains("4"));
    }

    #[test]
    fn attempt_error_serialises() {
        let json = serde_json::to_string(&AttemptError::NoCandidates).unwrap();
        assert_eq!(json, "\"NoCandidates\"");
    }
}
