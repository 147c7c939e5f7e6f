//! External binaries: the LaTeX compiler and the document/image viewer.
//!
//! Both are traits so the attempt loop can be driven in tests without a TeX
//! installation. The subprocess implementations run with the working
//! directory set to the artifact's folder, which is where `pdflatex` drops
//! its `.aux`, `.log` and `.pdf` outputs.

use crate::error::ToolError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Turns a `.tex` file into a rendered artifact next to it.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, tex_path: &Path) -> Result<(), ToolError>;
}

/// Opens an image or compiled document for the operator.
#[async_trait]
pub trait Viewer: Send + Sync {
    async fn open(&self, path: &Path) -> Result<(), ToolError>;
}

/// Runs `pdflatex` (or another TeX engine) non-interactively.
#[derive(Debug, Clone)]
pub struct LatexCompiler {
    program: String,
}

impl LatexCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Compiler for LatexCompiler {
    async fn compile(&self, tex_path: &Path) -> Result<(), ToolError> {
        let (dir, file) = split_path(tex_path);
        info!("Compiling {}", tex_path.display());

        // nonstopmode: a syntax error must fail the run, not wait on stdin.
        let status = Command::new(&self.program)
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg(file)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| ToolError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if status.success() {
            debug!("{} succeeded on {}", self.program, tex_path.display());
            Ok(())
        } else {
            Err(ToolError::ExitStatus {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

/// Opens files with an external program (`xdg-open`, `open`, `acroread`, …)
/// and waits for it to exit.
#[derive(Debug, Clone)]
pub struct CommandViewer {
    program: String,
}

impl CommandViewer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Viewer for CommandViewer {
    async fn open(&self, path: &Path) -> Result<(), ToolError> {
        let (dir, file) = split_path(path);
        let status = Command::new(&self.program)
            .arg(file)
            .current_dir(dir)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| ToolError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(ToolError::ExitStatus {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }
}

/// A viewer that does nothing, for headless runs.
pub struct NoopViewer;

#[async_trait]
impl Viewer for NoopViewer {
    async fn open(&self, _path: &Path) -> Result<(), ToolError> {
        Ok(())
    }
}

/// Split into (working directory, file name). A bare file name runs in `.`.
fn split_path(path: &Path) -> (&Path, &std::ffi::OsStr) {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    (dir, path.file_name().unwrap_or(path.as_os_str()))
}
