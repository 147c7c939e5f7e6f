//! Fakes shared by the integration tests.
//!
//! Nothing here touches the network or a TeX installation: the backend
//! replays a script, the compiler writes an empty PDF (or fails on cue), and
//! the operator answers from queues.

#![allow(dead_code)]

use async_trait::async_trait;
use handwrite2tex::pipeline::transcribe::VisionRequest;
use handwrite2tex::{
    AttemptError, Compiler, Operator, Page, PageAction, ProcessMode, Review, ToolError,
    VisionBackend, Viewer,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A response that passes validation.
pub fn good_response(body: &str) -> String {
    format!("Sure:\n\\section*{{Answer}}\n{body}\n\\end{{document}}\n")
}

/// Write a small grey JPEG at `dir/name`.
pub fn write_photo(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let img = image::RgbImage::from_pixel(40, 100, image::Rgb([200, 200, 200]));
    image::DynamicImage::ImageRgb8(img)
        .save_with_format(&path, image::ImageFormat::Jpeg)
        .unwrap();
    path
}

/// Names of the files in `dir`, sorted.
pub fn dir_listing(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ── Backend ──────────────────────────────────────────────────────────────────

/// Replays scripted responses in order, then repeats `fallback`.
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<Vec<String>, AttemptError>>>,
    fallback: String,
    pub requests: Mutex<Vec<VisionRequest>>,
}

impl ScriptedBackend {
    pub fn new<I>(script: I) -> Self
    where
        I: IntoIterator<Item = Result<Vec<String>, AttemptError>>,
    {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback: good_response("fallback"),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request succeeds with one candidate built from `body`.
    pub fn always(body: &str) -> Self {
        let mut backend = Self::new(Vec::<Result<Vec<String>, AttemptError>>::new());
        backend.fallback = good_response(body);
        backend
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl VisionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &VisionRequest) -> Result<Vec<String>, AttemptError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![self.fallback.clone()]))
    }
}

// ── Compiler / viewer ────────────────────────────────────────────────────────

/// Writes an empty PDF next to the source, or fails when the script says so.
/// An exhausted script means success.
#[derive(Default)]
pub struct FakeCompiler {
    failures: Mutex<VecDeque<bool>>,
    pub compiled: Mutex<Vec<PathBuf>>,
}

impl FakeCompiler {
    /// `script[i] == true` makes the i-th compile fail.
    pub fn scripted<I: IntoIterator<Item = bool>>(script: I) -> Self {
        Self {
            failures: Mutex::new(script.into_iter().collect()),
            compiled: Mutex::new(Vec::new()),
        }
    }

    pub fn compiled_names(&self) -> Vec<String> {
        self.compiled
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }
}

#[async_trait]
impl Compiler for FakeCompiler {
    async fn compile(&self, tex_path: &Path) -> Result<(), ToolError> {
        self.compiled.lock().unwrap().push(tex_path.to_path_buf());
        let fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
        if fail {
            return Err(ToolError::ExitStatus {
                program: "fake-latex".into(),
                status: "exit status: 1".into(),
            });
        }
        std::fs::write(tex_path.with_extension("pdf"), b"%PDF-1.4\n").unwrap();
        Ok(())
    }
}

/// Records every path it is asked to open.
#[derive(Default)]
pub struct RecordingViewer {
    pub opened: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl Viewer for RecordingViewer {
    async fn open(&self, path: &Path) -> Result<(), ToolError> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

/// Fails every open, like a missing `xdg-open`.
#[derive(Default)]
pub struct FailingViewer {
    pub attempts: Mutex<usize>,
}

#[async_trait]
impl Viewer for FailingViewer {
    async fn open(&self, _path: &Path) -> Result<(), ToolError> {
        *self.attempts.lock().unwrap() += 1;
        Err(ToolError::ExitStatus {
            program: "fake-viewer".into(),
            status: "exit status: 3".into(),
        })
    }
}

// ── Operator ─────────────────────────────────────────────────────────────────

/// Answers from queues; an empty queue falls back to the defaults
/// (process whole, accept, give up).
#[derive(Default)]
pub struct ScriptedOperator {
    pub actions: VecDeque<PageAction>,
    pub reviews: VecDeque<Review>,
    pub keep_going: VecDeque<bool>,
    /// `(ordinal, label)` of every review request.
    pub reviewed: Vec<(usize, String)>,
    /// `(ordinal, label, failures)` of every keep-trying question.
    pub asked: Vec<(usize, String, u32)>,
}

impl Operator for ScriptedOperator {
    fn page_action(&mut self, _page: &Page, _total_pages: usize) -> PageAction {
        self.actions
            .pop_front()
            .unwrap_or(PageAction::Process(ProcessMode::Whole))
    }

    fn review(&mut self, page: &Page, label: &str, _compiled: &Path) -> Review {
        self.reviewed.push((page.ordinal, label.to_string()));
        self.reviews.pop_front().unwrap_or(Review::Accept)
    }

    fn keep_trying(&mut self, page: &Page, label: &str, failures: u32, _last: &AttemptError) -> bool {
        self.asked.push((page.ordinal, label.to_string(), failures));
        self.keep_going.pop_front().unwrap_or(false)
    }
}
