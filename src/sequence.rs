//! Filename sequencing: decide which files in a folder are pages and in
//! which order they are processed.
//!
//! Pages are photographed with a messaging app that names them
//! `<source>-<YYYY-MM-DD>-<HHMMSS>[_<NNN>].<ext>`, where the optional
//! three-digit suffix distinguishes photos taken within the same second.
//! Page documents written by the pipeline carry the same stem behind an
//! `output_` prefix, so both kinds sort with one rule:
//!
//! ```text
//! key = (HHMMSS as integer, NNN as integer or 0)
//! ```
//!
//! A missing suffix sorts exactly like `_000`. Files that do not follow the
//! convention are left out rather than reported as errors.

use crate::error::Hw2TexError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<stem>[A-Za-z0-9]+-\d{4}-\d{2}-\d{2}-(?P<time>\d{6})(?:_(?P<seq>\d{3}))?)\.(?i:jpe?g|png)$",
    )
    .unwrap()
});

static RE_PAGE_DOCUMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^output_(?P<stem>[A-Za-z0-9]+-\d{4}-\d{2}-\d{2}-(?P<time>\d{6})(?:_(?P<seq>\d{3}))?)\.tex$",
    )
    .unwrap()
});

/// Which naming convention to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Source photos (`.jpg`, `.jpeg`, `.png`, any case).
    Image,
    /// Per-page LaTeX documents (`output_<stem>.tex`).
    PageDocument,
}

impl FileKind {
    fn pattern(self) -> &'static Regex {
        match self {
            FileKind::Image => &RE_IMAGE,
            FileKind::PageDocument => &RE_PAGE_DOCUMENT,
        }
    }
}

/// Total order over conforming filenames.
///
/// Field order matters: the derived `Ord` compares `time` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub time: u32,
    pub sequence: u32,
}

/// A conforming file together with its sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedFile {
    pub path: PathBuf,
    /// Source stem without extension or `output_` prefix,
    /// e.g. `signal-2024-01-01-120000_001`.
    pub stem: String,
    pub key: SortKey,
}

/// One page of an assignment, numbered by its position in sort order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based position in sort order.
    pub ordinal: usize,
    pub image: SequencedFile,
}

/// Parse a bare filename against the convention for `kind`.
///
/// Returns the source stem and the sort key, or `None` when the name does
/// not conform.
pub fn parse_file_name(name: &str, kind: FileKind) -> Option<(String, SortKey)> {
    let caps = kind.pattern().captures(name)?;
    let time = caps.name("time")?.as_str().parse().ok()?;
    let sequence = match caps.name("seq") {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    Some((caps["stem"].to_string(), SortKey { time, sequence }))
}

/// Filter and order a set of paths. Only the final path component is matched.
pub fn sequence_paths<I>(paths: I, kind: FileKind) -> Vec<SequencedFile>
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut files: Vec<SequencedFile> = paths
        .into_iter()
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            let (stem, key) = parse_file_name(name, kind)?;
            Some(SequencedFile { path, stem, key })
        })
        .collect();

    // Tie-break on the path so the order is deterministic even when two
    // extensions share one stem.
    files.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.path.cmp(&b.path)));
    files
}

/// List `folder` and return its conforming entries in processing order.
pub fn sequence_folder(folder: &Path, kind: FileKind) -> Result<Vec<SequencedFile>, Hw2TexError> {
    let entries = std::fs::read_dir(folder).map_err(|_| Hw2TexError::InputFolderNotFound {
        path: folder.to_path_buf(),
    })?;

    let paths = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.path());

    let files = sequence_paths(paths, kind);
    debug!(
        "Sequenced {} {:?} file(s) in {}",
        files.len(),
        kind,
        folder.display()
    );
    Ok(files)
}

/// Number the sequenced images as pages, starting at 1.
pub fn number_pages(images: Vec<SequencedFile>) -> Vec<Page> {
    images
        .into_iter()
        .enumerate()
        .map(|(i, image)| Page {
            ordinal: i + 1,
            image,
        })
        .collect()
}
