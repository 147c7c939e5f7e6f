//! Page document builder: wrap an accepted body in its page preamble, write
//! it to disk, and compile it.
//!
//! ## Boilerplate contract
//!
//! Both preamble variants are made only of lines matched by
//! [`BOILERPLATE_PREFIXES`]. The consolidator strips exactly those lines from
//! every page document, so anything emitted here that is *not* covered by
//! the list would be duplicated once per page in the consolidated output.
//! Adding a preamble line therefore means adding its prefix to the list and
//! bumping [`BOILERPLATE_REVISION`]; the consolidation tests pin the pair.

use crate::config::TitleBlock;
use crate::error::Hw2TexError;
use crate::tools::Compiler;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Revision of the preamble / prefix pair below.
pub const BOILERPLATE_REVISION: u32 = 2;

/// Line prefixes (after trimming) that mark document scaffolding.
pub const BOILERPLATE_PREFIXES: &[&str] = &[
    // document class and packages
    "\\documentclass",
    "\\usepackage",
    // header styling
    "\\pagestyle",
    "\\fancy",
    "\\renewcommand",
    // page counter
    "\\setcounter{page",
    // document begin/end
    "\\begin{document}",
    "\\end{document}",
    // title block
    "\\title",
    "\\author",
    "\\date",
    "\\maketitle",
    "\\section*{Exercise 1}",
];

/// Shared by both preamble variants; must stay byte-identical between them.
const HEADER: &str = "\\documentclass{article}\n\
\\usepackage{fancyhdr}\n\
\\usepackage{amsmath}\n\
\\usepackage{amssymb}\n\
\\pagestyle{fancy}\n\
\\fancyhf{}\n\
\\fancyhead[R]{\\thepage}\n\
\\renewcommand{\\headrulewidth}{0pt}\n";

/// Whether `line` is scaffolding the consolidator removes.
pub fn is_boilerplate(line: &str) -> bool {
    let trimmed = line.trim();
    BOILERPLATE_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

/// The preamble for page `ordinal` (1-based).
///
/// Page 1 carries the title block and opens "Exercise 1"; every other page
/// only sets the visible page counter.
pub fn preamble(ordinal: usize, homework_number: u32, title: &TitleBlock) -> String {
    let mut s = String::from(HEADER);
    if ordinal <= 1 {
        s.push_str(&format!(
            "\\title{{{}: Homework {}}}\n",
            one_line(&title.course),
            homework_number
        ));
        s.push_str(&format!("\\author{{{}}}\n", one_line(&title.author)));
        s.push_str("\\date{\\today}\n");
        s.push_str("\\begin{document}\n");
        s.push_str("\\maketitle\n");
        s.push_str("\\section*{Exercise 1}\n");
    } else {
        s.push_str("\\begin{document}\n");
        s.push_str(&format!("\\setcounter{{page}}{{{}}}\n", ordinal));
    }
    s
}

/// Title-block values must not break the one-command-per-line contract.
fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A page document on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDocument {
    pub ordinal: usize,
    pub tex_path: PathBuf,
    /// Where the compiler drops its output; may not exist if compilation failed.
    pub pdf_path: PathBuf,
}

/// A written document and the result of compiling it.
#[derive(Debug)]
pub struct BuiltDocument {
    pub document: PageDocument,
    /// `None` when compilation succeeded.
    pub compile_error: Option<String>,
}

impl BuiltDocument {
    pub fn compiled(&self) -> bool {
        self.compile_error.is_none()
    }
}

/// `output_<stem>[_<suffix>].tex` / `.pdf` inside `dir`.
pub fn artifact_paths(dir: &Path, stem: &str, suffix: Option<&str>) -> (PathBuf, PathBuf) {
    let base = match suffix {
        Some(sfx) => format!("output_{}_{}", stem, sfx),
        None => format!("output_{}", stem),
    };
    (dir.join(format!("{base}.tex")), dir.join(format!("{base}.pdf")))
}

/// Scratch `.tex` / `.pdf` pair for attempts at `tex_path`.
///
/// `output_<stem>_attempt.tex` falls outside the page-document convention,
/// so an attempt that is never accepted is invisible to the consolidator.
pub fn attempt_paths(tex_path: &Path) -> (PathBuf, PathBuf) {
    let stem = tex_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let tex = tex_path.with_file_name(format!("{stem}_attempt.tex"));
    let pdf = tex.with_extension("pdf");
    (tex, pdf)
}

/// Files a TeX run leaves next to its source.
const SCRATCH_EXTENSIONS: &[&str] = &["tex", "pdf", "aux", "log"];

/// Remove a scratch document and whatever the compiler left beside it.
pub fn discard(document: &PageDocument) {
    for ext in SCRATCH_EXTENSIONS {
        let path = document.tex_path.with_extension(ext);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove {}: {}", path.display(), e),
        }
    }
}

/// Move an accepted scratch document to its final page-document paths.
pub fn promote(
    scratch: &PageDocument,
    tex_path: &Path,
    pdf_path: &Path,
) -> Result<PageDocument, Hw2TexError> {
    let rename = |from: &Path, to: &Path| {
        std::fs::rename(from, to).map_err(|e| Hw2TexError::OutputWriteFailed {
            path: to.to_path_buf(),
            source: e,
        })
    };
    rename(&scratch.tex_path, tex_path)?;
    if scratch.pdf_path.exists() {
        rename(&scratch.pdf_path, pdf_path)?;
    }
    discard(scratch);
    info!("Accepted {}", tex_path.display());

    Ok(PageDocument {
        ordinal: scratch.ordinal,
        tex_path: tex_path.to_path_buf(),
        pdf_path: pdf_path.to_path_buf(),
    })
}

/// Write `preamble + body` to `tex_path`.
pub fn write_document(
    tex_path: &Path,
    pdf_path: &Path,
    ordinal: usize,
    preamble: &str,
    body: &str,
) -> Result<PageDocument, Hw2TexError> {
    let mut text = String::with_capacity(preamble.len() + body.len() + 1);
    text.push_str(preamble);
    text.push_str(body);
    if !text.ends_with('\n') {
        text.push('\n');
    }

    std::fs::write(tex_path, text).map_err(|e| Hw2TexError::OutputWriteFailed {
        path: tex_path.to_path_buf(),
        source: e,
    })?;
    info!("Wrote {}", tex_path.display());

    Ok(PageDocument {
        ordinal,
        tex_path: tex_path.to_path_buf(),
        pdf_path: pdf_path.to_path_buf(),
    })
}

/// Write the document and compile it in place.
///
/// A compiler failure is reported in the returned value, never as `Err`;
/// only failing to write the file is fatal.
pub async fn build(
    tex_path: &Path,
    pdf_path: &Path,
    ordinal: usize,
    preamble: &str,
    body: &str,
    compiler: &dyn Compiler,
) -> Result<BuiltDocument, Hw2TexError> {
    let document = write_document(tex_path, pdf_path, ordinal, preamble, body)?;
    let compile_error = match compiler.compile(&document.tex_path).await {
        Ok(()) => None,
        Err(e) => {
            warn!("Page {}: {}", ordinal, e);
            Some(e.to_string())
        }
    };
    Ok(BuiltDocument {
        document,
        compile_error,
    })
}
