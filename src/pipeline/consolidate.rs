//! Consolidation: merge every accepted page document of an assignment into
//! one LaTeX file and compile it.
//!
//! Each page document is a complete, standalone file. Merging them means
//! stripping every scaffolding line (see
//! [`crate::pipeline::document::BOILERPLATE_PREFIXES`]), concatenating what
//! is left in page order, and wrapping the result once in the page-1
//! preamble and a single `\end{document}`.
//!
//! Because the preamble itself consists only of listed prefixes, stripping
//! the consolidated file again yields exactly the concatenated bodies. Running
//! the consolidator over its own output never duplicates the preamble.

use crate::config::TitleBlock;
use crate::error::Hw2TexError;
use crate::pipeline::document::{is_boilerplate, preamble};
use crate::prompts::BODY_END_MARKER;
use crate::sequence::{sequence_folder, FileKind, SequencedFile};
use crate::tools::Compiler;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name of the merged document inside the assignment output folder.
pub const CONSOLIDATED_TEX: &str = "consolidated_output.tex";

/// Remove scaffolding lines from one page document.
///
/// Kept lines are emitted verbatim, each terminated by `\n`, followed by one
/// blank separator line.
pub fn strip_boilerplate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if is_boilerplate(line) {
            continue;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Assemble the consolidated text from page-document texts already in order.
pub fn assemble<'a, I>(pages: I, homework_number: u32, title: &TitleBlock) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut doc = preamble(1, homework_number, title);
    for text in pages {
        doc.push_str(&strip_boilerplate(text));
    }
    doc.push_str(BODY_END_MARKER);
    doc.push('\n');
    doc
}

/// The merged document on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidatedDocument {
    pub tex_path: PathBuf,
    pub pdf_path: PathBuf,
    /// Page documents merged, in order.
    pub sources: Vec<PathBuf>,
    pub compiled: bool,
}

/// Merge the page documents in `folder` and compile the result.
///
/// Page documents are found and ordered with the filename sequencer; the
/// consolidated file itself and fragment artifacts do not match the
/// page-document convention and are ignored.
pub async fn consolidate(
    folder: &Path,
    homework_number: u32,
    title: &TitleBlock,
    compiler: &dyn Compiler,
) -> Result<ConsolidatedDocument, Hw2TexError> {
    let files: Vec<SequencedFile> = sequence_folder(folder, FileKind::PageDocument)?;
    debug!(
        "Consolidating {:?}",
        files.iter().map(|f| f.stem.as_str()).collect::<Vec<_>>()
    );

    let mut texts = Vec::with_capacity(files.len());
    for f in &files {
        let text = std::fs::read_to_string(&f.path).map_err(|e| {
            Hw2TexError::Internal(format!("reading {}: {}", f.path.display(), e))
        })?;
        texts.push(text);
    }

    let merged = assemble(texts.iter().map(String::as_str), homework_number, title);
    let tex_path = folder.join(CONSOLIDATED_TEX);
    let pdf_path = tex_path.with_extension("pdf");
    std::fs::write(&tex_path, merged).map_err(|e| Hw2TexError::OutputWriteFailed {
        path: tex_path.clone(),
        source: e,
    })?;
    info!(
        "Consolidated {} page(s) into {}",
        files.len(),
        tex_path.display()
    );

    let compiled = match compiler.compile(&tex_path).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Consolidated document: {}", e);
            false
        }
    };

    Ok(ConsolidatedDocument {
        tex_path,
        pdf_path,
        sources: files.into_iter().map(|f| f.path).collect(),
        compiled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_keeps_body_lines_in_order() {
        let text = format!("{}x = 1\n\n  y = 2\n\\end{{document}}\n", preamble(2, 1, &TitleBlock::default()));
        assert_eq!(strip_boilerplate(&text), "x = 1\n\n  y = 2\n\n");
    }

    #[test]
    fn strip_of_empty_text_is_a_separator() {
        assert_eq!(strip_boilerplate(""), "\n");
    }

    #[test]
    fn assemble_wraps_once() {
        let t = TitleBlock::default();
        let p1 = format!("{}A", preamble(1, 2, &t));
        let p2 = format!("{}B", preamble(2, 2, &t));
        let doc = assemble([p1.as_str(), p2.as_str()], 2, &t);

        assert!(doc.starts_with(&preamble(1, 2, &t)));
        assert!(doc.ends_with("A\n\nB\n\n\\end{document}\n"));
        assert_eq!(doc.matches("\\documentclass").count(), 1);
        assert_eq!(doc.matches("\\begin{document}").count(), 1);
        assert_eq!(doc.matches("\\end{document}").count(), 1);
    }
}
