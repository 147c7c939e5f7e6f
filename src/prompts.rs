//! Instructions sent to the vision model.
//!
//! Every prompt asks the model to answer with a LaTeX body that starts at
//! [`BODY_START_MARKER`] and ends at [`BODY_END_MARKER`]. Extraction in
//! [`crate::pipeline::transcribe`] relies on both markers, so a prompt edit
//! that drops either one breaks every transcription.

use serde::{Deserialize, Serialize};

/// First token of an accepted body.
pub const BODY_START_MARKER: &str = "\\section";

/// Last token of an accepted body.
pub const BODY_END_MARKER: &str = "\\end{document}";

/// Which instruction a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptKind {
    /// A whole page, no context.
    SinglePage,
    /// The top or bottom slice of a page, no context.
    Fragment,
    /// The whole page again, with both fragment transcriptions as context.
    FragmentCombination,
}

/// Transcribe a whole page.
pub const SINGLE_PAGE_PROMPT: &str = "Provide LaTeX completion which reproduces what is shown on the image in latex. \
Start your response with \\section and ending with \\end{document}. \
Be sure to use \\hbox to box final answers. \
Do not converse with a nonexistent user. \
Do not offer corrections, only recreate what is written.";

/// Transcribe one slice of a page.
pub const FRAGMENT_PROMPT: &str = "The image is one part of a handwritten page; the page was cut horizontally \
and neighbouring parts overlap. Provide LaTeX completion which reproduces only what is shown on this part in latex. \
Lines cut at the top or bottom edge may be skipped. \
Start your response with \\section and ending with \\end{document}. \
Be sure to use \\hbox to box final answers. \
Do not converse with a nonexistent user. \
Do not offer corrections, only recreate what is written.";

/// Transcribe the whole page, guided by the two fragment transcriptions.
pub const FRAGMENT_COMBINATION_PROMPT: &str = "The image shows a full handwritten page. \
Two transcriptions of its overlapping top and bottom parts are provided as context. \
Combine them into one LaTeX completion reproducing the whole page, \
using the image to resolve the overlap and any disagreement between the parts. \
Start your response with \\section and ending with \\end{document}. \
Be sure to use \\hbox to box final answers. \
Do not converse with a nonexistent user. \
Do not offer corrections, only recreate what is written.";

/// The instruction for `kind`.
pub fn instruction(kind: PromptKind) -> &'static str {
    match kind {
        PromptKind::SinglePage => SINGLE_PAGE_PROMPT,
        PromptKind::Fragment => FRAGMENT_PROMPT,
        PromptKind::FragmentCombination => FRAGMENT_COMBINATION_PROMPT,
    }
}

/// Context message carrying both fragment transcriptions.
///
/// Sent ahead of the page preamble in a fragment-combination request.
pub fn fragment_combination_context(top: &str, bottom: &str) -> String {
    format!(
        "Transcription of the top part of the page:\n\n\"\"\"{}\"\"\"\n\n\
Transcription of the bottom part of the page:\n\n\"\"\"{}\"\"\"",
        top, bottom
    )
}
