//! Post-processing: deterministic cleanup of an extracted LaTeX body.
//!
//! Models answer with Windows line endings now and then, pad lines with
//! trailing blanks, and occasionally leak zero-width characters copied from
//! their training data. None of that changes what LaTeX renders, but it
//! makes consolidation output noisy and breaks prefix matching on lines that
//! start with an invisible character.
//!
//! Rules (applied in order):
//! 1. Normalise line endings (CRLF / CR → LF)
//! 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
//! 3. Trim trailing whitespace per line
//!
//! The body markers are never touched, so a cleaned body still extracts to
//! itself.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to an extracted body.
pub fn clean_body(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    trim_trailing_whitespace(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip invisible Unicode ──────────────────────────────────────────

static RE_INVISIBLE: Lazy<Regex> =
    Lazy::new(|| Regex::new("[\u{200B}\u{200C}\u{200D}\u{2060}\u{FEFF}\u{00AD}]").unwrap());

fn remove_invisible_chars(input: &str) -> String {
    RE_INVISIBLE.replace_all(input, "").into_owned()
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .split('\n')
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}
