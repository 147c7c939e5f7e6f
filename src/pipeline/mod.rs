//! Pipeline stages for turning page photos into one LaTeX document.
//!
//! Each submodule implements exactly one step. The attempt loop is the only
//! stage that owns control flow; the others are functions it calls.
//!
//! ## Data Flow
//!
//! ```text
//! segment ──▶ transcribe ──▶ postprocess ──▶ document ──▶ consolidate
//! (crop/b64)  (VLM + markers)  (cleanup)     (write+TeX)   (merge pages)
//!                 ▲                              │
//!                 └──────────── attempt ◀────────┘
//! ```
//!
//! 1. [`segment`]     — whole page or overlapping top/bottom slices, base64-encoded
//! 2. [`transcribe`]  — one request per attempt; extract `\section … \end{document}`
//! 3. [`postprocess`] — deterministic text cleanup of the extracted body
//! 4. [`document`]    — page preamble + body on disk, compiled in place
//! 5. [`attempt`]     — request → validate → accept / retry state machine
//! 6. [`consolidate`] — strip boilerplate from every page document and merge

pub mod attempt;
pub mod consolidate;
pub mod document;
pub mod postprocess;
pub mod segment;
pub mod transcribe;
