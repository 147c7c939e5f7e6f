//! Consolidator behaviour over page documents on disk.

mod common;

use common::FakeCompiler;
use handwrite2tex::pipeline::consolidate::{assemble, strip_boilerplate, CONSOLIDATED_TEX};
use handwrite2tex::pipeline::document::{
    artifact_paths, attempt_paths, is_boilerplate, preamble, write_document, BOILERPLATE_PREFIXES,
    BOILERPLATE_REVISION,
};
use handwrite2tex::{consolidate, TitleBlock};
use std::path::Path;
use tempfile::TempDir;

const STEMS: [&str; 3] = [
    "signal-2024-01-01-120000",
    "signal-2024-01-01-120000_001",
    "signal-2024-01-01-130500",
];

fn write_pages(dir: &Path, bodies: &[&str], title: &TitleBlock) {
    for (i, (stem, body)) in STEMS.iter().zip(bodies).enumerate() {
        let ordinal = i + 1;
        let (tex, pdf) = artifact_paths(dir, stem, None);
        write_document(&tex, &pdf, ordinal, &preamble(ordinal, 4, title), body).unwrap();
    }
}

fn body_region<'a>(doc: &'a str, title: &TitleBlock) -> &'a str {
    doc.strip_prefix(preamble(1, 4, title).as_str())
        .and_then(|rest| rest.strip_suffix("\\end{document}\n"))
        .expect("consolidated document is preamble + body + end marker")
}

#[tokio::test]
async fn three_pages_merge_in_order() {
    let dir = TempDir::new().unwrap();
    let title = TitleBlock::default();
    write_pages(dir.path(), &["A", "B", "C"], &title);

    let merged = consolidate(dir.path(), 4, &title, &FakeCompiler::default())
        .await
        .unwrap();

    assert_eq!(merged.tex_path, dir.path().join(CONSOLIDATED_TEX));
    assert_eq!(merged.sources.len(), 3);
    assert!(merged.compiled);
    assert!(merged.pdf_path.exists());
    let doc = std::fs::read_to_string(&merged.tex_path).unwrap();
    assert_eq!(body_region(&doc, &title), "A\n\nB\n\nC\n\n");
}

#[tokio::test]
async fn compile_failure_is_reported_not_fatal() {
    let dir = TempDir::new().unwrap();
    let title = TitleBlock::default();
    write_pages(dir.path(), &["A"], &title);

    let merged = consolidate(dir.path(), 4, &title, &FakeCompiler::scripted([true]))
        .await
        .unwrap();

    assert!(!merged.compiled);
    assert!(merged.tex_path.exists());
}

#[tokio::test]
async fn rerun_ignores_previous_output_fragments_and_attempts() {
    let dir = TempDir::new().unwrap();
    let title = TitleBlock::default();
    write_pages(dir.path(), &["A", "B"], &title);
    let (tex, pdf) = artifact_paths(dir.path(), STEMS[0], Some("top"));
    write_document(&tex, &pdf, 1, &preamble(1, 4, &title), "TOP ONLY").unwrap();
    let (page_tex, _) = artifact_paths(dir.path(), STEMS[1], None);
    let (tex, pdf) = attempt_paths(&page_tex);
    write_document(&tex, &pdf, 2, &preamble(2, 4, &title), "UNACCEPTED").unwrap();

    let compiler = FakeCompiler::default();
    let first = consolidate(dir.path(), 4, &title, &compiler).await.unwrap();
    let second = consolidate(dir.path(), 4, &title, &compiler).await.unwrap();

    assert_eq!(first.sources, second.sources);
    let doc = std::fs::read_to_string(&second.tex_path).unwrap();
    assert_eq!(body_region(&doc, &title), "A\n\nB\n\n");
}

#[test]
fn restripping_removes_nothing_more() {
    let title = TitleBlock {
        author: "Ada".into(),
        course: "Analysis".into(),
    };
    let pages: Vec<String> = ["x = 1\n\ny = 2", "\\section{Two}\nz", "w"]
        .iter()
        .enumerate()
        .map(|(i, body)| format!("{}{}\n\\end{{document}}\n", preamble(i + 1, 2, &title), body))
        .collect();

    let bodies: String = pages.iter().map(|p| strip_boilerplate(p)).collect();
    let doc = assemble(pages.iter().map(String::as_str), 2, &title);

    let kept: Vec<&str> = doc.lines().filter(|l| !is_boilerplate(l)).collect();
    assert_eq!(kept, bodies.lines().collect::<Vec<_>>());
}

#[test]
fn consolidating_a_consolidated_file_keeps_one_preamble() {
    let title = TitleBlock::default();
    let page = format!("{}A\n", preamble(1, 1, &title));
    let once = assemble([page.as_str()], 1, &title);
    let twice = assemble([once.as_str()], 1, &title);

    for marker in ["\\documentclass", "\\begin{document}", "\\maketitle", "\\end{document}"] {
        assert_eq!(twice.matches(marker).count(), 1, "{marker}");
    }
    assert_eq!(
        twice.lines().filter(|l| !is_boilerplate(l) && !l.is_empty()).collect::<Vec<_>>(),
        vec!["A"]
    );
}

#[test]
fn every_preamble_line_is_boilerplate() {
    let title = TitleBlock::default();
    for ordinal in 1..=3 {
        for line in preamble(ordinal, 7, &title).lines() {
            assert!(is_boilerplate(line), "page {ordinal}: {line:?}");
        }
    }
    // Changing the prefix list means bumping the revision alongside it.
    assert_eq!((BOILERPLATE_REVISION, BOILERPLATE_PREFIXES.len()), (2, 13));
}
