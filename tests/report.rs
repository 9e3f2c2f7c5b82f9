//! Report rendering tests: scoring Markdown in, `.docx` out.
//!
//! No network, no pdfium. These run everywhere.

use pdf2grade::pipeline::artifacts::{report_paths_for_text, write_atomic};
use pdf2grade::{
    markdown_to_docx, markdown_to_docx_bytes, parse, render_blocks, Block, DocumentSink, DocxWriter,
    Run,
};
use std::path::Path;

/// A report shaped like the scoring model's answer, with the essay appended.
const REPORT: &str = "\
### 一：评分环节

- 任务完成与内容：3
- 结构与连贯性：2
- 语言能力：2
- **总得分：7**

### 二：详细点评

1. **总体评价**
  - 紧扣主题但论证略显单薄，结尾可以再呼应开头
2. **语言形式评价**
  - \"used to exercise\" → 应为 \"as exercise\"
  - 拼写错误较多，注意 **because** 的拼写

### 原文

I think sport is very important.
It make us healthy.

So we should do it every day.
";

#[derive(Default)]
struct Outline(Vec<String>);

impl DocumentSink for Outline {
    fn add_heading(&mut self, text: &str, level: u8) {
        self.0.push(format!("H{level}:{text}"));
    }
    fn add_paragraph(&mut self, runs: &[Run]) {
        self.0.push(format!("P:{}", runs.len()));
    }
    fn add_bulleted_item(&mut self, _runs: &[Run], indent: usize) {
        self.0.push(format!("UL{indent}"));
    }
    fn add_numbered_item(&mut self, _runs: &[Run], indent: usize) {
        self.0.push(format!("OL{indent}"));
    }
}

#[test]
fn scoring_report_outline() {
    let blocks = parse(REPORT);
    let mut outline = Outline::default();
    render_blocks(&blocks, &mut outline);

    assert_eq!(
        outline.0,
        vec![
            "H3:一：评分环节",
            "UL0",
            "UL0",
            "UL0",
            "UL0",
            "H3:二：详细点评",
            "OL0",
            "UL1",
            "OL0",
            "UL1",
            "UL1",
            "H3:原文",
            "P:1",
            "P:1",
            "P:1",
        ]
    );
}

#[test]
fn bold_spans_survive_into_runs() {
    let blocks = parse(REPORT);

    assert_eq!(
        blocks[4],
        Block::BulletItem {
            indent: 0,
            runs: vec![Run::Bold("总得分：7".into())],
        }
    );

    let spelling = blocks
        .iter()
        .find(|b| b.plain_text().starts_with("拼写错误"))
        .expect("spelling comment present");
    assert_eq!(
        spelling.runs(),
        &[
            Run::Plain("拼写错误较多，注意 ".into()),
            Run::Bold("because".into()),
            Run::Plain(" 的拼写".into()),
        ]
    );
}

#[test]
fn essay_lines_are_separate_paragraphs() {
    let blocks = parse(REPORT);
    let tail: Vec<String> = blocks[blocks.len() - 3..]
        .iter()
        .map(Block::plain_text)
        .collect();
    assert_eq!(
        tail,
        vec![
            "I think sport is very important.",
            "It make us healthy.",
            "So we should do it every day.",
        ]
    );
}

#[test]
fn parse_is_deterministic_across_threads() {
    let expected = parse(REPORT);
    let handles: Vec<_> = (0..4).map(|_| std::thread::spawn(|| parse(REPORT))).collect();
    for handle in handles {
        assert_eq!(handle.join().expect("thread"), expected);
    }
}

#[test]
fn writer_emits_one_paragraph_per_block() {
    let blocks = parse(REPORT);
    let mut writer = DocxWriter::new();
    render_blocks(&blocks, &mut writer);
    assert_eq!(writer.paragraph_count(), blocks.len());

    let bytes = writer.finish().expect("docx");
    assert!(bytes.starts_with(b"PK"));
}

#[test]
fn malformed_markdown_still_renders() {
    let input = "####### too deep\n**unclosed bold\n- \n12.\n*";
    let bytes = markdown_to_docx_bytes(input).expect("never fails on odd input");
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn transcript_to_report_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let transcript = dir.path().join("homework_page_1_text.txt");
    std::fs::write(&transcript, "I think sport is very important.\n").expect("write");

    let (md_path, docx_path) = report_paths_for_text(&transcript, dir.path());
    write_atomic(&md_path, REPORT.as_bytes())
        .await
        .expect("write md");
    markdown_to_docx(REPORT, &docx_path).await.expect("write docx");

    assert_eq!(
        file_name(&md_path),
        "homework_page_1_score_and_comment.md"
    );
    assert_eq!(
        file_name(&docx_path),
        "homework_page_1_score_and_comment.docx"
    );
    assert_eq!(std::fs::read_to_string(&md_path).expect("read"), REPORT);
    let docx = std::fs::read(&docx_path).expect("read");
    assert!(docx.starts_with(b"PK"));
    assert!(String::from_utf8_lossy(&docx).contains("word/document.xml"));
}

#[tokio::test]
async fn unwritable_target_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    // A regular file cannot be used as a parent directory.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"x").expect("write");

    let err = markdown_to_docx("# 标题", blocker.join("report.docx"))
        .await
        .expect_err("parent is a file");
    assert!(err.to_string().contains("report.docx"), "got: {err}");
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
