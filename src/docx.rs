//! Word document output for classified report blocks.
//!
//! [`render_blocks`] walks a block list and drives any [`DocumentSink`]; the
//! sink only needs the four operations a report uses. [`DocxWriter`] is the
//! production sink, built on `docx-rs`.
//!
//! Every run the writer emits gets the same East-Asian body font and point
//! size, whatever block it belongs to. That rule is fixed: Chinese commentary
//! mixed with English quotations has to render in one consistent face.

use crate::error::GradeError;
use crate::markdown::{Block, Run};
use docx_rs::{
    AbstractNumbering, Docx, IndentLevel, Level, LevelJc, LevelText, NumberFormat, Numbering,
    NumberingId, Paragraph, Run as DocxRun, RunFonts, SpecialIndentType, Start, Style, StyleType,
};
use std::io::Cursor;
use tracing::debug;

/// Body font applied to every run (SimSun).
pub const BODY_FONT: &str = "宋体";

/// Body size in points applied to every run.
pub const BODY_SIZE_PT: usize = 12;

/// Deepest list level Word numbering definitions support.
const MAX_LIST_LEVEL: usize = 8;

/// Per-level list indentation, in twentieths of a point.
const LIST_INDENT_TWIPS: i32 = 420;

const BULLET_NUMBERING_ID: usize = 1;

/// The operations a report needs from a document backend.
pub trait DocumentSink {
    fn add_heading(&mut self, text: &str, level: u8);
    fn add_paragraph(&mut self, runs: &[Run]);
    fn add_bulleted_item(&mut self, runs: &[Run], indent: usize);
    fn add_numbered_item(&mut self, runs: &[Run], indent: usize);
}

/// Feed blocks to a sink in order.
pub fn render_blocks<S: DocumentSink + ?Sized>(blocks: &[Block], sink: &mut S) {
    for block in blocks {
        match block {
            Block::Heading { level, .. } => sink.add_heading(&block.plain_text(), *level),
            Block::BulletItem { indent, runs } => sink.add_bulleted_item(runs, *indent),
            Block::NumberedItem { indent, runs } => sink.add_numbered_item(runs, *indent),
            Block::Paragraph { runs } => sink.add_paragraph(runs),
        }
    }
}

/// A [`DocumentSink`] that builds a `.docx` package.
///
/// Numbered items share one counter until the next heading; each heading
/// starts a fresh numbering definition so sections count from 1 again.
pub struct DocxWriter {
    docx: Docx,
    next_numbering_id: usize,
    numbered_list: Option<usize>,
    paragraphs: usize,
}

impl Default for DocxWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocxWriter {
    pub fn new() -> Self {
        let docx = Docx::new()
            .default_fonts(body_fonts())
            .default_size(BODY_SIZE_PT * 2)
            .add_style(heading_style(1))
            .add_style(heading_style(2))
            .add_style(heading_style(3))
            .add_abstract_numbering(list_definition(BULLET_NUMBERING_ID, ListKind::Bullet))
            .add_numbering(Numbering::new(BULLET_NUMBERING_ID, BULLET_NUMBERING_ID));

        Self {
            docx,
            next_numbering_id: BULLET_NUMBERING_ID + 1,
            numbered_list: None,
            paragraphs: 0,
        }
    }

    /// Number of paragraphs added so far.
    pub fn paragraph_count(&self) -> usize {
        self.paragraphs
    }

    /// Pack the document into `.docx` bytes.
    pub fn finish(self) -> Result<Vec<u8>, GradeError> {
        let mut buf = Cursor::new(Vec::new());
        self.docx
            .build()
            .pack(&mut buf)
            .map_err(|e| GradeError::DocumentBuildFailed(e.to_string()))?;
        let bytes = buf.into_inner();
        debug!(
            "Packed {} paragraphs into {} bytes of docx",
            self.paragraphs,
            bytes.len()
        );
        Ok(bytes)
    }

    fn push(&mut self, paragraph: Paragraph) {
        let docx = std::mem::take(&mut self.docx);
        self.docx = docx.add_paragraph(paragraph);
        self.paragraphs += 1;
    }

    fn numbered_list_id(&mut self) -> usize {
        if let Some(id) = self.numbered_list {
            return id;
        }
        let id = self.next_numbering_id;
        self.next_numbering_id += 1;

        let docx = std::mem::take(&mut self.docx);
        self.docx = docx
            .add_abstract_numbering(list_definition(id, ListKind::Decimal))
            .add_numbering(Numbering::new(id, id));
        self.numbered_list = Some(id);
        id
    }
}

impl DocumentSink for DocxWriter {
    fn add_heading(&mut self, text: &str, level: u8) {
        let level = level.clamp(1, 3);
        self.numbered_list = None;
        let paragraph = Paragraph::new()
            .style(&format!("Heading{level}"))
            .add_run(styled_run(text, false));
        self.push(paragraph);
    }

    fn add_paragraph(&mut self, runs: &[Run]) {
        self.push(with_runs(Paragraph::new(), runs));
    }

    fn add_bulleted_item(&mut self, runs: &[Run], indent: usize) {
        let paragraph = Paragraph::new().numbering(
            NumberingId::new(BULLET_NUMBERING_ID),
            IndentLevel::new(indent.min(MAX_LIST_LEVEL)),
        );
        self.push(with_runs(paragraph, runs));
    }

    fn add_numbered_item(&mut self, runs: &[Run], indent: usize) {
        let id = self.numbered_list_id();
        let paragraph = Paragraph::new().numbering(
            NumberingId::new(id),
            IndentLevel::new(indent.min(MAX_LIST_LEVEL)),
        );
        self.push(with_runs(paragraph, runs));
    }
}

/// Classify `markdown` and lay it out as `.docx` bytes.
pub fn markdown_to_docx_bytes(markdown: &str) -> Result<Vec<u8>, GradeError> {
    let blocks = crate::markdown::parse(markdown);
    let mut writer = DocxWriter::new();
    render_blocks(&blocks, &mut writer);
    writer.finish()
}

// ── Styling helpers ──────────────────────────────────────────────────────

fn body_fonts() -> RunFonts {
    RunFonts::new()
        .ascii(BODY_FONT)
        .hi_ansi(BODY_FONT)
        .east_asia(BODY_FONT)
}

fn styled_run(text: &str, bold: bool) -> DocxRun {
    let run = DocxRun::new()
        .add_text(text)
        .fonts(body_fonts())
        .size(BODY_SIZE_PT * 2);
    if bold {
        run.bold()
    } else {
        run
    }
}

fn with_runs(paragraph: Paragraph, runs: &[Run]) -> Paragraph {
    runs.iter().fold(paragraph, |p, run| {
        p.add_run(styled_run(run.text(), run.is_bold()))
    })
}

fn heading_style(level: u8) -> Style {
    Style::new(&format!("Heading{level}"), StyleType::Paragraph)
        .name(&format!("Heading {level}"))
        .bold()
}

#[derive(Clone, Copy)]
enum ListKind {
    Bullet,
    Decimal,
}

fn list_definition(id: usize, kind: ListKind) -> AbstractNumbering {
    (0..=MAX_LIST_LEVEL).fold(AbstractNumbering::new(id), |def, lvl| {
        let (format, text) = match kind {
            ListKind::Bullet => ("bullet", "•".to_string()),
            ListKind::Decimal => ("decimal", format!("%{}.", lvl + 1)),
        };
        let left = LIST_INDENT_TWIPS * (lvl as i32 + 1);
        def.add_level(
            Level::new(
                lvl,
                Start::new(1),
                NumberFormat::new(format),
                LevelText::new(&text),
                LevelJc::new("left"),
            )
            .indent(
                Some(left),
                Some(SpecialIndentType::Hanging(LIST_INDENT_TWIPS)),
                None,
                None,
            ),
        )
    })
}
