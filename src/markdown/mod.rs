//! Markdown classification for grading reports.
//!
//! The scoring model answers in a narrow Markdown dialect: ATX headings up to
//! `###`, `-`/`*` bullets, `1.` ordered items, `**bold**` spans and plain
//! paragraphs. This module turns such text into an ordered list of [`Block`]s
//! that [`crate::docx`] can lay out. Anything outside the dialect (tables,
//! fences, links, quotes) comes through as plain paragraph text.
//!
//! ```text
//! &str ──▶ split_lines ──▶ segments ──▶ classify ──▶ Vec<Block>
//! ```
//!
//! [`parse`] is a pure function: no I/O, no shared state, same output for the
//! same input.

pub mod classify;
pub mod inline;
pub mod segment;

use serde::{Deserialize, Serialize};

/// An inline-styled stretch of block text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Run {
    Plain(String),
    Bold(String),
}

impl Run {
    pub fn text(&self) -> &str {
        match self {
            Run::Plain(s) | Run::Bold(s) => s,
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, Run::Bold(_))
    }
}

/// One classified output unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    /// `#`, `##` or `###` heading; `level` is 1–3.
    Heading { level: u8, runs: Vec<Run> },
    /// `-` or `*` list item; `indent` is the nesting level (whitespace / 2).
    BulletItem { indent: usize, runs: Vec<Run> },
    /// `<digits>.` list item with the ordinal stripped.
    NumberedItem { indent: usize, runs: Vec<Run> },
    Paragraph { runs: Vec<Run> },
}

impl Block {
    pub fn runs(&self) -> &[Run] {
        match self {
            Block::Heading { runs, .. }
            | Block::BulletItem { runs, .. }
            | Block::NumberedItem { runs, .. }
            | Block::Paragraph { runs } => runs,
        }
    }

    /// Concatenated run text with styling dropped.
    pub fn plain_text(&self) -> String {
        self.runs().iter().map(Run::text).collect()
    }
}

/// Classify a Markdown string into blocks, in source order.
pub fn parse(markdown: &str) -> Vec<Block> {
    let lines = segment::split_lines(markdown);
    segment::segments(&lines)
        .iter()
        .map(classify::classify)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> Run {
        Run::Plain(s.to_string())
    }

    #[test]
    fn title_heading() {
        assert_eq!(
            parse("# Title"),
            vec![Block::Heading {
                level: 1,
                runs: vec![plain("Title")]
            }]
        );
    }

    #[test]
    fn bullet_with_wrapped_commentary() {
        assert_eq!(
            parse("- point one\ncontinued text"),
            vec![Block::BulletItem {
                indent: 0,
                runs: vec![plain("point one continued text")]
            }]
        );
    }

    #[test]
    fn consecutive_numbered_items_stay_separate() {
        assert_eq!(
            parse("1. first\n2. second"),
            vec![
                Block::NumberedItem {
                    indent: 0,
                    runs: vec![plain("first")]
                },
                Block::NumberedItem {
                    indent: 0,
                    runs: vec![plain("second")]
                },
            ]
        );
    }

    #[test]
    fn inline_bold_paragraph() {
        assert_eq!(
            parse("Some **bold** word"),
            vec![Block::Paragraph {
                runs: vec![plain("Some "), Run::Bold("bold".into()), plain(" word")]
            }]
        );
    }

    #[test]
    fn nested_bullet() {
        assert_eq!(
            parse("  - nested item"),
            vec![Block::BulletItem {
                indent: 1,
                runs: vec![plain("nested item")]
            }]
        );
    }

    #[test]
    fn blank_line_separates_paragraphs() {
        assert_eq!(
            parse("first paragraph\n\nsecond paragraph"),
            vec![
                Block::Paragraph {
                    runs: vec![plain("first paragraph")]
                },
                Block::Paragraph {
                    runs: vec![plain("second paragraph")]
                },
            ]
        );
    }

    #[test]
    fn adjacent_plain_lines_are_not_merged() {
        assert_eq!(parse("line one\nline two").len(), 2);
    }

    #[test]
    fn empty_and_blank_input() {
        assert!(parse("").is_empty());
        assert!(parse("\n   \n\t\n").is_empty());
    }

    #[test]
    fn odd_indents_truncate() {
        let blocks = parse(" - one space\n   - three spaces\n    - four spaces");
        let indents: Vec<usize> = blocks
            .iter()
            .map(|b| match b {
                Block::BulletItem { indent, .. } => *indent,
                other => panic!("unexpected block {other:?}"),
            })
            .collect();
        assert_eq!(indents, vec![0, 1, 2]);
    }

    #[test]
    fn parse_is_repeatable() {
        let input = "### 二：详细点评\n\n1. **总体评价**\n\n- 主题聚焦\n较好\n";
        assert_eq!(parse(input), parse(input));
    }

    #[test]
    fn crlf_input() {
        assert_eq!(
            parse("# A\r\n- b\r\n"),
            vec![
                Block::Heading {
                    level: 1,
                    runs: vec![plain("A")]
                },
                Block::BulletItem {
                    indent: 0,
                    runs: vec![plain("b")]
                },
            ]
        );
    }

    #[test]
    fn no_text_is_lost() {
        let input = "### 评分\n- 任务完成与内容：3\n说明文字\n**总得分：7**\n\n普通段落";
        let blocks = parse(input);
        let text: String = blocks.iter().map(Block::plain_text).collect();
        for word in ["评分", "任务完成与内容：3", "说明文字", "总得分：7", "普通段落"] {
            assert!(text.contains(word), "missing {word:?} in {text:?}");
        }
    }

    #[test]
    fn scoring_report_shape() {
        let report = "\
### 一：评分环节

- 任务完成与内容：3
- 结构与连贯性：2
- 语言能力：2
- **总得分：7**

### 二：详细点评

1. **总体评价**

- 主题较为集中，首尾呼应
不够紧密

2. **内容评价**
";
        let blocks = parse(report);
        assert_eq!(blocks.len(), 9);
        assert!(matches!(blocks[0], Block::Heading { level: 3, .. }));
        assert_eq!(
            blocks[4],
            Block::BulletItem {
                indent: 0,
                runs: vec![Run::Bold("总得分：7".into())]
            }
        );
        assert_eq!(
            blocks[7],
            Block::BulletItem {
                indent: 0,
                runs: vec![plain("主题较为集中，首尾呼应 不够紧密")]
            }
        );
        assert!(matches!(blocks[8], Block::NumberedItem { .. }));
    }
}
