//! Line splitting and segment boundaries.
//!
//! A segment is the run of source lines that becomes one output block. Most
//! segments are a single line; the exception is a list item whose commentary
//! wraps onto following unmarked lines, which are folded into the item.
//!
//! The boundary decision is a pure function of the line array and a start
//! index ([`segment_len`]), so the merge rule can be tested without going
//! through classification.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_ORDINAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\.").unwrap());

/// One input row with its indentation pre-computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line<'a> {
    /// The row exactly as it appeared in the input (without the newline).
    pub raw: &'a str,
    /// Count of leading whitespace characters in `raw`.
    pub indent: usize,
    /// `raw` with leading and trailing whitespace removed.
    pub trimmed: &'a str,
}

impl<'a> Line<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            indent: raw.chars().take_while(|c| c.is_whitespace()).count(),
            trimmed: raw.trim(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.trimmed.is_empty()
    }

    pub fn is_heading(&self) -> bool {
        self.trimmed.starts_with('#')
    }

    pub fn is_bullet(&self) -> bool {
        is_bullet_marker(self.trimmed)
    }

    pub fn is_numbered(&self) -> bool {
        is_ordinal(self.trimmed)
    }

    pub fn is_list_item(&self) -> bool {
        self.is_bullet() || self.is_numbered()
    }

    /// List nesting level: two whitespace characters per level, truncated.
    pub fn level(&self) -> usize {
        self.indent / 2
    }
}

/// `-` or `*` followed by whitespace (or nothing at all).
///
/// The trailing-whitespace requirement keeps `**bold**` lines and `---`
/// rules out of the bullet branch.
pub(crate) fn is_bullet_marker(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some('-') | Some('*') => chars.next().is_none_or(char::is_whitespace),
        _ => false,
    }
}

/// `<digits>.` at the start of the text, after optional whitespace.
pub(crate) fn is_ordinal(text: &str) -> bool {
    RE_ORDINAL.is_match(text)
}

/// Byte length of the `<digits>.` prefix, if `text` has one.
pub(crate) fn ordinal_prefix_len(text: &str) -> Option<usize> {
    RE_ORDINAL.find(text).map(|m| m.end())
}

/// Split text into lines. Both `\n` and `\r\n` terminate a line.
pub fn split_lines(text: &str) -> Vec<Line<'_>> {
    text.lines().map(Line::new).collect()
}

/// How many lines the segment starting at `start` consumes.
///
/// Returns 0 when `start` is out of range or points at a blank line, since
/// blank lines never start a segment. Only list items absorb the lines that
/// follow them, and only while those lines are non-blank, non-heading and
/// not themselves list items.
pub fn segment_len(lines: &[Line<'_>], start: usize) -> usize {
    let Some(first) = lines.get(start) else {
        return 0;
    };
    if first.is_blank() {
        return 0;
    }
    if !first.is_list_item() {
        return 1;
    }
    1 + lines[start + 1..]
        .iter()
        .take_while(|line| is_continuation(line))
        .count()
}

fn is_continuation(line: &Line<'_>) -> bool {
    !line.is_blank() && !line.is_heading() && !line.is_list_item()
}

/// A contiguous, non-empty slice of lines forming one logical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Index of the first line in the source.
    pub start: usize,
    lines: &'a [Line<'a>],
}

impl<'a> Segment<'a> {
    /// The line whose shape decides the block kind.
    pub fn first(&self) -> &Line<'a> {
        &self.lines[0]
    }

    pub fn lines(&self) -> &'a [Line<'a>] {
        self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Trimmed text of every line, joined by single spaces.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.trimmed)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Walk the lines once and cut them into segments, skipping blank lines.
pub fn segments<'a>(lines: &'a [Line<'a>]) -> Vec<Segment<'a>> {
    let mut out = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let len = segment_len(lines, i);
        if len == 0 {
            i += 1;
            continue;
        }
        out.push(Segment {
            start: i,
            lines: &lines[i..i + len],
        });
        i += len;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_indent_counts_leading_whitespace() {
        let line = Line::new("   - item");
        assert_eq!(line.indent, 3);
        assert_eq!(line.level(), 1);
        assert_eq!(line.trimmed, "- item");

        assert_eq!(Line::new(" x").level(), 0);
        assert_eq!(Line::new("\t\tx").level(), 1);
    }

    #[test]
    fn bullet_marker_needs_whitespace() {
        assert!(is_bullet_marker("- a"));
        assert!(is_bullet_marker("* a"));
        assert!(is_bullet_marker("-"));
        assert!(!is_bullet_marker("**bold**"));
        assert!(!is_bullet_marker("---"));
        assert!(!is_bullet_marker("-5 degrees"));
    }

    #[test]
    fn ordinal_prefix() {
        assert!(is_ordinal("12. twelve"));
        assert!(is_ordinal("3."));
        assert!(!is_ordinal("a. letter"));
        assert_eq!(ordinal_prefix_len("12. twelve"), Some(3));
        assert_eq!(ordinal_prefix_len("twelve"), None);
    }

    #[test]
    fn plain_lines_are_single_segments() {
        let lines = split_lines("one\ntwo\nthree");
        assert_eq!(segment_len(&lines, 0), 1);
        assert_eq!(segments(&lines).len(), 3);
    }

    #[test]
    fn list_item_absorbs_wrapped_lines() {
        let lines = split_lines("- point one\ncontinued text\nand more\n\nafter");
        assert_eq!(segment_len(&lines, 0), 3);

        let segs = segments(&lines);
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].text(), "- point one continued text and more");
        assert_eq!(segs[1].start, 4);
    }

    #[test]
    fn continuation_stops_at_list_heading_and_blank() {
        let lines = split_lines("1. first\n2. second");
        assert_eq!(segment_len(&lines, 0), 1);

        let lines = split_lines("- item\n# Heading");
        assert_eq!(segment_len(&lines, 0), 1);

        let lines = split_lines("- item\n\nwrapped?");
        assert_eq!(segment_len(&lines, 0), 1);

        let lines = split_lines("- item\n  * nested");
        assert_eq!(segment_len(&lines, 0), 1);
    }

    #[test]
    fn blank_and_out_of_range_starts_consume_nothing() {
        let lines = split_lines("a\n   \nb");
        assert_eq!(segment_len(&lines, 1), 0);
        assert_eq!(segment_len(&lines, 9), 0);
    }

    #[test]
    fn every_non_blank_line_lands_in_one_segment() {
        let input = "# T\n\n- a\nwrap\n* b\n  1. c\nmore\n\ntext\n**bold**\n";
        let lines = split_lines(input);
        let segs = segments(&lines);

        let covered: usize = segs.iter().map(Segment::len).sum();
        let non_blank = lines.iter().filter(|l| !l.is_blank()).count();
        assert_eq!(covered, non_blank);

        // Segments are ordered and disjoint.
        for pair in segs.windows(2) {
            assert!(pair[0].start + pair[0].len() <= pair[1].start);
        }
    }
}
