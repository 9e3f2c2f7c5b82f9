//! Segment classification.
//!
//! Rules are tried in a fixed order and the first one that accepts the
//! segment builds the block. Anything no rule accepts becomes a plain
//! paragraph, so classification cannot fail.

use super::inline;
use super::segment::{is_bullet_marker, is_ordinal, ordinal_prefix_len, Segment};
use super::{Block, Run};

/// A rule sees the segment and its merged text, and either builds a block or
/// passes.
type Rule = fn(&Segment<'_>, &str) -> Option<Block>;

const RULES: &[Rule] = &[
    heading,
    bullet_item,
    numbered_item,
    bold_paragraph,
    styled_paragraph,
];

/// Turn one segment into a block.
pub fn classify(segment: &Segment<'_>) -> Block {
    let text = segment.text();
    match RULES.iter().find_map(|rule| rule(segment, &text)) {
        Some(block) => block,
        None => Block::Paragraph {
            runs: vec![Run::Plain(text)],
        },
    }
}

fn heading(_: &Segment<'_>, text: &str) -> Option<Block> {
    let (level, rest) = if let Some(rest) = text.strip_prefix("###") {
        (3, rest)
    } else if let Some(rest) = text.strip_prefix("##") {
        (2, rest)
    } else if let Some(rest) = text.strip_prefix('#') {
        (1, rest)
    } else {
        return None;
    };

    let title = rest.trim();
    let runs = if title.is_empty() {
        Vec::new()
    } else {
        vec![Run::Plain(title.to_string())]
    };
    Some(Block::Heading { level, runs })
}

fn bullet_item(segment: &Segment<'_>, text: &str) -> Option<Block> {
    if !is_bullet_marker(text) {
        return None;
    }
    // Markers are ASCII, so slicing past the first byte is safe.
    let rest = &text[1..];
    let rest = rest.strip_prefix(char::is_whitespace).unwrap_or(rest);

    Some(Block::BulletItem {
        indent: segment.first().level(),
        runs: inline::style(rest),
    })
}

fn numbered_item(segment: &Segment<'_>, text: &str) -> Option<Block> {
    if !is_ordinal(text) {
        return None;
    }
    // The prefix is measured on the first source line; the merged text starts
    // with that line, so the same offset applies.
    let body = ordinal_prefix_len(segment.first().trimmed)
        .and_then(|end| text.get(end..))
        .map(str::trim)
        .unwrap_or(text);

    Some(Block::NumberedItem {
        indent: segment.first().level(),
        runs: inline::style(body),
    })
}

fn bold_paragraph(_: &Segment<'_>, text: &str) -> Option<Block> {
    let inner = text.strip_prefix("**")?.strip_suffix("**")?;
    if inner.contains("**") {
        return None;
    }
    Some(Block::Paragraph {
        runs: vec![Run::Bold(inner.to_string())],
    })
}

fn styled_paragraph(_: &Segment<'_>, text: &str) -> Option<Block> {
    text.contains("**").then(|| Block::Paragraph {
        runs: inline::style(text),
    })
}
