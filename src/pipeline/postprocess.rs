//! Post-processing: deterministic cleanup of model output.
//!
//! Models wrap answers in code fences despite being told not to, mix CRLF
//! into their output and scatter zero-width characters. These passes fix
//! that without touching content. Transcripts and reports share most of
//! them; only reports get heading spacing, since a student's `#3` at the
//! start of a line is not a heading.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised (the fence regex
//! expects a clean first line after trimming), and the final-newline pass
//! always runs last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Clean a handwriting transcript.
///
/// 1. Strip outer code fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse 3+ consecutive blank lines down to 2
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 6. Ensure the text ends with exactly one newline
pub fn clean_transcript(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

/// Clean a scoring report: the transcript rules plus a blank line before
/// every heading.
pub fn clean_report(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

// ── Outer fences ─────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```(?:markdown|md|text|plaintext)?\r?\n(.*?)\r?\n```\s*$").unwrap()
});

fn strip_outer_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Whitespace ───────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").into_owned()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Headings ─────────────────────────────────────────────────────────────────

/// Blank line before each heading, except at the very start.
fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    for (i, line) in input.lines().enumerate() {
        if i > 0 && line.starts_with('#') {
            let kept = result.trim_end_matches('\n').len();
            result.truncate(kept);
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Invisible characters ─────────────────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fence() {
        let input = "```markdown\n### 一：评分环节\n- 语言能力：2\n```";
        assert_eq!(strip_outer_fences(input), "### 一：评分环节\n- 语言能力：2");
    }

    #[test]
    fn strips_bare_and_text_fences() {
        assert_eq!(strip_outer_fences("```\nI like apple.\n```"), "I like apple.");
        assert_eq!(strip_outer_fences("```text\nI like apple.\n```"), "I like apple.");
    }

    #[test]
    fn inner_fences_are_left_alone() {
        let input = "Intro\n```\ncode\n```";
        assert_eq!(strip_outer_fences(input), input);
    }

    #[test]
    fn line_endings_and_trailing_whitespace() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(trim_trailing_whitespace("  hi   \nyou  "), "  hi\nyou");
    }

    #[test]
    fn blank_runs_collapse_to_two() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn final_newline() {
        assert_eq!(ensure_final_newline("essay"), "essay\n");
        assert_eq!(ensure_final_newline("essay\n\n\n"), "essay\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn heading_gets_blank_line_before_it() {
        let out = normalise_heading_spacing("- **总得分：7**\n### 二：详细点评\n1. **总体评价**");
        assert_eq!(out, "- **总得分：7**\n\n### 二：详细点评\n1. **总体评价**\n");
    }

    #[test]
    fn invisible_characters_removed() {
        assert_eq!(remove_invisible_chars("I\u{200B} like\u{FEFF} it"), "I like it");
    }

    #[test]
    fn transcript_keeps_hash_lines_in_place() {
        let out = clean_transcript("My plan:\n#1 get up early\r\n");
        assert_eq!(out, "My plan:\n#1 get up early\n");
    }

    #[test]
    fn report_full_pipeline() {
        let input = "```markdown\n### 一：评分环节\r\n- 任务完成与内容：3   \n\n\n\n\n\n### 二：详细点评\n```";
        let out = clean_report(input);
        assert!(out.starts_with("### 一：评分环节\n"));
        assert!(out.ends_with("### 二：详细点评\n"));
        assert!(!out.contains("\n\n\n\n"));
        assert!(!out.contains('\r'));
    }
}
