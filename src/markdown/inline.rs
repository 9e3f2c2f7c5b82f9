//! Inline styling: `**bold**` spans are the only recognised emphasis.

use super::Run;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());

/// Split `text` into alternating plain and bold runs, left to right.
///
/// Bold markers are stripped. Empty plain stretches between adjacent bold
/// spans (or at either end) produce no run.
pub fn style(text: &str) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut last = 0;

    for caps in RE_BOLD.captures_iter(text) {
        let (Some(span), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_plain(&mut runs, &text[last..span.start()]);
        runs.push(Run::Bold(inner.as_str().to_string()));
        last = span.end();
    }
    push_plain(&mut runs, &text[last..]);

    runs
}

fn push_plain(runs: &mut Vec<Run>, text: &str) {
    if !text.is_empty() {
        runs.push(Run::Plain(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_in_the_middle() {
        assert_eq!(
            style("Some **bold** word"),
            vec![
                Run::Plain("Some ".into()),
                Run::Bold("bold".into()),
                Run::Plain(" word".into()),
            ]
        );
    }

    #[test]
    fn adjacent_bold_spans_drop_empty_plain() {
        assert_eq!(
            style("**a****b**"),
            vec![Run::Bold("a".into()), Run::Bold("b".into())]
        );
    }

    #[test]
    fn leading_and_trailing_bold() {
        assert_eq!(
            style("**总得分：7** 分"),
            vec![Run::Bold("总得分：7".into()), Run::Plain(" 分".into())]
        );
    }

    #[test]
    fn unmatched_marker_stays_plain() {
        assert_eq!(style("a ** b"), vec![Run::Plain("a ** b".into())]);
    }

    #[test]
    fn empty_text_has_no_runs() {
        assert!(style("").is_empty());
    }
}
