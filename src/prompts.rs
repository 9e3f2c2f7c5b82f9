//! Prompts for the two LLM calls of a grading run.
//!
//! Both prompts can be replaced through [`crate::config::GradingConfig`]; the
//! constants here are used only when no override is set.

/// Placeholder replaced by the transcribed essay in the scoring prompt.
pub const ESSAY_PLACEHOLDER: &str = "{essay}";

/// Default system prompt for transcribing a handwritten page image.
pub const DEFAULT_TRANSCRIPTION_PROMPT: &str = r#"You are transcribing a scanned page of handwritten student homework.

Follow these rules precisely:

1. Output the handwritten text exactly as written. This is work to be graded:
   keep the student's spelling and grammar mistakes, do not correct them.
2. Words struck through with black pen were deleted by the student. Leave
   them out.
3. Red pen marks are teacher annotations. Ignore them as if they were not
   on the page.
4. Keep the student's paragraph breaks. Join lines that only wrap because
   the page ran out of width.
5. Output ONLY the transcribed text. No commentary, no explanations, no
   code fences."#;

/// Default scoring rubric. `{essay}` is replaced by the transcript.
pub const DEFAULT_SCORING_PROMPT: &str = r####"## Role

You are an experienced, warm secondary-school English teacher.

## Hard rules

1. The answer contains exactly two sections, "### 一：评分环节" and
   "### 二：详细点评". No greeting, no closing remarks.
2. Each comment in section two is one line of 28–32 Chinese characters,
   without final punctuation. Write "无" when there is nothing to say.
3. Language-form comments may exceed that length: list each error and its
   correction on its own line, e.g. "used to exercise" → 应为 "as exercise".
4. Be kind and encouraging, but name concrete improvements.
5. Score strictly: when in doubt, choose the lower score.
6. Use plain Markdown: `###` headings, `-` bullets, `1.` numbered items and
   `**bold**`. No tables.

## 一：评分环节 (15 points)

- 任务完成与内容 (task completion and content): 0–5
- 结构与连贯性 (structure and coherence): 0–5
- 语言能力 (language ability): 0–5
- **总得分** (total): 0–15

Output format:

- 任务完成与内容：3
- 结构与连贯性：2
- 语言能力：2
- **总得分：7**

## 二：详细点评

Numbered sections in this order, each followed by `- ` bullet comments:

1. **总体评价**: focus on the topic, opening and ending, paragraphs serving the topic
2. **内容评价**: central idea, supporting arguments, logic and persuasiveness
3. **素材利用评价**: use of course material, quotations, tense
4. **结构评价**: three-part structure, linking words, clear layering; quote the essay in English
5. **语言形式评价**: grammar and spelling errors, vocabulary range, precision

## Essay to grade

{essay}"####;

/// Build the scoring request text for `essay`.
///
/// The placeholder is replaced when the template has one; otherwise the
/// essay is appended after a blank line so custom prompts need not know the
/// placeholder.
pub fn scoring_request(template: &str, essay: &str) -> String {
    if template.contains(ESSAY_PLACEHOLDER) {
        template.replace(ESSAY_PLACEHOLDER, essay.trim())
    } else {
        format!("{}\n\n{}", template.trim_end(), essay.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rubric_has_placeholder_once() {
        assert_eq!(DEFAULT_SCORING_PROMPT.matches(ESSAY_PLACEHOLDER).count(), 1);
    }

    #[test]
    fn default_rubric_keeps_quoted_section_names() {
        assert!(DEFAULT_SCORING_PROMPT.contains("\"### 一：评分环节\""));
        assert!(DEFAULT_SCORING_PROMPT.contains("\"### 二：详细点评\""));
        assert!(DEFAULT_SCORING_PROMPT.contains("\"used to exercise\" → 应为 \"as exercise\""));
        assert!(DEFAULT_SCORING_PROMPT.trim_end().ends_with(ESSAY_PLACEHOLDER));
    }

    #[test]
    fn scoring_request_fills_placeholder() {
        let req = scoring_request(DEFAULT_SCORING_PROMPT, "  I like apple.\n");
        assert!(req.ends_with("I like apple."));
        assert!(!req.contains(ESSAY_PLACEHOLDER));
    }

    #[test]
    fn custom_prompt_without_placeholder_gets_essay_appended() {
        assert_eq!(
            scoring_request("Grade this:\n", "My essay"),
            "Grade this:\n\nMy essay"
        );
    }

    #[test]
    fn transcription_prompt_mentions_strike_through_and_red_pen() {
        assert!(DEFAULT_TRANSCRIPTION_PROMPT.contains("struck through"));
        assert!(DEFAULT_TRANSCRIPTION_PROMPT.contains("Red pen"));
    }
}
