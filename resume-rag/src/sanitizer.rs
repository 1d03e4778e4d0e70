//! Turns raw generator output into the answer shown to the user.

use crate::pii::{self, REDACTION_PLACEHOLDER};
use crate::prompt::{
    ANSWER_MARKER, ASSISTANT_MARKER, DEFAULT_ABSTENTION_PHRASE, HISTORY_USER_LABEL,
    QUESTION_LABEL, SYSTEM_MARKER, USER_MARKER,
};

/// Chat tags that end the answer wherever they appear.
const RUN_ON_TAGS: [&str; 2] = [USER_MARKER, SYSTEM_MARKER];

/// Turn labels that end the answer only when they open a line.
const RUN_ON_LABELS: [&str; 2] = [QUESTION_LABEL, HISTORY_USER_LABEL];

/// Extracts, trims, and redacts generated answers.
#[derive(Debug, Clone)]
pub struct ResponseSanitizer {
    abstention_phrase: String,
}

impl ResponseSanitizer {
    pub fn new(abstention_phrase: impl Into<String>) -> Self {
        Self { abstention_phrase: abstention_phrase.into() }
    }

    /// Extract the answer from `raw`, which was generated for `prompt`.
    ///
    /// Extraction takes the first rule that applies:
    ///
    /// 1. everything after the last `Answer:`
    /// 2. everything after `prompt`, if `raw` starts with it
    /// 3. everything after the last `<|assistant|>`
    /// 4. everything after the first line
    ///
    /// The result is cut where the model starts another turn (a chat tag
    /// anywhere, or a `Question:`/`User:` label opening a line), whitespace
    /// is collapsed, and email or phone shaped text is redacted. An empty answer
    /// or one that merely restates the abstention phrase comes back as the
    /// canonical abstention phrase.
    pub fn sanitize(&self, raw: &str, prompt: &str) -> String {
        let extracted = extract(raw, prompt);
        let trimmed = cut_run_on(extracted);
        let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
        let redacted = pii::redact(&collapsed, REDACTION_PLACEHOLDER);

        if redacted.is_empty() || self.is_abstention(&redacted) {
            return self.abstention_phrase.clone();
        }
        redacted.into_owned()
    }

    /// Whether `answer` is the abstention phrase, ignoring ASCII case and a
    /// trailing period.
    pub fn is_abstention(&self, answer: &str) -> bool {
        let strip = |s: &str| s.trim().trim_end_matches('.').to_string();
        strip(answer).eq_ignore_ascii_case(&strip(&self.abstention_phrase))
    }

    pub fn abstention_phrase(&self) -> &str {
        &self.abstention_phrase
    }
}

impl Default for ResponseSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_ABSTENTION_PHRASE)
    }
}

fn extract<'a>(raw: &'a str, prompt: &str) -> &'a str {
    if let Some(at) = raw.rfind(ANSWER_MARKER) {
        return &raw[at + ANSWER_MARKER.len()..];
    }
    if let Some(rest) = raw.strip_prefix(prompt) {
        return rest;
    }
    if let Some(at) = raw.rfind(ASSISTANT_MARKER) {
        return &raw[at + ASSISTANT_MARKER.len()..];
    }
    raw.split_once('\n').map_or("", |(_, rest)| rest)
}

fn cut_run_on(text: &str) -> &str {
    let tag = RUN_ON_TAGS.iter().filter_map(|tag| text.find(tag)).min();
    let label = line_starts(text).find(|&at| {
        let line = text[at..].trim_start_matches([' ', '\t']);
        RUN_ON_LABELS.iter().any(|label| line.starts_with(label))
    });
    match tag.into_iter().chain(label).min() {
        Some(end) => &text[..end],
        None => text,
    }
}

fn line_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    std::iter::once(0).chain(text.match_indices('\n').map(|(at, _)| at + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptBuilder;

    fn prompt() -> String {
        PromptBuilder::default().build("Four years of Kafka.", "How long with Kafka?", &[])
    }

    #[test]
    fn takes_text_after_answer_marker() {
        let prompt = prompt();
        let raw = format!("{prompt} The candidate has 4 years of experience.");
        assert_eq!(
            ResponseSanitizer::default().sanitize(&raw, &prompt),
            "The candidate has 4 years of experience."
        );
    }

    #[test]
    fn strips_echoed_prompt_without_marker() {
        let raw = "PROMPT TEXT Built a search engine.";
        assert_eq!(
            ResponseSanitizer::default().sanitize(raw, "PROMPT TEXT"),
            "Built a search engine."
        );
    }

    #[test]
    fn falls_back_to_assistant_marker_then_first_line() {
        let sanitizer = ResponseSanitizer::default();
        assert_eq!(
            sanitizer.sanitize("junk <|assistant|> Led a team of five.", "other"),
            "Led a team of five."
        );
        assert_eq!(
            sanitizer.sanitize("header line\nUsed Terraform daily.", "other"),
            "Used Terraform daily."
        );
    }

    #[test]
    fn cuts_run_on_turns() {
        let raw = "Answer: Knows Go and Rust.\nQuestion: What else?";
        assert_eq!(ResponseSanitizer::default().sanitize(raw, "p"), "Knows Go and Rust.");

        let raw = "Answer: Five years.\n  User: thanks";
        assert_eq!(ResponseSanitizer::default().sanitize(raw, "p"), "Five years.");

        let raw = "Answer: Five years. <|user|> more";
        assert_eq!(ResponseSanitizer::default().sanitize(raw, "p"), "Five years.");
    }

    #[test]
    fn labels_inside_a_sentence_are_kept() {
        let sanitizer = ResponseSanitizer::default();
        assert_eq!(
            sanitizer.sanitize("Answer: Designed the User: Admin role model in IAM.", "p"),
            "Designed the User: Admin role model in IAM."
        );
        assert_eq!(
            sanitizer.sanitize("Answer: Built a Question: Answer style FAQ bot.", "p"),
            "Built a Question: Answer style FAQ bot."
        );
    }

    #[test]
    fn redacts_hallucinated_contact_details() {
        let raw = "Answer: Email jane.doe@mail.com or call 412-499-6900.";
        assert_eq!(
            ResponseSanitizer::default().sanitize(raw, "p"),
            "Email [REDACTED] or call [REDACTED]."
        );

        let raw = "Answer: Call 412 499 6900 or (412)499-6900 or +14124996900 or 14124996900";
        assert_eq!(
            ResponseSanitizer::default().sanitize(raw, "p"),
            "Call [REDACTED] or [REDACTED] or [REDACTED] or [REDACTED]"
        );
    }

    #[test]
    fn empty_and_restated_abstentions_are_canonical() {
        let sanitizer = ResponseSanitizer::default();
        assert_eq!(sanitizer.sanitize("Answer:   ", "p"), DEFAULT_ABSTENTION_PHRASE);
        assert_eq!(
            sanitizer.sanitize("Answer: that information is NOT available", "p"),
            DEFAULT_ABSTENTION_PHRASE
        );
        assert_eq!(sanitizer.sanitize("single line only", "p"), DEFAULT_ABSTENTION_PHRASE);
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(
            ResponseSanitizer::default().sanitize("Answer:  Built\n\n  APIs\t fast. ", "p"),
            "Built APIs fast."
        );
    }
}
