//! Prompt assembly: privacy policy, retrieved context, history, question.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::document::ConversationTurn;

/// Marks where the model's answer begins. Always the last line of a prompt.
pub const ANSWER_MARKER: &str = "Answer:";
/// Chat-template role tag that precedes the model's turn.
pub const ASSISTANT_MARKER: &str = "<|assistant|>";
pub const SYSTEM_MARKER: &str = "<|system|>";
pub const USER_MARKER: &str = "<|user|>";
/// Labels a question, in history and in the current turn.
pub const QUESTION_LABEL: &str = "Question:";
/// Labels a prior user turn in the rendered history.
pub const HISTORY_USER_LABEL: &str = "User:";
/// Labels a prior assistant turn in the rendered history.
pub const HISTORY_ASSISTANT_LABEL: &str = "Assistant:";

/// Reply used when the context does not contain the answer.
pub const DEFAULT_ABSTENTION_PHRASE: &str = "That information is not available.";
/// Reply used when the question asks for contact details.
pub const DEFAULT_REFUSAL_PHRASE: &str =
    "I can't share private contact details. Please reach out through the contact form instead.";

/// Who the assistant speaks about, and the fixed phrases it must use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromptPolicy {
    /// How the resume owner is referred to, e.g. "the candidate".
    pub subject: String,
    pub abstention_phrase: String,
    pub refusal_phrase: String,
}

impl Default for PromptPolicy {
    fn default() -> Self {
        Self {
            subject: "the candidate".to_string(),
            abstention_phrase: DEFAULT_ABSTENTION_PHRASE.to_string(),
            refusal_phrase: DEFAULT_REFUSAL_PHRASE.to_string(),
        }
    }
}

impl PromptPolicy {
    fn render(&self) -> String {
        format!(
            "You are a professional assistant answering questions about {subject}'s \
             professional background, skills, projects, and experience.\n\
             Answer only from the provided context. Do not add facts that are not in it.\n\
             If the context does not contain the answer, reply exactly: \"{abstain}\"\n\
             If asked for phone numbers, email addresses, or other contact details, reply exactly: \
             \"{refuse}\" Never write phone numbers or email addresses, \
             even if they appear in the context.\n\
             Keep answers concise: 2 to 4 sentences.",
            subject = self.subject,
            abstain = self.abstention_phrase,
            refuse = self.refusal_phrase,
        )
    }
}

/// Builds the prompt string handed to the text generator.
///
/// Layout:
///
/// ```text
/// <|system|>
/// {policy}
/// <|user|>
/// Context:
/// {context}
///
/// User: {earlier question}
/// Assistant: {earlier answer}
///
/// Question: {question}
/// <|assistant|>
/// Answer:
/// ```
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    policy: PromptPolicy,
    history_window: usize,
}

impl PromptBuilder {
    pub fn new(policy: PromptPolicy, history_window: usize) -> Self {
        Self { policy, history_window }
    }

    pub fn policy(&self) -> &PromptPolicy {
        &self.policy
    }

    /// Assemble the prompt. Only the last `history_window` turns are rendered.
    pub fn build(&self, context: &str, question: &str, history: &[ConversationTurn]) -> String {
        let mut prompt = String::new();
        let _ = writeln!(prompt, "{SYSTEM_MARKER}");
        let _ = writeln!(prompt, "{}", self.policy.render());
        let _ = writeln!(prompt, "{USER_MARKER}");

        if context.trim().is_empty() {
            let _ = writeln!(
                prompt,
                "No context was found for this question. Answer only if the question is about \
                 {}'s role in general terms; otherwise reply exactly: \"{}\"",
                self.policy.subject, self.policy.abstention_phrase
            );
        } else {
            let _ = writeln!(prompt, "Context:\n{}", context.trim_end());
        }

        let recent = &history[history.len().saturating_sub(self.history_window)..];
        if !recent.is_empty() {
            prompt.push('\n');
            for turn in recent {
                let _ = writeln!(prompt, "{HISTORY_USER_LABEL} {}", turn.question.trim());
                let _ = writeln!(prompt, "{HISTORY_ASSISTANT_LABEL} {}", turn.answer.trim());
            }
        }

        let _ = writeln!(prompt, "\n{QUESTION_LABEL} {}", question.trim());
        let _ = writeln!(prompt, "{ASSISTANT_MARKER}");
        prompt.push_str(ANSWER_MARKER);
        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(PromptPolicy::default(), 3)
    }
}
