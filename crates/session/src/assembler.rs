//! Prompt assembly.
//!
//! The whole document and the whole conversation go into every prompt; there
//! is no chunking or retrieval step.
//!
//! ```text
//! <preamble>
//!
//! Document:
//! <document text>
//!
//! Conversation so far:
//! User: <q1>
//! Assistant: <a1>
//!
//! User Question: <question>
//! ```
//!
//! The "Conversation so far" block is omitted when there is no history.

use docchat_core::ChatTurn;

/// Instruction placed ahead of the document when none is configured.
pub const DEFAULT_PREAMBLE: &str =
    "Based on the following document content, answer the user's question.";

/// Builds generation prompts with a fixed preamble.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    preamble: String,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_PREAMBLE)
    }
}

impl PromptAssembler {
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
        }
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    /// Render the prompt. Deterministic: same inputs, same string.
    pub fn build(&self, document_text: &str, history: &[ChatTurn], question: &str) -> String {
        let history_len: usize = history
            .iter()
            .map(|t| t.question.len() + t.answer.len() + 20)
            .sum();
        let mut prompt = String::with_capacity(
            self.preamble.len() + document_text.len() + history_len + question.len() + 64,
        );

        prompt.push_str(&self.preamble);
        prompt.push_str("\n\nDocument:\n");
        prompt.push_str(document_text);
        prompt.push_str("\n\n");

        if !history.is_empty() {
            prompt.push_str("Conversation so far:\n");
            for turn in history {
                prompt.push_str("User: ");
                prompt.push_str(&turn.question);
                prompt.push_str("\nAssistant: ");
                prompt.push_str(&turn.answer);
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        prompt.push_str("User Question: ");
        prompt.push_str(question);
        prompt
    }
}

/// [`PromptAssembler::build`] with the default preamble.
pub fn build_prompt(document_text: &str, history: &[ChatTurn], question: &str) -> String {
    PromptAssembler::default().build(document_text, history, question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn turn(id: i64, q: &str, a: &str) -> ChatTurn {
        ChatTurn {
            id,
            username: "u".into(),
            question: q.into(),
            answer: a.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn no_history() {
        let prompt = build_prompt("Alpha", &[], "What is it?");
        assert_eq!(
            prompt,
            "Based on the following document content, answer the user's question.\n\n\
             Document:\nAlpha\n\n\
             User Question: What is it?"
        );
        assert!(!prompt.contains("Conversation so far"));
    }

    #[test]
    fn history_in_chronological_order() {
        let history = vec![turn(1, "q1", "a1"), turn(2, "q2", "a2")];
        let prompt = build_prompt("Doc", &history, "q3");

        let q1 = prompt.find("User: q1").unwrap();
        let a1 = prompt.find("Assistant: a1").unwrap();
        let q2 = prompt.find("User: q2").unwrap();
        let q3 = prompt.find("User Question: q3").unwrap();
        assert!(q1 < a1 && a1 < q2 && q2 < q3);
        assert!(prompt.contains("Conversation so far:\n"));
    }

    #[test]
    fn custom_preamble() {
        let assembler = PromptAssembler::new("Answer tersely.");
        let prompt = assembler.build("Beta", &[], "Why?");
        assert!(prompt.starts_with("Answer tersely.\n\nDocument:\nBeta"));
        assert_eq!(assembler.preamble(), "Answer tersely.");
    }

    #[test]
    fn deterministic() {
        let history = vec![turn(1, "q", "a")];
        assert_eq!(
            build_prompt("D", &history, "Q"),
            build_prompt("D", &history, "Q")
        );
    }

    #[test]
    fn document_is_not_truncated() {
        let doc = "x".repeat(200_000);
        let prompt = build_prompt(&doc, &[], "q");
        assert!(prompt.contains(&doc));
    }
}
