//! Prompt assembly from retrieved context and conversation history.

use std::fmt::Write as _;

use ragline_core::{Conversation, RagError, Result, Scalar, SearchResult};

/// Default system instruction.
const DEFAULT_SYSTEM: &str = "Answer the question using only the provided context. If the answer \
is not contained in the context, say \"I cannot answer this question from the provided context.\"";

/// Default context line when no passages were retrieved.
const DEFAULT_NO_CONTEXT: &str = "No relevant context is available.";

/// The prompt layout used for every request.
///
/// The assembled prompt is: system instruction, a context block of
/// source-attributed passages, the prior conversation turns, and the
/// question.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: String,
    no_context: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { system: DEFAULT_SYSTEM.to_string(), no_context: DEFAULT_NO_CONTEXT.to_string() }
    }
}

/// An assembled prompt with the number of passages that made it in.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    /// The full prompt text.
    pub text: String,
    /// How many retrieved passages were included before the context
    /// budget cut off.
    pub included: usize,
}

impl PromptTemplate {
    /// Create a template with a custom system instruction and
    /// no-context fallback line.
    pub fn new(system: impl Into<String>, no_context: impl Into<String>) -> Self {
        Self { system: system.into(), no_context: no_context.into() }
    }

    /// The fallback context line used when no passages are available.
    pub fn no_context_line(&self) -> &str {
        &self.no_context
    }

    /// Assemble the final prompt.
    ///
    /// Passages arrive ranked by descending score and are included in
    /// that order until `max_context_chars` is spent, so truncation
    /// drops the lowest-scoring passages first. A top passage that alone
    /// exceeds the budget is included truncated rather than dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PromptTooLarge`] when the assembled prompt
    /// exceeds `input_limit` characters after context truncation.
    pub fn assemble(
        &self,
        query: &str,
        conversation: &Conversation,
        passages: &[SearchResult],
        max_context_chars: usize,
        input_limit: usize,
    ) -> Result<AssembledPrompt> {
        let mut context = String::new();
        let mut context_chars = 0;
        let mut included = 0;

        for (position, passage) in passages.iter().enumerate() {
            let block = format_passage(position, passage);
            let block_chars = block.chars().count();
            if context_chars + block_chars > max_context_chars {
                if included == 0 {
                    // The best passage alone busts the budget; keep its head.
                    let truncated: String = block.chars().take(max_context_chars).collect();
                    context.push_str(&truncated);
                    included = 1;
                }
                break;
            }
            context.push_str(&block);
            context_chars += block_chars;
            included += 1;
        }

        if included == 0 {
            context.push_str(&self.no_context);
            context.push('\n');
        }

        let mut history = String::new();
        for turn in conversation.turns() {
            let _ = writeln!(history, "{}: {}", turn.role, turn.text);
        }

        let text = if history.is_empty() {
            format!(
                "{system}\n\nContext:\n{context}\nQuestion:\n{query}\n\nAnswer:",
                system = self.system
            )
        } else {
            format!(
                "{system}\n\nContext:\n{context}\nConversation so far:\n{history}\nQuestion:\n{query}\n\nAnswer:",
                system = self.system
            )
        };

        let chars = text.chars().count();
        if chars > input_limit {
            return Err(RagError::PromptTooLarge { chars, limit: input_limit });
        }

        Ok(AssembledPrompt { text, included })
    }
}

/// One attributed context passage.
fn format_passage(position: usize, passage: &SearchResult) -> String {
    let source = passage
        .metadata
        .get("source")
        .map(Scalar::to_string)
        .unwrap_or_else(|| passage.chunk.document_id.clone());
    format!("[{n}] source: {source}\n{text}\n\n", n = position + 1, text = passage.chunk.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragline_core::{Chunk, Metadata, Role};

    fn passage(document_id: &str, text: &str, score: f32) -> SearchResult {
        let mut metadata = Metadata::new();
        metadata.insert("source".to_string(), Scalar::from(format!("{document_id}.txt")));
        SearchResult {
            chunk: Chunk::new(document_id, 0, text, 0, text.len()),
            score,
            metadata,
        }
    }

    #[test]
    fn passages_are_attributed_and_ordered() {
        let template = PromptTemplate::default();
        let passages =
            vec![passage("d1", "The sky is blue.", 0.9), passage("d2", "Water is wet.", 0.5)];
        let prompt = template
            .assemble("What color is the sky?", &Conversation::new(), &passages, 1000, 10_000)
            .unwrap();

        assert_eq!(prompt.included, 2);
        assert!(prompt.text.contains("[1] source: d1.txt"));
        assert!(prompt.text.contains("The sky is blue."));
        assert!(prompt.text.contains("[2] source: d2.txt"));
        let first = prompt.text.find("The sky is blue.").unwrap();
        let second = prompt.text.find("Water is wet.").unwrap();
        assert!(first < second);
    }

    #[test]
    fn budget_drops_the_lowest_scoring_passages_first() {
        let template = PromptTemplate::default();
        let passages = vec![
            passage("d1", &"a".repeat(40), 0.9),
            passage("d2", &"b".repeat(40), 0.8),
            passage("d3", &"c".repeat(40), 0.7),
        ];
        let prompt = template
            .assemble("q", &Conversation::new(), &passages, 130, 10_000)
            .unwrap();

        assert_eq!(prompt.included, 2);
        assert!(prompt.text.contains(&"a".repeat(40)));
        assert!(prompt.text.contains(&"b".repeat(40)));
        assert!(!prompt.text.contains(&"c".repeat(40)));
    }

    #[test]
    fn an_oversized_top_passage_is_truncated_not_dropped() {
        let template = PromptTemplate::default();
        let passages = vec![passage("d1", &"x".repeat(500), 0.9)];
        let prompt =
            template.assemble("q", &Conversation::new(), &passages, 100, 10_000).unwrap();

        assert_eq!(prompt.included, 1);
        assert!(prompt.text.contains(&"x".repeat(50)));
        assert!(!prompt.text.contains(&"x".repeat(200)));
    }

    #[test]
    fn empty_passages_use_the_no_context_line() {
        let template = PromptTemplate::default();
        let prompt = template.assemble("q", &Conversation::new(), &[], 1000, 10_000).unwrap();
        assert_eq!(prompt.included, 0);
        assert!(prompt.text.contains("No relevant context is available."));
    }

    #[test]
    fn conversation_turns_appear_in_order() {
        let template = PromptTemplate::default();
        let mut conversation = Conversation::new();
        conversation.push(Role::User, "earlier question");
        conversation.push(Role::Assistant, "earlier answer");
        let prompt =
            template.assemble("follow-up", &conversation, &[], 1000, 10_000).unwrap();

        let user = prompt.text.find("user: earlier question").unwrap();
        let assistant = prompt.text.find("assistant: earlier answer").unwrap();
        assert!(user < assistant);
    }

    #[test]
    fn an_overlong_prompt_is_rejected() {
        let template = PromptTemplate::default();
        let err = template
            .assemble(&"q".repeat(400), &Conversation::new(), &[], 100, 300)
            .unwrap_err();
        assert!(matches!(err, RagError::PromptTooLarge { limit: 300, .. }));
    }
}
