//! Grounding prompt

use stormwatch_search::RetrievalResult;

/// Separator between retrieved chunks in the context block
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Join retrieved chunk texts, in rank order, into one context block
pub fn format_context(result: &RetrievalResult) -> String {
    result.texts().collect::<Vec<_>>().join(CONTEXT_SEPARATOR)
}

/// Render the grounding prompt for one question
pub fn render_prompt(context: &str, question: &str) -> String {
    format!(
        "Answer the question based only on the following context:\n\n{context}\n\nQuestion: {question}\n\nAnswer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use stormwatch_common::index::ScoredChunk;
    use stormwatch_common::models::{Chunk, DocumentMetadata};

    fn hit(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                text: text.to_string(),
                index: 0,
                start: 0,
                metadata: DocumentMetadata::default(),
            },
            score: 0.5,
        }
    }

    #[test]
    fn test_context_joined_by_blank_line() {
        let result = RetrievalResult {
            query: "q".into(),
            hits: vec![hit("first"), hit("second")],
        };
        assert_eq!(format_context(&result), "first\n\nsecond");
    }

    #[test]
    fn test_render_prompt() {
        let prompt = render_prompt("Event: Flood Warning", "Any floods?");
        assert_eq!(
            prompt,
            "Answer the question based only on the following context:\n\nEvent: Flood Warning\n\nQuestion: Any floods?\n\nAnswer:"
        );
    }

    #[test]
    fn test_braces_in_context_are_literal() {
        let prompt = render_prompt("literal {question}", "real question");
        assert!(prompt.contains("literal {question}"));
        assert!(prompt.contains("Question: real question"));
    }
}
