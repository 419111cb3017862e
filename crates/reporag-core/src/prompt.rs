//! Prompt assembly for the answer generator.

use crate::query::{ProcessedQuery, QueryIntent};
use crate::types::Chunk;

const SYSTEM_HEADER: &str = "You are RepoRAG, a senior software engineer answering questions about \
one code repository. Ground every statement in the context below. If the context does not \
contain the answer, say so instead of guessing.";

const CONTEXT_RULE: &str = "---------------------";

const FORMATTING: &str = "FORMATTING:
- Use Markdown. Put code in fenced blocks with a language tag.
- Cite files as `path:start-end` when you refer to them.
- Do not invent files, functions or behavior that are not in the context.";

/// Instruction block for an intent.
pub fn intent_instructions(intent: QueryIntent) -> &'static str {
    match intent {
        QueryIntent::Summary => {
            "Provide a CONCISE, HIGH-LEVEL summary. Do NOT show code unless absolutely necessary. \
             Focus on the 'what' and 'why' of the project/component. Keep it under 3-4 paragraphs."
        }
        QueryIntent::Qna => {
            "Provide a DIRECT, SHORT answer. No need for deep technical elaboration unless asked. \
             Get straight to the point. Accuracy is key, brevity is preferred."
        }
        QueryIntent::Coding => {
            "Provide COMPLETE, RUNNABLE code. This is a coding task, so prioritize code over \
             explanation. Include all imports, setup and logic. There is no limit on code length."
        }
        QueryIntent::Explanation => {
            "Focus on explaining HOW and WHY the code works. Break down the logic flow, explain \
             key algorithms and describe the purpose of each component. Use examples from the \
             actual code."
        }
        QueryIntent::Implementation => {
            "Show the ACTUAL CODE implementation. Include function signatures, key logic and \
             important details. Cite specific line numbers and file paths."
        }
        QueryIntent::Debugging => {
            "Analyze potential issues and error scenarios. Look for error handling, edge cases \
             and common pitfalls. Suggest what might be causing problems based on the code."
        }
        QueryIntent::Architecture => {
            "Describe the high-level structure and design patterns. Explain how the components \
             interact and the reasoning behind the overall organization."
        }
        QueryIntent::Usage => {
            "Provide practical usage examples. Show how to use the code with concrete examples, \
             including setup steps and common use cases."
        }
        QueryIntent::Comparison => {
            "Compare and contrast the approaches or components. Highlight key differences and \
             similarities, and explain when to use each option."
        }
        QueryIntent::General => "Provide a comprehensive technical answer based on the code.",
    }
}

/// Render one chunk with its `file:lines` header.
fn render_chunk(chunk: &Chunk) -> String {
    let file = chunk.metadata.file_path().unwrap_or("Unknown");
    format!("File: {}:{}\n{}", file, chunk.line_span(), chunk.text)
}

/// Assemble the single prompt sent to the generator.
///
/// Chunks appear in the order given, separated by a blank line.
pub fn build_prompt(processed: &ProcessedQuery, context: &[Chunk]) -> String {
    let context_block = context
        .iter()
        .map(render_chunk)
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut prompt = String::with_capacity(context_block.len() + 1024);
    prompt.push_str(SYSTEM_HEADER);
    prompt.push_str("\n\nContext information is below.\n");
    prompt.push_str(CONTEXT_RULE);
    prompt.push('\n');
    prompt.push_str(&context_block);
    prompt.push('\n');
    prompt.push_str(CONTEXT_RULE);
    prompt.push_str("\n\n");

    prompt.push_str("QUERY INTENT: ");
    prompt.push_str(&processed.intent.as_str().to_uppercase());
    prompt.push_str("\n\nSPECIALIZED INSTRUCTIONS:\n");
    prompt.push_str(intent_instructions(processed.intent));
    prompt.push_str("\n\n");
    prompt.push_str(FORMATTING);
    prompt.push_str("\n\n");

    if !processed.context.is_empty() {
        prompt.push_str("CONVERSATION CONTEXT:\n");
        prompt.push_str(&processed.context);
        prompt.push('\n');
    }

    prompt.push_str("Query: ");
    prompt.push_str(&processed.rewritten);
    prompt.push_str("\nAnswer: ");
    prompt
}
