//! Prompt assembly.
//!
//! A prompt is four sections in fixed order: system instructions, the chat
//! transcript, the retrieved context and the question, followed by an
//! `Answer:` cue for the model.

use gamewizard_core::history::HistoryEntry;
use gamewizard_core::knowledge::KnowledgeChunk;
use serde::{Deserialize, Serialize};

/// Which retrieved chunks make it into the context section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextPolicy {
    /// Leave out the lowest-ranked chunk of those returned.
    ///
    /// This is how the deployed wizard has always behaved. Whether it was
    /// meant to is unresolved, so it stays the default.
    #[default]
    DropLowestRanked,
    /// Use every returned chunk.
    IncludeAll,
}

impl ContextPolicy {
    pub fn from_drop_flag(drop_lowest_ranked: bool) -> Self {
        if drop_lowest_ranked {
            Self::DropLowestRanked
        } else {
            Self::IncludeAll
        }
    }
}

/// Render history as `User: ...\nAI: ...\n` lines, oldest first.
pub fn format_transcript(entries: &[HistoryEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("User: {}\nAI: {}\n", e.user_input(), e.ai_message()))
        .collect()
}

/// Concatenate chunk texts in rank order and strip single quotes.
pub fn assemble_context(chunks: &[KnowledgeChunk], policy: ContextPolicy) -> String {
    let used = match policy {
        ContextPolicy::DropLowestRanked => chunks.len().saturating_sub(1),
        ContextPolicy::IncludeAll => chunks.len(),
    };

    chunks[..used]
        .iter()
        .map(|c| c.content.as_str())
        .collect::<String>()
        .replace('\'', "")
}

/// Build the full prompt text.
pub fn build_prompt(system_prompt: &str, transcript: &str, context: &str, question: &str) -> String {
    format!(
        "System Instructions:\n{system_prompt}\n\n\
         Chat History:\n{transcript}\n\n\
         Context:\n{context}\n\n\
         Question:\n{question}\n\n\
         Answer:\n"
    )
}
