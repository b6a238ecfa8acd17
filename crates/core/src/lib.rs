//! # Game Wizard Core
//!
//! Domain types, traits, and error definitions for the Game Wizard
//! question-answering service. This crate has **no framework dependencies**:
//! it defines the domain model that every other crate implements against.
//!
//! The two external collaborators of a question-answer turn are traits here:
//! - [`KnowledgeStore`] ranks stored chunks against a question
//! - [`CompletionProvider`] turns a prompt into an answer
//!
//! Implementations live in `gamewizard-providers`; tests swap in stubs.

pub mod error;
pub mod history;
pub mod knowledge;
pub mod provider;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, RetrievalError};
pub use history::{ConversationHistory, HistoryEntry, DEFAULT_HISTORY_CAPACITY};
pub use knowledge::{KnowledgeChunk, KnowledgeStore};
pub use provider::{CompletionProvider, CompletionRequest, CompletionResponse};
pub use session::SessionId;
