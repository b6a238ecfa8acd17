//! Retrieval and completion backends for Game Wizard.
//!
//! Knowledge stores implement `gamewizard_core::KnowledgeStore`, completion
//! providers implement `gamewizard_core::CompletionProvider`.
//! [`backends::build_from_config`] picks the ones named in configuration.

pub mod backends;
pub mod cortex;
pub mod in_memory;
pub mod openai_compat;
pub mod sql_api;

pub use backends::{build_from_config, Backends};
pub use cortex::{CortexCompletionProvider, CortexKnowledgeStore};
pub use in_memory::InMemoryKnowledgeStore;
pub use openai_compat::OpenAiCompatProvider;
pub use sql_api::SqlApiClient;
