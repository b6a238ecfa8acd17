//! The question-answer turn at the heart of Game Wizard.
//!
//! A turn retrieves knowledge for a question, assembles a prompt from the
//! system instructions, recent history and retrieved context, asks the
//! completion provider, and records the answer in the session history.

pub mod prompt;
pub mod wizard;

#[cfg(test)]
mod test_helpers;

pub use prompt::{assemble_context, build_prompt, format_transcript, ContextPolicy};
pub use wizard::{AskError, TurnOutcome, TurnRequest, WizardAgent};
