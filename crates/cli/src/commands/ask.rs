//! `gamewizard ask`: answer one question and exit.

use std::path::Path;

use gamewizard_agent::{AskError, TurnOutcome, TurnRequest};
use gamewizard_core::history::ConversationHistory;
use tracing::debug;

pub async fn run(
    config_path: Option<&Path>,
    question: String,
    depth: Option<usize>,
    model: Option<String>,
    show_context: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let agent = super::build_agent(&config)?;

    let depth = depth.unwrap_or(config.retrieval.default_depth);
    let mut request = TurnRequest::new(
        question,
        model.unwrap_or_else(|| config.completion.default_model.clone()),
        depth,
    );
    request.history_depth = config.history.prompt_depth;

    let mut history = ConversationHistory::new(config.history.capacity);
    debug!(model = %request.model, depth = request.depth, "Asking one question");

    eprint!("  Finding answers...");
    let result = agent.ask(&request, &mut history).await;
    eprint!("\r                    \r");

    match result {
        Ok(outcome) => {
            println!("{}", render_outcome(&outcome, show_context));
            Ok(())
        }
        Err(e) => {
            debug!(error = %e, "Question failed");
            eprintln!("{}", render_failure(&e));
            std::process::exit(exit_code(&e));
        }
    }
}

/// Process exit status for a failed question: 2 for user mistakes, 1 otherwise.
pub fn exit_code(error: &AskError) -> i32 {
    if error.is_user_error() { 2 } else { 1 }
}

/// Answer text, optionally followed by the source and retrieved context.
pub fn render_outcome(outcome: &TurnOutcome, show_context: bool) -> String {
    let mut out = outcome.answer.clone();
    if show_context {
        if let Some(source) = &outcome.top_source {
            out.push_str(&format!("\n\n--- Source: {source}"));
        }
        out.push_str(&format!(
            "\n--- Context ({} chunks retrieved):\n{}",
            outcome.chunks_retrieved, outcome.context
        ));
    }
    out
}

/// User mistakes read as a warning; everything else as a failure.
pub fn render_failure(error: &AskError) -> String {
    if error.is_user_error() {
        error.to_string()
    } else {
        format!("Oops! Something went wrong: {error}")
    }
}
