//! `gamewizard chat`: interactive question-answer session.
//!
//! One conversation history lives for the whole session.

use std::io::Write;
use std::path::Path;

use gamewizard_agent::{TurnRequest, WizardAgent};
use gamewizard_agent::prompt::format_transcript;
use gamewizard_core::history::ConversationHistory;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use super::ask::render_failure;

pub async fn run(
    config_path: Option<&Path>,
    depth: Option<usize>,
    model: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let agent = super::build_agent(&config)?;

    let mut template = TurnRequest::new(
        String::new(),
        model.unwrap_or_else(|| config.completion.default_model.clone()),
        depth.unwrap_or(config.retrieval.default_depth),
    );
    template.history_depth = config.history.prompt_depth;

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          Game Wizard 🎮  Interactive          ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", template.model);
    println!("  Depth:     {}", template.depth);
    println!("  Knowledge: {}", agent.knowledge().name());
    println!();
    println!("  Ask me anything about games.");
    println!("  /history shows the conversation, /clear forgets it.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut history = ConversationHistory::new(config.history.capacity);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();

    let answered = repl(&agent, &template, &mut history, stdin, &mut stdout).await?;

    println!();
    println!("  Goodbye! {answered} question(s) answered. 🎮");
    println!();

    Ok(())
}

/// Read questions line by line until EOF or an exit command.
///
/// Returns how many questions were answered.
pub async fn repl<R, W>(
    agent: &WizardAgent,
    template: &TurnRequest,
    history: &mut ConversationHistory,
    input: R,
    out: &mut W,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let mut answered = 0;

    write!(out, "  You > ")?;
    out.flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();

        match line {
            "exit" | "quit" | "/exit" | "/quit" | ":q" => break,
            "/clear" => {
                history.clear();
                writeln!(out, "  (history cleared)")?;
            }
            "/history" => {
                if history.is_empty() {
                    writeln!(out, "  (no history yet)")?;
                }
                let transcript = format_transcript(&history.peek(history.len()));
                for l in transcript.lines() {
                    writeln!(out, "  {l}")?;
                }
            }
            question => {
                let request = TurnRequest {
                    question: question.to_string(),
                    ..template.clone()
                };
                match agent.ask(&request, history).await {
                    Ok(outcome) => {
                        answered += 1;
                        writeln!(out)?;
                        for l in outcome.answer.lines() {
                            writeln!(out, "  Wizard > {l}")?;
                        }
                        if let Some(source) = &outcome.top_source {
                            writeln!(out, "  (source: {source})")?;
                        }
                        writeln!(out)?;
                    }
                    Err(e) => {
                        writeln!(out, "  [!] {}", render_failure(&e))?;
                        writeln!(out)?;
                    }
                }
            }
        }

        write!(out, "  You > ")?;
        out.flush()?;
    }

    Ok(answered)
}
