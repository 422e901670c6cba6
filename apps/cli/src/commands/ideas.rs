//! Ideas command implementation.

use anyhow::{Result, bail};
use colored::Colorize;
use upcycle_core::{ActionOptions, FlowExecutor, get_upcycling_ideas_action};

/// Execute the ideas command.
pub async fn execute(
    executor: &FlowExecutor,
    material: &str,
    request: Option<&str>,
    json_output: bool,
    options: ActionOptions,
) -> Result<()> {
    let state = get_upcycling_ideas_action(executor, material, request, options).await;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&state)?);
    }

    if let Some(error) = state.error {
        bail!(error);
    }

    if !json_output {
        println!();
        println!("{}", format!("Upcycling ideas for {}", material).bold().cyan());
        println!();
        for (i, idea) in state.ideas.iter().enumerate() {
            println!("  {}. {}", i + 1, idea);
        }
        println!();
    }
    Ok(())
}
