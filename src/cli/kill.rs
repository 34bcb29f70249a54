// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Kill command - terminate stale platform processes

use colored::Colorize;
use miette::Result;

use super::report;
use crate::terminator::{KillOutcome, TaskTerminator};

/// Run the kill command
///
/// Succeeds whether or not any process was actually running.
pub async fn run(platform: String, verbose: bool) -> Result<()> {
    let terminator = TaskTerminator::for_current_host();
    let termination = terminator.kill_tasks(&platform).await.map_err(report)?;

    if termination.attempts.is_empty() {
        println!(
            "{} No known tasks to terminate for platform '{}'",
            "⚠".yellow(),
            termination.platform
        );
        return Ok(());
    }

    for (task, outcome) in &termination.attempts {
        match outcome {
            KillOutcome::Killed => println!("  {} {}", "✓".green(), task),
            other if verbose => println!("  {} {} ({:?})", "○".dimmed(), task.dimmed(), other),
            _ => println!("  {} {}", "○".dimmed(), task.dimmed()),
        }
    }

    Ok(())
}
