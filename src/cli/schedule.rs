// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Schedule command - run the configured schedules

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;

use super::{load_config, report};
use crate::builders::{BuildRunner, LocalBuildQueue};
use crate::pipeline::RunVerdict;
use crate::scheduler::{Scheduler, SchedulerState};

/// Run the schedule command
pub async fn run(config_path: Option<PathBuf>, once: bool, _verbose: bool) -> Result<()> {
    let config = Arc::new(load_config(config_path).map_err(report)?);
    let entries = config.schedule_entries().map_err(report)?;

    if entries.is_empty() {
        println!("{} No schedules configured", "⚠".yellow());
        return Ok(());
    }

    println!("{}", "Schedules:".bold());
    for entry in &entries {
        println!("  {} {} ({})", "→".blue(), entry.name.bold(), entry.recurrence);
        println!("    builders: {}", entry.builders.join(", "));
    }
    println!();

    let runner = Arc::new(BuildRunner::new(Arc::clone(&config)).map_err(report)?);
    let queue = Arc::new(LocalBuildQueue::new(runner));
    let scheduler = Scheduler::new(Arc::new(SchedulerState::new(entries)), Arc::clone(&queue));

    if once {
        let dispatched = scheduler.dispatch_all().await;
        let outcomes = queue.wait_idle().await;
        let failed = outcomes.iter().filter(|o| o.verdict == RunVerdict::Failure).count();

        println!();
        println!(
            "{} builds dispatched, {} not dispatched, {} failed",
            dispatched.enqueued.len(),
            dispatched.failed.len(),
            failed
        );
        return Ok(());
    }

    let handle = scheduler.start();
    println!("Scheduler running, press Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| miette::miette!("Failed to listen for Ctrl-C: {}", e))?;

    println!("\n{}", "Stopping scheduler...".yellow());
    handle.stop().await;
    queue.cancel_all();
    queue.wait_idle().await;
    Ok(())
}
