// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Build command - run one build of a builder

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{load_config, report};
use crate::builders::{prepare_pipeline, run_template, BuildRunner};
use crate::context::properties::REPOS_CONFIG_URI;
use crate::errors::MobciError;
use crate::pipeline::{PipelineExecutor, RunVerdict};
use crate::scheduler::BuildRequest;

/// Run the build command
pub async fn run(
    config_path: Option<PathBuf>,
    builder: String,
    number: u64,
    repos_config_uri: Option<String>,
    properties: Vec<String>,
    verbose: bool,
) -> Result<()> {
    let config = Arc::new(load_config(config_path).map_err(report)?);
    let runner = BuildRunner::new(Arc::clone(&config)).map_err(report)?;

    let mut request = BuildRequest::new(&builder, "manual build");
    for property in &properties {
        let (name, value) = parse_property(property).map_err(report)?;
        request = request.with_property(name, value);
    }
    if let Some(uri) = repos_config_uri {
        request = request.with_property(REPOS_CONFIG_URI, uri);
    }

    // Report missing programs before any step runs
    let app = config.builder(&builder).and_then(|b| config.app(&b.app)).map_err(report)?;
    let exe = std::env::current_exe().map_err(|e| report(e.into()))?;
    let executor = PipelineExecutor::with_default_executors();
    let mut missing = executor.check_tools(&prepare_pipeline(&config, app, &exe));
    missing.extend(executor.check_tools(&run_template(&config, app, &exe)));
    missing.sort();
    missing.dedup();
    for tool in &missing {
        eprintln!("{} '{}' was not found on PATH", "⚠".yellow(), tool);
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{}", "Interrupted, cancelling build...".yellow());
            on_interrupt.cancel();
        }
    });

    let outcome = runner.run_build(&request, number, cancel).await.map_err(report)?;
    outcome.print_summary();

    if verbose {
        println!("  Prepare: {} steps run, {} skipped", outcome.prepare.executed_count(), outcome.prepare.skipped_count());
    }

    if outcome.verdict == RunVerdict::Failure {
        return Err(miette::miette!("Build {} failed", outcome.build_id));
    }
    Ok(())
}

fn parse_property(property: &str) -> Result<(&str, &str), MobciError> {
    property
        .split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| MobciError::invalid_config(format!("property '{}' is not KEY=VALUE", property)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property() {
        assert_eq!(parse_property("a=b=c").unwrap(), ("a", "b=c"));
        assert_eq!(parse_property("empty=").unwrap(), ("empty", ""));
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=x").is_err());
    }
}
