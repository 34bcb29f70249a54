// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Validate command - check the configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;
use std::sync::Arc;

use super::{load_config, report};
use crate::builders::{prepare_pipeline, run_template, BuildRunner};
use crate::config::ConfigValidator;
use crate::pipeline::{PipelineExecutor, PipelineValidator, ValidationResult};
use crate::scheduler::BuildRequest;

/// Run the validate command
pub async fn run(config_path: Option<PathBuf>, verbose: bool) -> Result<()> {
    println!("{}", "Validating configuration...".bold());
    println!();

    let config = load_config(config_path).map_err(report)?;
    println!("  {} Configuration file parsed", "✓".green());

    let mut validation = ConfigValidator::validate(&config);
    let config = Arc::new(config);
    let runner = BuildRunner::new(Arc::clone(&config)).map_err(report)?;
    let executor = PipelineExecutor::with_default_executors();
    let mut missing_tools = Vec::new();

    // Check the pipelines of every builder that refers to a known app
    for (name, builder) in &config.builders {
        let Ok(app) = config.app(&builder.app) else {
            continue;
        };
        let Ok(ctx) = runner.create_context(&BuildRequest::new(name, "validate"), 1) else {
            continue;
        };

        let exe = std::path::Path::new("mobci");
        let pipeline = prepare_pipeline(&config, app, exe).extend(run_template(&config, app, exe).steps);
        let result = PipelineValidator::validate(&pipeline, ctx.names());
        validation.merge(prefixed(name, result));

        missing_tools.extend(executor.check_tools(&pipeline).into_iter().filter(|t| t != "mobci"));
        println!("  {} Builder '{}' pipeline checked", "✓".green(), name);
    }

    missing_tools.sort();
    missing_tools.dedup();

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !missing_tools.is_empty() {
        println!();
        println!("{}:", "Missing tools".yellow().bold());
        for tool in &missing_tools {
            println!("  {} {}", "⚠".yellow(), tool);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Configuration summary".bold());
        println!("  Store: {} ({})", config.store.uri, config.store.database);
        println!("  Apps: {}", config.apps.len());
        println!("  Builders: {}", config.builders.len());
        for (name, builder) in &config.builders {
            let variants = if builder.is_matrix() {
                format!(", {} variants", builder.variants.len())
            } else {
                String::new()
            };
            println!("    • {} ({}{})", name, builder.platform, variants);
        }
        println!("  Schedules: {}", config.schedules.len());
    }

    println!();
    if validation.is_valid() {
        println!("{}", "Configuration is valid".green().bold());
        Ok(())
    } else {
        Err(miette::miette!("Configuration has {} error(s)", validation.errors.len()))
    }
}

fn prefixed(builder: &str, result: ValidationResult) -> ValidationResult {
    ValidationResult {
        errors: result.errors.into_iter().map(|e| format!("Builder '{}': {}", builder, e)).collect(),
        warnings: result.warnings.into_iter().map(|w| format!("Builder '{}': {}", builder, w)).collect(),
    }
}
