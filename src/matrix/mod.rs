// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Matrix runs
//!
//! Runs one pipeline template once per variant of extra test arguments.
//! Every variant runs even when earlier ones fail, so a matrix build never
//! halts and its verdict is at worst WARNINGS. Cancellation is the exception:
//! it stops the matrix before the next variant and grades it FAILURE.

use std::path::PathBuf;

use colored::Colorize;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::checker::TestSummary;
use crate::context::{properties, BuildContext};
use crate::errors::MobciResult;
use crate::pipeline::{ExecutionOptions, Pipeline, PipelineExecutor, PipelineResult, RunVerdict};

/// One configuration of the test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixVariant {
    /// Label used in logs and in the variant's summary file name
    pub label: String,
    /// Arguments appended to the run command
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl MatrixVariant {
    pub fn new(label: impl Into<String>, extra_args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            label: label.into(),
            extra_args: extra_args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Result of one variant
#[derive(Debug, Clone)]
pub struct VariantResult {
    pub label: String,
    /// Summary artifact of the variant, when the run produced one
    pub summary: Option<TestSummary>,
    pub pipeline: Option<PipelineResult>,
    /// Error that kept the variant's pipeline from running
    pub error: Option<String>,
    pub verdict: RunVerdict,
}

impl VariantResult {
    fn grade(
        label: String,
        summary: Option<TestSummary>,
        pipeline: Option<PipelineResult>,
        error: Option<String>,
    ) -> Self {
        let cancelled = pipeline.as_ref().is_some_and(|p| p.cancelled);
        let step_failures = pipeline.as_ref().is_some_and(|p| !p.failed_steps().is_empty());
        let test_failures = summary.is_some_and(|s| s.failed > 0);

        let verdict = if cancelled {
            RunVerdict::Failure
        } else if step_failures || test_failures || error.is_some() {
            RunVerdict::Warnings
        } else {
            RunVerdict::Success
        };

        Self {
            label,
            summary,
            pipeline,
            error,
            verdict,
        }
    }
}

/// Result of a whole matrix
#[derive(Debug, Clone)]
pub struct MatrixResult {
    /// Variants that started, in order
    pub variants: Vec<VariantResult>,
    pub verdict: RunVerdict,
    /// The build was cancelled before every variant finished
    pub cancelled: bool,
}

impl MatrixResult {
    pub fn variant(&self, label: &str) -> Option<&VariantResult> {
        self.variants.iter().find(|v| v.label == label)
    }

    pub fn print_summary(&self) {
        println!();
        println!("{}", "Matrix:".bold());
        for variant in &self.variants {
            let marker = match variant.verdict {
                RunVerdict::Success => "✓".green(),
                RunVerdict::Warnings => "⚠".yellow(),
                RunVerdict::Failure => "✗".red(),
            };
            let counts = match variant.summary {
                Some(s) => format!("{} total, {} failed", s.total, s.failed),
                None => "no summary".dimmed().to_string(),
            };
            println!("  {} {} ({})", marker, variant.label.bold(), counts);
        }
        if self.cancelled {
            println!("  {}", "Cancelled".red());
        }
        println!("  Verdict: {}", self.verdict);
    }
}

/// Runs a pipeline template across matrix variants
pub struct MatrixRunner<'a> {
    executor: &'a PipelineExecutor,
}

impl<'a> MatrixRunner<'a> {
    pub fn new(executor: &'a PipelineExecutor) -> Self {
        Self { executor }
    }

    /// Run `template` once per variant
    ///
    /// Each variant runs against its own copy of `ctx` with `test_summary`
    /// pointing at a per-variant file, so variants cannot see each other's
    /// writes.
    pub async fn run_matrix(
        &self,
        variants: &[MatrixVariant],
        template: &Pipeline,
        ctx: &BuildContext,
        options: &ExecutionOptions,
    ) -> MatrixResult {
        let template = template.continue_on_failure();
        let summary_dir = match ctx.get_string(properties::BUILD_DIR) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => options.base_dir.clone(),
        };

        let mut results = Vec::with_capacity(variants.len());
        for variant in variants {
            if options.cancel.is_cancelled() {
                warn!(variant = %variant.label, "build cancelled, remaining variants not run");
                break;
            }
            info!(variant = %variant.label, args = ?variant.extra_args, "running matrix variant");
            println!("{} {}", "Variant".bold(), variant.label.cyan());

            let summary_path = summary_dir.join(format!("test-summary-{}.json", variant.label));
            let mut variant_ctx = ctx.clone();
            variant_ctx.set(properties::TEST_SUMMARY, summary_path.as_path());

            let variant_options = options.with_variant_args(variant.extra_args.clone());
            let result = self
                .run_variant(&template, &mut variant_ctx, &variant_options, summary_path)
                .await;

            let graded = match result {
                Ok((pipeline, summary)) => VariantResult::grade(variant.label.clone(), summary, Some(pipeline), None),
                Err(e) => {
                    warn!(variant = %variant.label, error = %e, "matrix variant could not run");
                    VariantResult::grade(variant.label.clone(), None, None, Some(e.to_string()))
                }
            };
            results.push(graded);
        }

        let cancelled = options.cancel.is_cancelled();
        let verdict = if cancelled {
            RunVerdict::Failure
        } else {
            results
                .iter()
                .fold(RunVerdict::Success, |acc, v| acc.worst(v.verdict))
        };
        info!(variants = results.len(), %verdict, cancelled, "matrix finished");

        MatrixResult {
            variants: results,
            verdict,
            cancelled,
        }
    }

    async fn run_variant(
        &self,
        template: &Pipeline,
        ctx: &mut BuildContext,
        options: &ExecutionOptions,
        summary_path: PathBuf,
    ) -> MobciResult<(PipelineResult, Option<TestSummary>)> {
        let pipeline = self.executor.run(template, ctx, options).await?;

        let summary = if summary_path.exists() {
            match TestSummary::load(&summary_path).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    warn!(path = %summary_path.display(), error = %e, "unreadable variant summary");
                    None
                }
            }
        } else {
            None
        };

        Ok((pipeline, summary))
    }
}
