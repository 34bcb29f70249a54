// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Pipeline executor
//!
//! Runs the steps of a pipeline strictly in declaration order against one
//! build context.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::context::BuildContext;
use crate::errors::{MobciError, MobciResult};
use crate::executors::{create_default_executors, ExecutionResult, Executor, Invocation, ResolvedAction};
use crate::pipeline::{CommandArg, Pipeline, RunVerdict, Step, StepAction};

/// Pipeline execution options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Directory step working directories are relative to
    pub base_dir: PathBuf,
    /// Arguments spliced in for `CommandArg::VariantArgs`
    pub variant_args: Vec<String>,
    /// Cancels the build at the next step boundary, killing the running step
    pub cancel: CancellationToken,
    /// Verbose output
    pub verbose: bool,
}

impl ExecutionOptions {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_variant_args(&self, args: Vec<String>) -> Self {
        Self {
            variant_args: args,
            ..self.clone()
        }
    }
}

/// What happened to one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    /// Succeeded, but graded the build WARNINGS
    Warned,
    Failed {
        exit_code: Option<i32>,
        timed_out: bool,
        reason: Option<String>,
    },
    /// Guard evaluated false
    Skipped,
    /// Not reached because an earlier step halted or the build was cancelled
    NotRun,
}

impl StepOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn was_executed(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Warned | Self::Failed { .. })
    }
}

/// Record of one step in a pipeline run
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub id: String,
    pub outcome: StepOutcome,
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
}

impl StepRecord {
    fn without_output(id: &str, outcome: StepOutcome) -> Self {
        Self {
            id: id.to_string(),
            outcome,
            duration: Duration::ZERO,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Result of executing a pipeline
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// One record per step, in declaration order
    pub records: Vec<StepRecord>,
    pub verdict: RunVerdict,
    pub duration: Duration,
    /// Step whose failure halted the pipeline
    pub halted_at: Option<String>,
    pub cancelled: bool,
}

impl PipelineResult {
    pub fn executed_count(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.was_executed()).count()
    }

    /// Steps not executed, whether skipped by a guard or never reached
    pub fn skipped_count(&self) -> usize {
        self.records.len() - self.executed_count()
    }

    pub fn failed_steps(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.outcome.is_failure())
            .map(|r| r.id.as_str())
            .collect()
    }

    pub fn record(&self, id: &str) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.id == id)
    }
}

/// Pipeline executor
pub struct PipelineExecutor {
    /// Registered executors by tool name
    executors: HashMap<String, Box<dyn Executor>>,
}

impl PipelineExecutor {
    /// Create a pipeline executor without any executors
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Create a pipeline executor with the built-in executors
    pub fn with_default_executors() -> Self {
        let mut executor = Self::new();
        for (name, exec) in create_default_executors() {
            executor.register_executor(&name, exec);
        }
        executor
    }

    /// Register an executor for a tool
    pub fn register_executor(&mut self, name: &str, executor: Box<dyn Executor>) {
        self.executors.insert(name.to_string(), executor);
    }

    /// Execute a pipeline
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        ctx: &mut BuildContext,
        options: &ExecutionOptions,
    ) -> MobciResult<PipelineResult> {
        let start = Instant::now();

        for step in &pipeline.steps {
            if !self.executors.contains_key(step.tool_name()) {
                return Err(MobciError::ExecutorNotFound {
                    tool: step.tool_name().to_string(),
                });
            }
        }

        info!(pipeline = %pipeline.name, steps = pipeline.len(), "running pipeline");

        let mut records = Vec::with_capacity(pipeline.len());
        let mut verdict = RunVerdict::Success;
        let mut halted_at = None;
        let mut cancelled = false;

        for step in &pipeline.steps {
            if halted_at.is_some() || cancelled || options.cancel.is_cancelled() {
                cancelled |= options.cancel.is_cancelled();
                records.push(StepRecord::without_output(&step.id, StepOutcome::NotRun));
                continue;
            }

            if !step.should_run(ctx) {
                debug!(step = %step.id, "guard is false, skipping");
                if options.verbose {
                    println!("  {} {} {}", "○".dimmed(), step.id.dimmed(), "(skipped)".dimmed());
                }
                records.push(StepRecord::without_output(&step.id, StepOutcome::Skipped));
                continue;
            }

            let record = self.run_step(step, ctx, options).await;

            match &record.outcome {
                StepOutcome::Succeeded => {
                    println!(
                        "  {} {} ({:.2}s)",
                        "✓".green(),
                        step.id.bold(),
                        record.duration.as_secs_f64()
                    );
                }
                StepOutcome::Warned => {
                    println!("  {} {} {}", "⚠".yellow(), step.id.bold(), "(warnings)".yellow());
                    verdict = verdict.worst(RunVerdict::Warnings);
                }
                StepOutcome::Failed { timed_out, .. } => {
                    let note = if *timed_out { " (timed out)" } else { "" };
                    println!("  {} {} failed{}", "✗".red(), step.id.bold(), note);

                    if options.verbose && !record.stderr.is_empty() {
                        eprintln!("{}", record.stderr.dimmed());
                    }

                    if options.cancel.is_cancelled() {
                        cancelled = true;
                    } else if step.halt_on_failure {
                        halted_at = Some(step.id.clone());
                    } else {
                        verdict = verdict.worst(RunVerdict::Warnings);
                    }
                }
                StepOutcome::Skipped | StepOutcome::NotRun => {}
            }

            records.push(record);
        }

        if halted_at.is_some() || cancelled {
            verdict = RunVerdict::Failure;
        }

        let duration = start.elapsed();
        info!(
            pipeline = %pipeline.name,
            %verdict,
            halted_at = halted_at.as_deref().unwrap_or(""),
            cancelled,
            "pipeline finished in {:.2}s",
            duration.as_secs_f64()
        );

        Ok(PipelineResult {
            records,
            verdict,
            duration,
            halted_at,
            cancelled,
        })
    }

    /// Execute a single step and apply its property writes
    async fn run_step(
        &self,
        step: &Step,
        ctx: &mut BuildContext,
        options: &ExecutionOptions,
    ) -> StepRecord {
        let start = Instant::now();
        let failed = |reason: String| StepRecord {
            id: step.id.clone(),
            outcome: StepOutcome::Failed {
                exit_code: None,
                timed_out: false,
                reason: Some(reason.clone()),
            },
            duration: start.elapsed(),
            stdout: String::new(),
            stderr: reason,
        };

        let action = match resolve_action(&step.action, ctx, &options.variant_args) {
            Ok(action) => action,
            Err(e) => {
                error!(step = %step.id, error = %e, "could not resolve step");
                return failed(e.to_string());
            }
        };

        let working_dir = match &step.workdir {
            Some(dir) => options.base_dir.join(dir),
            None => options.base_dir.clone(),
        };

        info!(step = %step.id, command = %action.display_command(), "running step");

        let Some(executor) = self.executors.get(step.tool_name()) else {
            return failed(format!("no executor for tool '{}'", step.tool_name()));
        };

        let invocation = Invocation {
            step_id: &step.id,
            action: &action,
            working_dir: &working_dir,
            env: &step.env,
        };

        let execution = bounded(executor.execute(&invocation), step.timeout);
        let result = tokio::select! {
            res = execution => res,
            _ = options.cancel.cancelled() => {
                warn!(step = %step.id, "build cancelled during step");
                return failed("cancelled".to_string());
            }
        };

        let result = match result {
            Bounded::Finished(Ok(result)) => result,
            Bounded::Finished(Err(e)) => {
                error!(step = %step.id, error = %e, "step could not run");
                return failed(e.to_string());
            }
            Bounded::TimedOut(limit) => {
                warn!(step = %step.id, timeout_secs = limit.as_secs(), "step timed out");
                return StepRecord {
                    id: step.id.clone(),
                    outcome: StepOutcome::Failed {
                        exit_code: None,
                        timed_out: true,
                        reason: Some(format!("timed out after {}s", limit.as_secs())),
                    },
                    duration: start.elapsed(),
                    stdout: String::new(),
                    stderr: String::new(),
                };
            }
        };

        let outcome = if !result.success {
            StepOutcome::Failed {
                exit_code: result.exit_code,
                timed_out: false,
                reason: None,
            }
        } else {
            apply_writes(step, &result, ctx);
            if result.warnings {
                StepOutcome::Warned
            } else {
                StepOutcome::Succeeded
            }
        };

        StepRecord {
            id: step.id.clone(),
            outcome,
            duration: start.elapsed(),
            stdout: result.stdout,
            stderr: result.stderr,
        }
    }

    /// List programs the pipeline runs that are not on `PATH`
    pub fn check_tools(&self, pipeline: &Pipeline) -> Vec<String> {
        let mut missing: Vec<String> = pipeline
            .steps
            .iter()
            .filter_map(|step| match &step.action {
                StepAction::Exec { program, .. } => Some(program.as_str()),
                StepAction::Shell { shell, .. } => Some(shell.as_str()),
                _ => None,
            })
            .filter(|program| which::which(program).is_err())
            .map(str::to_string)
            .collect();

        missing.sort();
        missing.dedup();
        missing
    }
}

impl Default for PipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

enum Bounded<T> {
    Finished(T),
    TimedOut(Duration),
}

async fn bounded<F: std::future::Future>(future: F, limit: Option<Duration>) -> Bounded<F::Output> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, future).await {
            Ok(output) => Bounded::Finished(output),
            Err(_) => Bounded::TimedOut(limit),
        },
        None => Bounded::Finished(future.await),
    }
}

fn apply_writes(step: &Step, result: &ExecutionResult, ctx: &mut BuildContext) {
    for (name, value) in &result.properties {
        debug!(step = %step.id, property = %name, "writing property");
        ctx.set(name.clone(), value.clone());
    }
    if let Some(ref name) = step.output_property {
        debug!(step = %step.id, property = %name, "storing step output");
        ctx.set(name.clone(), result.stdout.trim());
    }
}

fn resolve_arg(arg: &CommandArg, ctx: &BuildContext, variant_args: &[String]) -> MobciResult<Vec<String>> {
    match arg {
        CommandArg::Literal(s) => Ok(vec![s.clone()]),
        CommandArg::Property(name) => Ok(vec![ctx.get_string(name)?]),
        CommandArg::VariantArgs => Ok(variant_args.to_vec()),
    }
}

fn resolve_single(arg: &CommandArg, ctx: &BuildContext) -> MobciResult<String> {
    Ok(resolve_arg(arg, ctx, &[])?.join(" "))
}

/// Resolve every argument of an action against the build context
pub fn resolve_action(
    action: &StepAction,
    ctx: &BuildContext,
    variant_args: &[String],
) -> MobciResult<ResolvedAction> {
    Ok(match action {
        StepAction::Exec { program, args } => {
            let mut resolved = Vec::with_capacity(args.len());
            for arg in args {
                resolved.extend(resolve_arg(arg, ctx, variant_args)?);
            }
            ResolvedAction::Exec {
                program: program.clone(),
                args: resolved,
            }
        }
        StepAction::Shell { script, shell } => ResolvedAction::Shell {
            script: script.clone(),
            shell: shell.clone(),
        },
        StepAction::SetProperty { name, value } => ResolvedAction::SetProperty {
            name: name.clone(),
            value: resolve_single(value, ctx)?,
        },
        StepAction::ReadSummary { path } => ResolvedAction::ReadSummary {
            path: Path::new(&resolve_single(path, ctx)?).to_path_buf(),
        },
    })
}
