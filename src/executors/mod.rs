// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Step executors
//!
//! This module provides the executor trait and the built-in implementations
//! for running processes, writing properties and reading test summaries.

mod process;
mod property;
mod summary;

pub use process::ProcessExecutor;
pub use property::PropertyExecutor;
pub use summary::SummaryExecutor;

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::PropertyValue;
use crate::errors::MobciResult;

/// A step action with every argument resolved against the build context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAction {
    Exec { program: String, args: Vec<String> },
    Shell { script: String, shell: String },
    SetProperty { name: String, value: String },
    ReadSummary { path: PathBuf },
}

impl ResolvedAction {
    /// Short rendering for logs
    pub fn display_command(&self) -> String {
        match self {
            Self::Exec { program, args } if args.is_empty() => program.clone(),
            Self::Exec { program, args } => format!("{} {}", program, args.join(" ")),
            Self::Shell { script, shell } => format!("{} -c '{}'", shell, script),
            Self::SetProperty { name, value } => format!("set {}={}", name, value),
            Self::ReadSummary { path } => format!("read {}", path.display()),
        }
    }
}

/// What an executor needs to run one step
#[derive(Debug)]
pub struct Invocation<'a> {
    /// Step id, for logging
    pub step_id: &'a str,
    pub action: &'a ResolvedAction,
    pub working_dir: &'a Path,
    pub env: &'a HashMap<String, String>,
}

/// Result of step execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    /// Whether execution succeeded
    pub success: bool,

    /// Succeeded, but the build should be graded WARNINGS
    pub warnings: bool,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Exit code (`None` when killed by a signal)
    pub exit_code: Option<i32>,

    /// Execution duration
    pub duration: Duration,

    /// Properties to write into the build context
    pub properties: Vec<(String, PropertyValue)>,
}

impl ExecutionResult {
    /// Create a successful result
    pub fn success(stdout: String, duration: Duration) -> Self {
        Self {
            success: true,
            stdout,
            exit_code: Some(0),
            duration,
            ..Self::default()
        }
    }

    /// Create a failed result
    pub fn failure(stderr: String, exit_code: Option<i32>, duration: Duration) -> Self {
        Self {
            success: false,
            stderr,
            exit_code,
            duration,
            ..Self::default()
        }
    }

    /// Add a property write to this result
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.push((name.into(), value.into()));
        self
    }

    /// Mark a successful result as carrying warnings
    pub fn with_warnings(mut self) -> Self {
        self.warnings = true;
        self
    }
}

/// Trait for step executors
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a resolved step action
    ///
    /// Executors must be cancel-safe: the pipeline executor drops the
    /// returned future on timeout or cancellation, and any child process
    /// must die with it.
    async fn execute(&self, invocation: &Invocation<'_>) -> MobciResult<ExecutionResult>;
}

/// Create the standard executor set
pub fn create_default_executors() -> HashMap<String, Box<dyn Executor>> {
    let mut executors: HashMap<String, Box<dyn Executor>> = HashMap::new();

    executors.insert("process".to_string(), Box::new(ProcessExecutor::new()));
    executors.insert("property".to_string(), Box::new(PropertyExecutor));
    executors.insert("summary".to_string(), Box::new(SummaryExecutor));

    executors
}
