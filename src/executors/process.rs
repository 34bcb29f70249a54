// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Process executor
//!
//! Runs programs and shell scripts as child processes.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;

use super::{ExecutionResult, Executor, Invocation, ResolvedAction};
use crate::errors::{MobciError, MobciResult};

/// Process executor
pub struct ProcessExecutor;

impl ProcessExecutor {
    /// Create a new process executor
    pub fn new() -> Self {
        Self
    }

    fn command_for(action: &ResolvedAction, step_id: &str) -> MobciResult<(String, Command)> {
        match action {
            ResolvedAction::Exec { program, args } => {
                if program.is_empty() {
                    return Err(MobciError::InvalidStep {
                        step: step_id.to_string(),
                        reason: "Program is empty".to_string(),
                    });
                }
                let mut cmd = Command::new(program);
                cmd.args(args);
                Ok((program.clone(), cmd))
            }
            ResolvedAction::Shell { script, shell } => {
                let mut cmd = Command::new(shell);
                let flag = if shell.eq_ignore_ascii_case("cmd") { "/C" } else { "-c" };
                cmd.arg(flag).arg(script);
                Ok((shell.clone(), cmd))
            }
            _ => Err(MobciError::InvalidStep {
                step: step_id.to_string(),
                reason: "Expected a program or shell action".to_string(),
            }),
        }
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    async fn execute(&self, invocation: &Invocation<'_>) -> MobciResult<ExecutionResult> {
        let (program, mut cmd) = Self::command_for(invocation.action, invocation.step_id)?;

        cmd.current_dir(invocation.working_dir)
            .envs(invocation.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let start = Instant::now();
        let output = cmd
            .output()
            .await
            .map_err(|e| MobciError::spawn_failed(&program, &e))?;

        let duration = start.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        Ok(ExecutionResult {
            success: output.status.success(),
            warnings: false,
            stdout,
            stderr,
            exit_code: output.status.code(),
            duration,
            properties: vec![],
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    fn shell(script: &str) -> ResolvedAction {
        ResolvedAction::Shell {
            script: script.into(),
            shell: "sh".into(),
        }
    }

    #[tokio::test]
    async fn test_execute_simple_command() {
        let action = shell("echo hello");
        let env = HashMap::new();
        let invocation = Invocation {
            step_id: "echo",
            action: &action,
            working_dir: Path::new("."),
            env: &env,
        };

        let result = ProcessExecutor::new().execute(&invocation).await.unwrap();
        assert!(result.success);
        assert!(result.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let action = shell("exit 3");
        let env = HashMap::new();
        let invocation = Invocation {
            step_id: "fail",
            action: &action,
            working_dir: Path::new("."),
            env: &env,
        };

        let result = ProcessExecutor::new().execute(&invocation).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let action = ResolvedAction::Exec {
            program: "definitely-not-a-real-program-mobci".into(),
            args: vec![],
        };
        let env = HashMap::new();
        let invocation = Invocation {
            step_id: "missing",
            action: &action,
            working_dir: Path::new("."),
            env: &env,
        };

        let err = ProcessExecutor::new().execute(&invocation).await.unwrap_err();
        assert!(matches!(err, MobciError::SpawnFailed { .. }));
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let action = shell("echo $MOBCI_TEST_VALUE");
        let mut env = HashMap::new();
        env.insert("MOBCI_TEST_VALUE".to_string(), "from-env".to_string());
        let invocation = Invocation {
            step_id: "env",
            action: &action,
            working_dir: Path::new("."),
            env: &env,
        };

        let result = ProcessExecutor::new().execute(&invocation).await.unwrap();
        assert_eq!(result.stdout.trim(), "from-env");
    }
}
