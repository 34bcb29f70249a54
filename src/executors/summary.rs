// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Summary executor
//!
//! Reads the test summary artifact written by the result checker and grades
//! the build from it. A summary with failed tests succeeds with warnings.

use async_trait::async_trait;
use std::time::Instant;

use super::{ExecutionResult, Executor, Invocation, ResolvedAction};
use crate::checker::TestSummary;
use crate::errors::{MobciError, MobciResult};
use crate::pipeline::RunVerdict;

/// Summary executor
pub struct SummaryExecutor;

#[async_trait]
impl Executor for SummaryExecutor {
    async fn execute(&self, invocation: &Invocation<'_>) -> MobciResult<ExecutionResult> {
        let ResolvedAction::ReadSummary { path } = invocation.action else {
            return Err(MobciError::InvalidStep {
                step: invocation.step_id.to_string(),
                reason: "Expected a summary action".to_string(),
            });
        };

        let start = Instant::now();
        let path = invocation.working_dir.join(path);
        let summary = match TestSummary::load(&path).await {
            Ok(summary) => summary,
            Err(e) => return Ok(ExecutionResult::failure(e.to_string(), None, start.elapsed())),
        };

        let report = format!(
            "total: {}, passed: {}, failed: {}, warnings: {}",
            summary.total, summary.passed, summary.failed, summary.warnings
        );

        let result = ExecutionResult::success(report, start.elapsed());
        match RunVerdict::from_summary(&summary) {
            RunVerdict::Success => Ok(result),
            _ => Ok(result.with_warnings()),
        }
    }
}
