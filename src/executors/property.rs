// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Property executor
//!
//! Writes a resolved value into the build context without running anything.

use async_trait::async_trait;
use std::time::Duration;

use super::{ExecutionResult, Executor, Invocation, ResolvedAction};
use crate::errors::{MobciError, MobciResult};

/// Property executor
pub struct PropertyExecutor;

#[async_trait]
impl Executor for PropertyExecutor {
    async fn execute(&self, invocation: &Invocation<'_>) -> MobciResult<ExecutionResult> {
        let ResolvedAction::SetProperty { name, value } = invocation.action else {
            return Err(MobciError::InvalidStep {
                step: invocation.step_id.to_string(),
                reason: "Expected a property action".to_string(),
            });
        };

        Ok(ExecutionResult::success(String::new(), Duration::ZERO)
            .with_property(name.clone(), value.clone()))
    }
}
