// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Build pipelines
//!
//! A pipeline is an ordered list of steps run against one build context.
//! Steps may be guarded, may write properties for later steps, and decide
//! through their halt policy whether a failure stops the pipeline.

mod definition;
mod executor;
mod validation;
mod verdict;

pub use definition::*;
pub use executor::{
    resolve_action, ExecutionOptions, PipelineExecutor, PipelineResult, StepOutcome, StepRecord,
};
pub use validation::{PipelineValidator, ValidationResult};
pub use verdict::RunVerdict;
