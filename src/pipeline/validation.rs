// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Pipeline validation
//!
//! Validates a pipeline before it runs, including the rule that every
//! property a step reads is written before that step.

use std::collections::{HashMap, HashSet};

use crate::pipeline::{Guard, Pipeline, Step, StepAction};

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline given the properties defined before it starts
    pub fn validate<'a>(
        pipeline: &Pipeline,
        initial_properties: impl IntoIterator<Item = &'a str>,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();

        if pipeline.steps.is_empty() {
            result.add_error(&format!("Pipeline '{}' has no steps defined", pipeline.name));
        }

        // Check for duplicate step ids
        let mut seen_ids = HashSet::new();
        for step in &pipeline.steps {
            if !seen_ids.insert(&step.id) {
                result.add_error(&format!("Duplicate step id: '{}'", step.id));
            }
        }

        let mut defined: HashSet<String> = initial_properties.into_iter().map(str::to_string).collect();
        // Guarded writes, with the guards they were written under
        let mut maybe_defined: HashMap<String, Vec<&Guard>> = HashMap::new();

        for step in &pipeline.steps {
            Self::validate_step(step, &mut result);

            let implied = step.guard.as_ref().and_then(Guard::implied_property);
            for name in step.action.referenced_properties() {
                if defined.contains(name) || implied == Some(name) {
                    continue;
                }
                if maybe_defined.contains_key(name) {
                    result.add_warning(&format!(
                        "Step '{}': Property '{}' is only written by guarded steps",
                        step.id, name
                    ));
                } else {
                    result.add_error(&format!(
                        "Step '{}': Property '{}' is read before any step writes it",
                        step.id, name
                    ));
                }
            }

            for name in step.written_properties() {
                match &step.guard {
                    Some(guard) => {
                        let guards = maybe_defined.entry(name.to_string()).or_default();
                        // Written under both a guard and its complement
                        if guards.iter().any(|g| g.is_complement_of(guard)) {
                            defined.insert(name.to_string());
                        }
                        guards.push(guard);
                    }
                    None => {
                        defined.insert(name.to_string());
                    }
                }
            }
        }

        result
    }

    /// Validate a single step
    fn validate_step(step: &Step, result: &mut ValidationResult) {
        match &step.action {
            StepAction::Exec { program, .. } if program.is_empty() => {
                result.add_error(&format!("Step '{}': Program is empty", step.id));
            }
            StepAction::Shell { script, .. } if script.trim().is_empty() => {
                result.add_error(&format!("Step '{}': Shell script is empty", step.id));
            }
            StepAction::SetProperty { name, .. } if name.is_empty() => {
                result.add_error(&format!("Step '{}': Property name is empty", step.id));
            }
            _ => {}
        }

        if step.timeout.is_some_and(|t| t.is_zero()) {
            result.add_error(&format!("Step '{}': Timeout must be greater than zero", step.id));
        }
    }
}

/// Result of validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    /// Fold another result into this one
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
