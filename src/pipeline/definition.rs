// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Pipeline definition structures
//!
//! Steps are assembled in code by the builders module. A step is immutable
//! once built: the builder methods below consume and return it.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::context::{BuildContext, PropertyValue};

/// An ordered list of steps
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Steps in execution order
    pub steps: Vec<Step>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    /// Append a step
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append several steps
    pub fn extend(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Get a step by id
    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Get all step ids
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Copy of this pipeline where no step halts on failure
    pub fn continue_on_failure(&self) -> Self {
        Self {
            name: self.name.clone(),
            steps: self
                .steps
                .iter()
                .cloned()
                .map(|s| s.halt_on_failure(false))
                .collect(),
        }
    }
}

/// A single pipeline step
#[derive(Debug, Clone)]
pub struct Step {
    /// Step id (unique within a pipeline)
    pub id: String,

    /// Human readable description
    pub description: Option<String>,

    /// What the step does
    pub action: StepAction,

    /// Working directory, relative to the build directory
    pub workdir: Option<PathBuf>,

    /// Upper bound on the step's run time
    pub timeout: Option<Duration>,

    /// Abort the rest of the pipeline when this step fails
    pub halt_on_failure: bool,

    /// Run the step only when the guard holds
    pub guard: Option<Guard>,

    /// Store the trimmed standard output under this property on success
    pub output_property: Option<String>,

    /// Extra environment variables
    pub env: HashMap<String, String>,
}

impl Step {
    fn with_action(id: impl Into<String>, action: StepAction) -> Self {
        Self {
            id: id.into(),
            description: None,
            action,
            workdir: None,
            timeout: None,
            halt_on_failure: true,
            guard: None,
            output_property: None,
            env: HashMap::new(),
        }
    }

    /// Run a program directly
    pub fn exec(
        id: impl Into<String>,
        program: impl Into<String>,
        args: impl IntoIterator<Item = CommandArg>,
    ) -> Self {
        Self::with_action(
            id,
            StepAction::Exec {
                program: program.into(),
                args: args.into_iter().collect(),
            },
        )
    }

    /// Run a script through a shell
    pub fn shell(id: impl Into<String>, script: impl Into<String>) -> Self {
        Self::with_action(
            id,
            StepAction::Shell {
                script: script.into(),
                shell: default_shell(),
            },
        )
    }

    /// Write a property without running anything
    pub fn set_property(id: impl Into<String>, name: impl Into<String>, value: CommandArg) -> Self {
        Self::with_action(
            id,
            StepAction::SetProperty {
                name: name.into(),
                value,
            },
        )
    }

    /// Read a test summary artifact and grade the build from it
    pub fn read_summary(id: impl Into<String>, path: CommandArg) -> Self {
        Self::with_action(id, StepAction::ReadSummary { path })
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn in_dir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    pub fn when(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn store_output_as(mut self, property: impl Into<String>) -> Self {
        self.output_property = Some(property.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Get the tool name used to look up this step's executor
    pub fn tool_name(&self) -> &str {
        self.action.tool_name()
    }

    /// Whether the guard (if any) admits this step
    pub fn should_run(&self, ctx: &BuildContext) -> bool {
        self.guard.as_ref().map_or(true, |g| g.evaluate(ctx))
    }

    /// Properties this step writes
    pub fn written_properties(&self) -> Vec<&str> {
        let mut written = Vec::new();
        if let StepAction::SetProperty { name, .. } = &self.action {
            written.push(name.as_str());
        }
        if let Some(ref p) = self.output_property {
            written.push(p.as_str());
        }
        written
    }
}

fn default_shell() -> String {
    if cfg!(windows) {
        "cmd".to_string()
    } else {
        "sh".to_string()
    }
}

/// What a step does
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Run a program with arguments
    Exec {
        program: String,
        args: Vec<CommandArg>,
    },

    /// Run a script through a shell
    Shell { script: String, shell: String },

    /// Write a property
    SetProperty { name: String, value: CommandArg },

    /// Read a test summary artifact
    ReadSummary { path: CommandArg },
}

impl StepAction {
    pub fn tool_name(&self) -> &str {
        match self {
            Self::Exec { .. } | Self::Shell { .. } => "process",
            Self::SetProperty { .. } => "property",
            Self::ReadSummary { .. } => "summary",
        }
    }

    /// Properties this action reads
    pub fn referenced_properties(&self) -> Vec<&str> {
        match self {
            Self::Exec { args, .. } => args.iter().filter_map(CommandArg::property).collect(),
            Self::Shell { .. } => vec![],
            Self::SetProperty { value, .. } => value.property().into_iter().collect(),
            Self::ReadSummary { path } => path.property().into_iter().collect(),
        }
    }
}

/// A command argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandArg {
    /// Used as-is
    Literal(String),
    /// Replaced by the property's value at execution time
    Property(String),
    /// Replaced by the current matrix variant's extra arguments (zero or more)
    VariantArgs,
}

impl CommandArg {
    pub fn lit(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    pub fn prop(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    /// The referenced property name, if any
    pub fn property(&self) -> Option<&str> {
        match self {
            Self::Property(name) => Some(name),
            _ => None,
        }
    }
}

impl From<&str> for CommandArg {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for CommandArg {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

impl fmt::Display for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{}", s),
            Self::Property(name) => write!(f, "<{}>", name),
            Self::VariantArgs => write!(f, "<variant args>"),
        }
    }
}

type Predicate = dyn Fn(&BuildContext) -> bool + Send + Sync;

/// A pure predicate over the build context deciding whether a step runs
#[derive(Clone)]
pub struct Guard {
    label: String,
    predicate: Arc<Predicate>,
    /// Property known to be written whenever the guard holds
    implies: Option<String>,
}

impl Guard {
    pub fn new<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&BuildContext) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
            implies: None,
        }
    }

    /// Holds when the property has been written
    pub fn has_property(name: &str) -> Self {
        let owned = name.to_string();
        let mut guard = Self::new(format!("has {}", name), move |ctx| ctx.contains(&owned));
        guard.implies = Some(name.to_string());
        guard
    }

    /// Holds when the property has not been written
    pub fn lacks_property(name: &str) -> Self {
        Self::has_property(name).complement()
    }

    /// Holds when the property equals the given value
    pub fn property_equals(name: &str, value: impl Into<PropertyValue>) -> Self {
        let owned = name.to_string();
        let expected = value.into();
        Self::new(format!("{} == {}", name, expected), move |ctx| {
            ctx.get(&owned).map(|v| v == expected).unwrap_or(false)
        })
    }

    /// The negation of this guard
    pub fn complement(&self) -> Self {
        let inner = self.predicate.clone();
        Self {
            label: format!("not ({})", self.label),
            predicate: Arc::new(move |ctx| !inner(ctx)),
            implies: None,
        }
    }

    /// Whether `other` was built as the complement of this guard, or vice versa
    pub fn is_complement_of(&self, other: &Guard) -> bool {
        other.label == format!("not ({})", self.label) || self.label == format!("not ({})", other.label)
    }

    /// Property that must exist for the guard to hold
    pub fn implied_property(&self) -> Option<&str> {
        self.implies.as_deref()
    }

    pub fn evaluate(&self, ctx: &BuildContext) -> bool {
        (self.predicate)(ctx)
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Guard").field(&self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complementary_guards_partition() {
        let external = Guard::has_property("repos_config_uri");
        let default = external.complement();

        let mut ctx = BuildContext::new();
        assert!(!external.evaluate(&ctx));
        assert!(default.evaluate(&ctx));

        ctx.set("repos_config_uri", "https://example.com/repos.json");
        assert!(external.evaluate(&ctx));
        assert!(!default.evaluate(&ctx));
    }

    #[test]
    fn test_property_equals_guard() {
        let guard = Guard::property_equals("platform", "windows");
        let mut ctx = BuildContext::new();
        assert!(!guard.evaluate(&ctx));
        ctx.set("platform", "windows");
        assert!(guard.evaluate(&ctx));
        assert_eq!(guard.label(), "platform == windows");
    }

    #[test]
    fn test_continue_on_failure_clears_halt() {
        let pipeline = Pipeline::new("run")
            .step(Step::exec("run-tests", "node", [CommandArg::lit("run.js")]))
            .step(Step::shell("logs", "echo logs").halt_on_failure(true));

        let relaxed = pipeline.continue_on_failure();
        assert!(relaxed.steps.iter().all(|s| !s.halt_on_failure));
        assert!(pipeline.steps.iter().all(|s| s.halt_on_failure));
        assert_eq!(relaxed.step_ids(), vec!["run-tests", "logs"]);
    }

    #[test]
    fn test_referenced_and_written_properties() {
        let step = Step::exec(
            "check",
            "mobci",
            [
                "check".into(),
                CommandArg::lit("--id"),
                CommandArg::prop("build_id"),
                CommandArg::VariantArgs,
            ],
        )
        .store_output_as("check_output");

        assert_eq!(step.action.referenced_properties(), vec!["build_id"]);
        assert_eq!(step.written_properties(), vec!["check_output"]);
        assert_eq!(step.tool_name(), "process");
    }
}
