// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Error types
//!
//! Every failure the orchestrator can surface is a variant of [`MobciError`].
//! Variants carry a diagnostic code and, where there is something the
//! operator can do about it, help text.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for mobci operations
pub type MobciResult<T> = Result<T, MobciError>;

/// Main error type for mobci
#[derive(Error, Debug, Diagnostic)]
pub enum MobciError {
    // ─────────────────────────────────────────────────────────────────────────
    // Build Context Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Property '{name}' is not defined in this build")]
    #[diagnostic(
        code(mobci::undefined_property),
        help("Properties must be written by an earlier step before they are read")
    )]
    UndefinedProperty { name: String },

    #[error("Property '{name}' could not be computed: {reason}")]
    #[diagnostic(code(mobci::property_computation))]
    PropertyComputation { name: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Platform Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Unknown platform: {platform}")]
    #[diagnostic(
        code(mobci::unknown_platform),
        help("Known platforms: android, ios, windows, browser")
    )]
    UnknownPlatform { platform: String },

    #[error("Failed to terminate '{task}': {reason}")]
    #[diagnostic(code(mobci::task_termination))]
    TaskTermination { task: String, reason: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Result Store Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("No result record found for '{key}'")]
    #[diagnostic(
        code(mobci::record_not_found),
        help("The test app never reported results. Check the device logs for {link}")
    )]
    RecordNotFound { key: String, link: String },

    #[error("Result store at {uri} is unreachable: {message}")]
    #[diagnostic(
        code(mobci::store_unreachable),
        help("This is usually transient; re-run the check step")
    )]
    StoreUnreachable { uri: String, message: String },

    #[error("Result store returned HTTP {status}: {message}")]
    #[diagnostic(code(mobci::store_error))]
    StoreError { status: u16, message: String },

    #[error("Result record for '{key}' is malformed: {message}")]
    #[diagnostic(code(mobci::invalid_record))]
    InvalidRecord { key: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Executor not found for tool: {tool}")]
    #[diagnostic(
        code(mobci::executor_not_found),
        help("Available executors: process, property, summary")
    )]
    ExecutorNotFound { tool: String },

    #[error("Step '{step}' is invalid: {reason}")]
    #[diagnostic(code(mobci::invalid_step))]
    InvalidStep { step: String, reason: String },

    #[error("Failed to launch '{program}': {error}")]
    #[diagnostic(code(mobci::spawn_failed))]
    SpawnFailed {
        program: String,
        error: String,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Configuration file not found: {}", path.display())]
    #[diagnostic(
        code(mobci::config_not_found),
        help("Pass --config <FILE> or set MOBCI_CONFIG")
    )]
    ConfigNotFound { path: PathBuf },

    #[error("Invalid configuration: {reason}")]
    #[diagnostic(code(mobci::invalid_config))]
    InvalidConfig {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Builder '{builder}' is not configured")]
    #[diagnostic(
        code(mobci::unknown_builder),
        help("Check the 'builders' section of your configuration")
    )]
    UnknownBuilder { builder: String },

    #[error("Scheduler error: {message}")]
    #[diagnostic(code(mobci::scheduler))]
    Scheduler { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{}': {error}", path.display())]
    #[diagnostic(code(mobci::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{}': {error}", path.display())]
    #[diagnostic(code(mobci::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(mobci::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(mobci::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(mobci::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(mobci::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for MobciError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for MobciError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for MobciError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for MobciError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl MobciError {
    /// Whether the caller may reasonably retry the failed operation
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StoreUnreachable { .. })
    }

    /// Create a spawn error with a hint for missing programs
    pub fn spawn_failed(program: &str, error: &std::io::Error) -> Self {
        let help = if error.kind() == std::io::ErrorKind::NotFound {
            Some(format!("'{}' was not found on PATH", program))
        } else {
            None
        };

        Self::SpawnFailed {
            program: program.to_string(),
            error: error.to_string(),
            help,
        }
    }

    /// Create an invalid configuration error without help text
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
            help: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let unreachable = MobciError::StoreUnreachable {
            uri: "http://localhost:5984".into(),
            message: "connection refused".into(),
        };
        assert!(unreachable.is_transient());

        let platform = MobciError::UnknownPlatform { platform: "foo".into() };
        assert!(!platform.is_transient());
    }

    #[test]
    fn test_spawn_failed_not_found_has_help() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        match MobciError::spawn_failed("adb", &io) {
            MobciError::SpawnFailed { help, .. } => {
                assert!(help.unwrap().contains("adb"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
