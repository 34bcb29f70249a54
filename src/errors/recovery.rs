// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use super::MobciError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &MobciError) -> Option<Self> {
        match error {
            MobciError::RecordNotFound { key, link } => Some(Self::missing_record(key, link)),
            MobciError::StoreUnreachable { uri, .. } => Some(Self::unreachable_store(uri)),
            MobciError::ConfigNotFound { .. } => Some(Self::create_config()),
            MobciError::SpawnFailed { program, .. } => Some(Self::install_tool(program)),
            _ => None,
        }
    }

    /// Suggest installing a missing tool
    pub fn install_tool(tool: &str) -> Self {
        match tool {
            "adb" | "emulator" => Self {
                action: "Install the Android SDK platform tools".into(),
                steps: vec![
                    "The Android SDK is required for android builders".into(),
                    "Make sure ANDROID_HOME/platform-tools is on PATH".into(),
                ],
                commands: vec!["sdkmanager \"platform-tools\" \"emulator\"".into()],
            },
            "npm" | "node" => Self {
                action: "Install Node.js".into(),
                steps: vec!["The test app and its tooling are installed with npm".into()],
                commands: vec![
                    "# Using nvm:".into(),
                    "nvm install --lts".into(),
                ],
            },
            _ => Self {
                action: format!("Install {}", tool),
                steps: vec![format!("Install {} and ensure it's in your PATH", tool)],
                commands: vec![],
            },
        }
    }

    /// Suggest investigating a build that never reported
    pub fn missing_record(key: &str, link: &str) -> Self {
        Self {
            action: format!("Find out why build '{}' never reported results", key),
            steps: vec![
                "The test app did not write a result record to the store".into(),
                "Check the gathered device logs for a crash during startup".into(),
                format!("Expected record location: {}", link),
            ],
            commands: vec![],
        }
    }

    /// Suggest checking store connectivity
    pub fn unreachable_store(uri: &str) -> Self {
        Self {
            action: "Check that the result store is reachable".into(),
            steps: vec![
                format!("Could not connect to {}", uri),
                "The check step can be re-run once the store is back".into(),
            ],
            commands: vec![format!("curl -sf {}/_up", uri.trim_end_matches('/'))],
        }
    }

    /// Suggest creating a configuration file
    pub fn create_config() -> Self {
        Self {
            action: "Create a mobci configuration".into(),
            steps: vec![
                "No configuration file was found".into(),
                "Start from the sample configuration in demos/".into(),
            ],
            commands: vec![
                "mobci validate --config demos/mobci.yaml".into(),
            ],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
