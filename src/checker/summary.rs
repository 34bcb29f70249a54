// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Test summaries and result records

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{MobciError, MobciResult};

/// Pass/fail counts for one test run
///
/// This is the artifact written by the checker and read by the status step.
/// `passed + failed == total` is expected but never validated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub total: u64,
    pub failed: u64,
    pub passed: u64,
    pub warnings: u64,
}

impl TestSummary {
    /// Derive a summary from the store's spec and failure counts
    pub fn from_counts(specs: u64, failures: u64) -> Self {
        Self {
            total: specs,
            failed: failures,
            passed: specs.saturating_sub(failures),
            warnings: 0,
        }
    }

    /// Load a summary artifact
    pub async fn load(path: &Path) -> MobciResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MobciError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        serde_json::from_str(&content).map_err(Into::into)
    }

    /// Write the summary artifact, creating parent directories
    pub async fn write(&self, path: &Path) -> MobciResult<()> {
        let to_write_error = |e: std::io::Error| MobciError::FileWriteError {
            path: path.to_path_buf(),
            error: e.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(to_write_error)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await.map_err(to_write_error)
    }
}

/// A result record as stored by the test app
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "mobilespec")]
    pub results: RecordResults,
}

/// Counts and failing tests inside a result record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordResults {
    pub specs: u64,
    pub failures: u64,

    /// Failing tests, in the order the store returns them
    #[serde(default, rename = "failedSpecs")]
    pub failed_specs: Vec<FailedSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSpec {
    #[serde(rename = "fullName")]
    pub full_name: String,
}

impl ResultRecord {
    pub fn summary(&self) -> TestSummary {
        TestSummary::from_counts(self.results.specs, self.results.failures)
    }

    /// Full names of failing tests, in store order
    pub fn failing_tests(&self) -> impl Iterator<Item = &str> {
        self.results.failed_specs.iter().map(|s| s.full_name.as_str())
    }
}
