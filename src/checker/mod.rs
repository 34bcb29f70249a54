// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Result checker
//!
//! Looks up the result record a test app wrote for a build and turns it into
//! a [`TestSummary`]. The checker queries once: an unreachable store is
//! reported as a transient error and retrying is left to the caller.

mod couchdb;
mod summary;

pub use couchdb::{CouchDbStore, DEFAULT_DATABASE};
pub use summary::{FailedSpec, RecordResults, ResultRecord, TestSummary};

use async_trait::async_trait;
use colored::Colorize;
use std::path::Path;
use tracing::{info, warn};

use crate::errors::MobciResult;
use crate::pipeline::RunVerdict;

/// A remote store of result records
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Fetch the record stored under `key`
    async fn fetch(&self, key: &str) -> MobciResult<ResultRecord>;

    /// Link to the record for humans
    fn record_link(&self, key: &str) -> String;
}

/// Store key for a build's result record
pub fn record_key(build_id: &str) -> &str {
    build_id
}

/// Result of a successful check
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub build_id: String,
    pub link: String,
    pub summary: TestSummary,
    /// Failing test names, in store order
    pub failing_tests: Vec<String>,
}

impl CheckReport {
    pub fn verdict(&self) -> RunVerdict {
        RunVerdict::from_summary(&self.summary)
    }

    /// Print the human-readable report
    pub fn print(&self) {
        println!();
        println!("{}: {}", "Results".bold(), self.build_id);
        println!("  Record: {}", self.link.cyan());
        println!(
            "  {} total, {} passed, {} failed, {} warnings",
            self.summary.total,
            self.summary.passed.to_string().green(),
            if self.summary.failed > 0 {
                self.summary.failed.to_string().red()
            } else {
                self.summary.failed.to_string().normal()
            },
            self.summary.warnings
        );

        if !self.failing_tests.is_empty() {
            println!();
            println!("{}:", "Failing tests".red().bold());
            for name in &self.failing_tests {
                println!("  {} {}", "✗".red(), name);
            }
        }
    }
}

/// Result checker over a store
pub struct ResultChecker<S> {
    store: S,
}

impl<S: ResultStore> ResultChecker<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Fetch and summarize the results of a build
    ///
    /// When `output_path` is given the summary is written there as JSON.
    pub async fn check(&self, build_id: &str, output_path: Option<&Path>) -> MobciResult<CheckReport> {
        let key = record_key(build_id);
        let record = self.store.fetch(key).await.inspect_err(|e| {
            warn!(build_id, error = %e, "result check failed");
        })?;

        let summary = record.summary();
        if summary.passed + summary.failed != summary.total {
            // propagated as-is
            warn!(build_id, ?summary, "result counts are inconsistent");
        }

        if let Some(path) = output_path {
            summary.write(path).await?;
        }

        info!(
            build_id,
            total = summary.total,
            failed = summary.failed,
            "results checked"
        );

        Ok(CheckReport {
            build_id: build_id.to_string(),
            link: self.store.record_link(key),
            summary,
            failing_tests: record.failing_tests().map(str::to_string).collect(),
        })
    }
}
