// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! # mobci - mobile build orchestrator
//!
//! `mobci` runs mobile test apps on build workers and grades each build from
//! the results the app publishes to a CouchDB result store.
//!
//! ## Features
//!
//! - **Step pipelines** - ordered, guarded steps with per-step halt policy
//! - **Build properties** - typed per-build values, including computed ones
//! - **Result checking** - fetch result records and write test summaries
//! - **Matrix runs** - one run per platform variant, never halting early
//! - **Scheduling** - fan builds out to builders on a recurring schedule
//!
//! ## Quick Start
//!
//! ```bash
//! # Kill stale Android emulators
//! mobci kill --platform android
//!
//! # Summarize the results of a build
//! mobci check --id android-nexus-12-worker1 --couchdb http://localhost:5984
//!
//! # Run a build of a configured builder
//! mobci build --builder android-nexus --config mobci.yaml
//! ```

pub mod builders;
pub mod checker;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod executors;
pub mod matrix;
pub mod pipeline;
pub mod scheduler;
pub mod terminator;
pub mod utils;

// Re-export commonly used types
pub use context::{BuildContext, PropertyValue};
pub use errors::{MobciError, MobciResult};
pub use pipeline::{Pipeline, RunVerdict, Step};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
