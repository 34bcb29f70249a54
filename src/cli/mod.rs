// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for mobci.

pub mod build;
pub mod check;
pub mod kill;
pub mod schedule;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::MobciConfig;
use crate::errors::{MobciError, RecoverySuggestion};

/// Mobile build orchestrator
///
/// Runs mobile test apps across platforms and grades builds from their
/// published results.
#[derive(Parser, Debug)]
#[clap(
    name = "mobci",
    version,
    about = "Build-pipeline orchestrator for multi-platform mobile test runs",
    long_about = None,
    after_help = "Examples:\n\
        mobci kill --platform android             Kill stale emulators\n\
        mobci check --id ID --couchdb URI         Check a build's results\n\
        mobci build --builder android-nexus       Run one build\n\
        mobci schedule                            Run the configured schedules\n\n\
        See 'mobci <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file
    #[clap(short, long, global = true, env = "MOBCI_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Terminate stale emulators and simulators of a platform
    Kill {
        /// Target platform (android, ios, windows, browser)
        #[clap(short, long)]
        platform: String,
    },

    /// Fetch and summarize the results of a build
    Check {
        /// Build id
        #[clap(long)]
        id: String,

        /// Result store URI
        #[clap(long, value_name = "URI")]
        couchdb: String,

        /// Write the test summary to this file
        #[clap(short, long)]
        file: Option<PathBuf>,

        /// Database holding result records
        #[clap(long, default_value = crate::checker::DEFAULT_DATABASE)]
        database: String,

        /// Seconds to wait for the store
        #[clap(long, default_value = "30")]
        wait: u64,
    },

    /// Run one build of a configured builder
    Build {
        /// Builder name
        #[clap(short, long)]
        builder: String,

        /// Build number
        #[clap(short, long, default_value = "1")]
        number: u64,

        /// Download the repository matrix from here instead of using the configured repos
        #[clap(long, value_name = "URI")]
        repos_config_uri: Option<String>,

        /// Extra build property (KEY=VALUE)
        #[clap(short = 'D', long = "property", value_name = "KEY=VALUE")]
        properties: Vec<String>,
    },

    /// Run the configured schedules
    Schedule {
        /// Dispatch every schedule once, wait for the builds and exit
        #[clap(long)]
        once: bool,
    },

    /// Validate the configuration and the pipelines it produces
    Validate,
}

/// Load the configuration named on the command line, or the default one
pub fn load_config(path: Option<PathBuf>) -> Result<MobciConfig, MobciError> {
    let path = path.unwrap_or_else(MobciConfig::default_path);
    MobciConfig::load(&path)
}

/// Print a recovery suggestion for `error`, if any, and convert it for miette
pub fn report(error: MobciError) -> miette::Report {
    if let Some(suggestion) = RecoverySuggestion::for_error(&error) {
        eprintln!();
        eprintln!("{}", suggestion);
    }
    miette::Report::new(error)
}
