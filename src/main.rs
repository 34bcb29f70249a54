// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! mobci - mobile build orchestrator

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mobci::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mobci=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Kill { platform } => mobci::cli::kill::run(platform, cli.verbose).await,
        Commands::Check {
            id,
            couchdb,
            file,
            database,
            wait,
        } => mobci::cli::check::run(id, couchdb, file, database, wait, cli.verbose).await,
        Commands::Build {
            builder,
            number,
            repos_config_uri,
            properties,
        } => {
            mobci::cli::build::run(cli.config, builder, number, repos_config_uri, properties, cli.verbose)
                .await
        }
        Commands::Schedule { once } => mobci::cli::schedule::run(cli.config, once, cli.verbose).await,
        Commands::Validate => mobci::cli::validate::run(cli.config, cli.verbose).await,
    }
}
