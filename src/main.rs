// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! crewflow - Sequential Agent Pipelines
//!
//! Run a fixed sequence of agent stages with explicit context passing.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crewflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crewflow=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    crewflow::utils::init_colors();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Init { template, force } => {
            crewflow::cli::init::run(template, force, cli.verbose).await
        }
        Commands::Run(args) => crewflow::cli::run::run(args, cli.verbose).await,
        Commands::Validate { pipeline } => {
            crewflow::cli::validate::run(pipeline, cli.verbose).await
        }
        Commands::Graph { pipeline, format } => {
            crewflow::cli::graph::run(pipeline, format, cli.verbose).await
        }
        Commands::Check { pipeline } => crewflow::cli::check::run(pipeline, cli.verbose).await,
    }
}
