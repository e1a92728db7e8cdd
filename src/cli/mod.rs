// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for crewflow.

pub mod check;
pub mod graph;
pub mod init;
pub mod run;
pub mod validate;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Default pipeline file name
pub const DEFAULT_PIPELINE_FILE: &str = "crewflow.yaml";

/// Sequential agent pipeline runner
///
/// Run a fixed sequence of agent stages, each seeing the outputs it names.
#[derive(Parser, Debug)]
#[clap(
    name = "crewflow",
    version,
    about = "Run sequential multi-agent pipelines with explicit context passing",
    long_about = None,
    after_help = "Examples:\n\
        crewflow init                          Create crewflow.yaml\n\
        crewflow validate                      Check the pipeline\n\
        crewflow run --var topic=\"Agentic AI\"  Execute the pipeline\n\
        crewflow run --backend echo-upper      Execute offline\n\
        crewflow graph --format mermaid        Show stage dependencies\n\n\
        See 'crewflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new pipeline file from a template
    Init {
        /// Template (research-report, startup, financial, code-review, strategic-planning, react)
        #[clap(short, long)]
        template: Option<String>,

        /// Overwrite an existing pipeline file
        #[clap(long)]
        force: bool,
    },

    /// Run the pipeline
    Run(RunArgs),

    /// Validate pipeline configuration
    Validate {
        /// Pipeline file to validate
        #[clap(default_value = DEFAULT_PIPELINE_FILE)]
        pipeline: PathBuf,
    },

    /// Show stage dependencies as a graph
    Graph {
        /// Pipeline file
        #[clap(default_value = DEFAULT_PIPELINE_FILE)]
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, default_value = "text")]
        format: GraphFormat,
    },

    /// Check that every reasoner the pipeline binds is reachable
    Check {
        /// Pipeline file
        #[clap(default_value = DEFAULT_PIPELINE_FILE)]
        pipeline: PathBuf,
    },
}

/// Arguments for `crewflow run`
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Pipeline file
    #[clap(short, long, default_value = DEFAULT_PIPELINE_FILE)]
    pub pipeline: PathBuf,

    /// Input value for a `{name}` placeholder (repeatable)
    #[clap(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Use an offline backend for every stage instead of configured LLMs
    #[clap(short, long)]
    pub backend: Option<Backend>,

    /// Output format
    #[clap(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Print every stage's output, not only the final one
    #[clap(long)]
    pub show_context: bool,

    /// Also write the final output to a file
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Dry run (show what would be done)
    #[clap(long)]
    pub dry_run: bool,
}

/// Output format for the run command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Offline backends selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Echo,
    EchoUpper,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "echo" => Ok(Self::Echo),
            "echo-upper" => Ok(Self::EchoUpper),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

impl std::str::FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(format!("Unknown graph format: {}", s)),
        }
    }
}

/// Load a pipeline, pointing at `crewflow init` when the file is missing
pub(crate) fn load_pipeline(path: &std::path::Path) -> miette::Result<crate::Pipeline> {
    if !path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}\n\n\
             Run 'crewflow init' to create a new pipeline.",
            path.display()
        ));
    }

    Ok(crate::Pipeline::from_file(path)?)
}
