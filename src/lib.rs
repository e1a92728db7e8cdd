// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! # crewflow - Sequential Agent Pipelines
//!
//! `crewflow` runs a fixed sequence of agent stages. Each stage's output is
//! recorded and handed to later stages that declare it as context.
//!
//! ## Features
//!
//! - **Declarative pipelines** - Stages, agents and reasoner profiles in YAML
//! - **Explicit context** - A stage only sees outputs it names
//! - **Pluggable reasoning** - OpenAI, Ollama or a deterministic echo backend
//! - **Tools** - Agents may call registered tools in an act/observe loop
//!
//! ## Quick Start
//!
//! ```bash
//! # Create a pipeline from a template
//! crewflow init --template research-report
//!
//! # Check it
//! crewflow validate
//!
//! # Run it offline
//! crewflow run --backend echo-upper --var topic="Agentic AI"
//! ```
//!
//! ## Library use
//!
//! ```no_run
//! use std::sync::Arc;
//! use crewflow::pipeline::{ExecutionOptions, Pipeline, PipelineExecutor, Stage};
//! use crewflow::reasoning::{EchoReasoner, ReasonerRegistry};
//!
//! # async fn demo() -> crewflow::CrewflowResult<()> {
//! let pipeline = Pipeline::new("demo")
//!     .with_stage(Stage::new("A", "Summarize topic X"))
//!     .with_stage(Stage::new("B", "Write a report using the summary").depends_on(["A"]));
//!
//! let executor = PipelineExecutor::new(ReasonerRegistry::single(Arc::new(EchoReasoner::uppercase())));
//! let result = executor.execute(&pipeline, &ExecutionOptions::default()).await?;
//! println!("{}", result.final_output);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod errors;
pub mod pipeline;
pub mod reasoning;
pub mod tools;
pub mod utils;

// Re-export commonly used types
pub use errors::{CrewflowError, CrewflowResult};
pub use pipeline::{ExecutionContext, Pipeline, PipelineExecutor, Stage};
pub use reasoning::{Reasoner, ReasonerRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
