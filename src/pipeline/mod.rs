// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Pipeline definitions and execution
//!
//! A pipeline is an ordered list of stages. Each stage names the earlier
//! stages whose outputs it needs; the executor runs stages in declaration
//! order and threads those outputs into each prompt.

mod context;
mod dag;
mod definition;
mod executor;
mod interpolate;
mod prompt;
mod validation;

pub use context::{ContextEntry, ExecutionContext};
pub use dag::DagBuilder;
pub use definition::*;
pub use executor::{
    ExecutionOptions, PipelineExecutor, PipelineResult, StageReport, StageStatus,
};
pub use interpolate::{interpolate_str, placeholders};
pub use prompt::{context_section, effective_prompt};
pub use validation::{PipelineValidator, ValidationResult};
