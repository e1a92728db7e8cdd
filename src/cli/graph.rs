// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Graph command - show stage dependencies

use miette::Result;
use std::path::PathBuf;

use super::{load_pipeline, GraphFormat};
use crate::pipeline::DagBuilder;

/// Run the graph command
pub async fn run(pipeline_path: PathBuf, format: GraphFormat, verbose: bool) -> Result<()> {
    let pipeline = load_pipeline(&pipeline_path)?;

    let dag = DagBuilder::build(&pipeline)?;

    let output = match format {
        GraphFormat::Text => dag.to_text(&pipeline),
        GraphFormat::Dot => dag.to_dot(&pipeline),
        GraphFormat::Mermaid => dag.to_mermaid(&pipeline),
    };

    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }

    if verbose {
        eprintln!("longest context chain: {} stage(s)", dag.depth());
    }

    Ok(())
}
