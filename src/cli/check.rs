// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Check command - verify the reasoners a pipeline binds to

use colored::Colorize;
use miette::Result;
use std::collections::BTreeSet;
use std::path::PathBuf;

use super::load_pipeline;
use crate::config::Settings;
use crate::pipeline::PipelineExecutor;
use crate::tools::ToolRegistry;
use crate::utils::{print_error, print_header, print_success};

/// Run the check command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    let pipeline = load_pipeline(&pipeline_path)?;
    let settings = Settings::load()?;

    let profiles = settings.merged_profiles(&pipeline);
    let registry = settings.build_registry(&pipeline, &ToolRegistry::builtin())?;

    print_header(&format!("Reasoners for {}", pipeline.name));

    let used: BTreeSet<&str> = pipeline
        .stages
        .iter()
        .map(|s| pipeline.binding_for(s))
        .collect();

    if verbose {
        for (name, profile) in &profiles {
            let marker = if used.contains(name.as_str()) { "*" } else { " " };
            println!("  {} {} = {}", marker, name, profile.label().dimmed());
        }
        println!();
    }

    let unavailable = PipelineExecutor::new(registry)
        .check_reasoners(&pipeline)
        .await?;

    for binding in &used {
        let label = profiles
            .get(*binding)
            .map(|p| p.label())
            .unwrap_or_default();
        let line = format!("{} ({})", binding, label);
        if unavailable.iter().any(|u| u.starts_with(&format!("{} (", binding))) {
            print_error(&line);
        } else {
            print_success(&line);
        }
    }

    println!();
    if unavailable.is_empty() {
        println!("{}", "All reasoners are available.".green().bold());
        Ok(())
    } else {
        Err(miette::miette!(
            help = "Check API keys (e.g. OPENAI_API_KEY) and that local servers are running",
            "{} reasoner(s) unavailable: {}",
            unavailable.len(),
            unavailable.join(", ")
        ))
    }
}
