// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Validate command - check pipeline configuration

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::load_pipeline;
use crate::pipeline::PipelineValidator;
use crate::tools::ToolRegistry;

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    let pipeline = match load_pipeline(&pipeline_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("  {} Failed to load pipeline", "✗".red());
            eprintln!();
            return Err(e);
        }
    };

    println!("  {} Pipeline file is valid YAML", "✓".green());

    let validation = PipelineValidator::validate(&pipeline);
    let unknown_tools = PipelineValidator::validate_tools(&pipeline, &ToolRegistry::builtin());

    if !validation.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !unknown_tools.is_empty() {
        println!();
        println!("{}:", "Unknown tools".yellow().bold());
        for missing in &unknown_tools {
            println!("  {} {}", "⚠".yellow(), missing);
        }
    }

    if !validation.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", pipeline.name);
        println!("  Stages: {}", pipeline.stages.len());
        for stage in &pipeline.stages {
            let deps = if stage.depends_on.is_empty() {
                String::new()
            } else {
                format!(" [context: {}]", stage.depends_on.join(", "))
            };
            println!(
                "    - {} ({}){}",
                stage.id,
                pipeline.binding_for(stage),
                deps.dimmed()
            );
        }
    }

    println!();

    let has_warnings = validation.has_warnings() || !unknown_tools.is_empty();
    match validation.into_result() {
        Err(first) => {
            eprintln!("{}", "Pipeline validation failed".red().bold());
            Err(first.into())
        }
        Ok(_) if has_warnings => {
            println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
            Ok(())
        }
        Ok(_) => {
            println!("{}", "Pipeline is valid!".green().bold());
            Ok(())
        }
    }
}
