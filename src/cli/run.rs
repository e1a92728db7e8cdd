// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Run command - execute the pipeline

use colored::Colorize;
use miette::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use super::{load_pipeline, Backend, OutputFormat, RunArgs};
use crate::config::Settings;
use crate::errors::CrewflowError;
use crate::pipeline::{
    EchoTransform, ExecutionContext, ExecutionOptions, Pipeline, PipelineExecutor,
    PipelineResult, PipelineValidator, StageReport, StageStatus,
};
use crate::reasoning::{EchoReasoner, ReasonerRegistry};
use crate::tools::ToolRegistry;
use crate::utils::print_warning;

/// JSON shape of a completed run
#[derive(Serialize)]
struct RunReport<'a> {
    pipeline: &'a str,
    final_output: &'a str,
    fingerprint: String,
    stages: Vec<StageOutput<'a>>,
}

#[derive(Serialize)]
struct StageOutput<'a> {
    id: &'a str,
    status: StageStatus,
    duration_ms: u64,
    output: Option<&'a str>,
}

/// Run the pipeline
pub async fn run(args: RunArgs, verbose: bool) -> Result<()> {
    let overrides = parse_vars(&args.vars)?;

    let pipeline = load_pipeline(&args.pipeline)?.interpolate(&overrides)?;

    let validation = PipelineValidator::validate(&pipeline);
    if !validation.is_valid() {
        eprintln!("{}", "Pipeline validation failed:".red().bold());
        for error in &validation.errors {
            eprintln!("  {} {}", "✗".red(), error);
        }
    }

    let warnings = validation.into_result()?;
    if !warnings.is_empty() && verbose {
        eprintln!("{}", "Pipeline warnings:".yellow().bold());
        for warning in &warnings {
            eprintln!("  {} {}", "⚠".yellow(), warning);
        }
        eprintln!();
    }

    let tools = ToolRegistry::builtin();
    for warning in PipelineValidator::validate_tools(&pipeline, &tools) {
        print_warning(&warning);
    }

    let settings = Settings::load()?;
    let registry = match args.backend {
        Some(backend) => offline_registry(backend, &settings, &tools),
        None => settings.build_registry(&pipeline, &tools)?,
    };

    let executor = PipelineExecutor::new(registry);

    // Progress goes to stdout, so keep it out of machine-readable runs.
    let options = ExecutionOptions {
        dry_run: args.dry_run,
        verbose,
        show_progress: args.format == OutputFormat::Text,
    };

    let start = Instant::now();
    let mut context = ExecutionContext::new();
    let mut reports = Vec::with_capacity(pipeline.stages.len());
    let final_output = match executor
        .execute_with_context(&pipeline, &options, &mut context, &mut reports)
        .await
    {
        Ok(output) => output,
        Err(e) => {
            print_stage_summary(&reports);
            return Err(e.into());
        }
    };
    let result = PipelineResult {
        final_output,
        context,
        reports,
        duration: start.elapsed(),
    };

    if args.dry_run {
        if args.format == OutputFormat::Json {
            println!("{}", render_json(&pipeline, &result)?);
        }
        return Ok(());
    }

    let rendered = match args.format {
        OutputFormat::Text => render_text(&result, args.show_context),
        OutputFormat::Json => render_json(&pipeline, &result)?,
    };
    println!("{}", rendered);

    if let Some(path) = &args.output {
        std::fs::write(path, &result.final_output).map_err(|e| CrewflowError::FileWriteError {
            path: path.clone(),
            error: e.to_string(),
        })?;
        tracing::info!("final output written to {}", path.display());
    }

    Ok(())
}

/// Parse repeated `--var name=value` flags
fn parse_vars(vars: &[String]) -> Result<BTreeMap<String, String>> {
    vars.iter()
        .map(|var| {
            let (name, value) = var.split_once('=').ok_or_else(|| {
                miette::miette!("Invalid --var '{}': expected NAME=VALUE", var)
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(miette::miette!("Invalid --var '{}': empty name", var));
            }
            Ok((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Every binding resolves to the chosen echo backend
fn offline_registry(backend: Backend, settings: &Settings, tools: &ToolRegistry) -> ReasonerRegistry {
    let transform = match backend {
        Backend::Echo => EchoTransform::Identity,
        Backend::EchoUpper => EchoTransform::Uppercase,
    };
    let registry = ReasonerRegistry::single(Arc::new(EchoReasoner::new(transform)));
    settings.with_tool_loop(registry, tools)
}

/// Per-stage status lines on stderr, for runs that stopped early
fn print_stage_summary(reports: &[StageReport]) {
    if reports.is_empty() {
        return;
    }
    eprintln!("{}", "Stage summary:".bold());
    for line in stage_summary(reports) {
        eprintln!("{}", line);
    }
}

fn stage_summary(reports: &[StageReport]) -> Vec<String> {
    reports
        .iter()
        .map(|r| {
            let marker = match r.status {
                StageStatus::Completed => "✓".green(),
                StageStatus::Failed => "✗".red(),
                StageStatus::Running => "…".yellow(),
                StageStatus::Pending => "·".dimmed(),
            };
            format!("  {} {} {}", marker, r.id, r.status)
        })
        .collect()
}

fn render_text(result: &PipelineResult, show_context: bool) -> String {
    if !show_context {
        return result.final_output.clone();
    }

    let mut out = String::new();
    for entry in result.context.entries() {
        out.push_str(&format!("\n{}:\n{}\n", entry.stage.bold(), entry.output));
    }
    out.push_str(&format!(
        "\n{} {}",
        "Fingerprint:".dimmed(),
        result.context.fingerprint().dimmed()
    ));
    out
}

fn render_json(pipeline: &Pipeline, result: &PipelineResult) -> Result<String> {
    let report = RunReport {
        pipeline: &pipeline.name,
        final_output: &result.final_output,
        fingerprint: result.context.fingerprint(),
        stages: result
            .reports
            .iter()
            .map(|r| StageOutput {
                id: &r.id,
                status: r.status,
                duration_ms: r.duration.as_millis() as u64,
                output: result.context.get(&r.id),
            })
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&report).map_err(CrewflowError::from)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vars() {
        let vars = parse_vars(&[
            "topic=Agentic AI".to_string(),
            "expr=a=b".to_string(),
            "empty=".to_string(),
        ])
        .unwrap();

        assert_eq!(vars["topic"], "Agentic AI");
        assert_eq!(vars["expr"], "a=b");
        assert_eq!(vars["empty"], "");
    }

    #[test]
    fn test_parse_vars_rejects_malformed() {
        assert!(parse_vars(&["novalue".to_string()]).is_err());
        assert!(parse_vars(&["=x".to_string()]).is_err());
    }

    #[tokio::test]
    async fn test_render_json_shape() {
        let pipeline = Pipeline::new("demo")
            .with_stage(crate::pipeline::Stage::new("A", "Summarize topic X"));
        let executor =
            PipelineExecutor::new(ReasonerRegistry::single(Arc::new(EchoReasoner::uppercase())));
        let result = executor
            .execute(&pipeline, &ExecutionOptions::default())
            .await
            .unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&render_json(&pipeline, &result).unwrap()).unwrap();
        assert_eq!(json["pipeline"], "demo");
        assert_eq!(json["final_output"], "SUMMARIZE TOPIC X");
        assert_eq!(json["stages"][0]["id"], "A");
        assert_eq!(json["stages"][0]["status"], "completed");
        assert_eq!(json["fingerprint"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn test_stage_summary_lists_every_status() {
        colored::control::set_override(false);
        let report = |id: &str, status| StageReport {
            id: id.to_string(),
            binding: "default".to_string(),
            status,
            duration: std::time::Duration::ZERO,
            prompt_len: 0,
            output_len: 0,
        };

        let lines = stage_summary(&[
            report("one", StageStatus::Completed),
            report("two", StageStatus::Failed),
            report("three", StageStatus::Pending),
        ]);

        assert_eq!(
            lines,
            vec!["  ✓ one completed", "  ✗ two failed", "  · three pending"]
        );
    }
}
