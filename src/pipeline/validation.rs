// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Pipeline validation
//!
//! Validates pipeline configuration before execution.

use std::collections::{HashMap, HashSet};

use crate::errors::CrewflowError;
use crate::pipeline::{DagBuilder, Pipeline, Stage, DEFAULT_BINDING};
use crate::tools::ToolRegistry;

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline configuration
    pub fn validate(pipeline: &Pipeline) -> ValidationResult {
        let mut result = ValidationResult::new();

        if pipeline.stages.is_empty() {
            result.add_error(CrewflowError::EmptyPipeline);
            return result;
        }

        // First declaration wins the position; later duplicates are errors.
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (idx, stage) in pipeline.stages.iter().enumerate() {
            if positions.contains_key(stage.id.as_str()) {
                result.add_error(CrewflowError::DuplicateStage {
                    stage: stage.id.clone(),
                });
            } else {
                positions.insert(&stage.id, idx);
            }
        }

        for (idx, stage) in pipeline.stages.iter().enumerate() {
            Self::validate_stage(idx, stage, pipeline, &positions, &mut result);
        }

        if result.is_valid() {
            Self::check_unused_outputs(pipeline, &mut result);
        }

        for name in pipeline.unresolved_inputs() {
            result.add_warning(&format!(
                "Input '{{{}}}' has no default; pass it with --var {}=<value>",
                name, name
            ));
        }

        let used: HashSet<&str> = pipeline
            .stages
            .iter()
            .filter_map(|s| s.agent.as_deref())
            .collect();
        for name in pipeline.agents.keys() {
            if !used.contains(name.as_str()) {
                result.add_warning(&format!("Agent '{}' is not used by any stage", name));
            }
        }

        result
    }

    /// Validate a single stage
    fn validate_stage(
        idx: usize,
        stage: &Stage,
        pipeline: &Pipeline,
        positions: &HashMap<&str, usize>,
        result: &mut ValidationResult,
    ) {
        if stage.id.trim().is_empty() {
            result.add_error(CrewflowError::InvalidPipeline {
                reason: format!("Stage #{} has an empty id", idx + 1),
                help: None,
            });
        }

        if stage.description.trim().is_empty() {
            result.add_warning(&format!("Stage '{}': description is empty", stage.id));
        }

        let mut seen = HashSet::new();
        for dep in &stage.depends_on {
            if !seen.insert(dep.as_str()) {
                result.add_warning(&format!(
                    "Stage '{}': dependency '{}' is listed twice; its context will appear twice",
                    stage.id, dep
                ));
            }

            match positions.get(dep.as_str()) {
                None => result.add_error(CrewflowError::UnknownDependency {
                    stage: stage.id.clone(),
                    dependency: dep.clone(),
                }),
                Some(&pos) if pos >= idx => result.add_error(CrewflowError::ForwardDependency {
                    stage: stage.id.clone(),
                    dependency: dep.clone(),
                }),
                Some(_) => {}
            }
        }

        if let Some(agent) = &stage.agent {
            match pipeline.agents.get(agent) {
                None => result.add_error(CrewflowError::UnknownAgent {
                    stage: stage.id.clone(),
                    agent: agent.clone(),
                }),
                Some(persona) => {
                    if let Some(llm) = &persona.llm {
                        if llm != DEFAULT_BINDING && !pipeline.llms.contains_key(llm) {
                            result.add_warning(&format!(
                                "Agent '{}': llm '{}' is not defined in this pipeline; \
                                 it must come from your crewflow config",
                                agent, llm
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Warn about stage outputs nothing reads (the last stage is the result)
    fn check_unused_outputs(pipeline: &Pipeline, result: &mut ValidationResult) {
        let Ok(dag) = DagBuilder::build(pipeline) else {
            return;
        };

        let last = pipeline.stages.len() - 1;
        for stage in &pipeline.stages[..last] {
            if dag.dependents(&stage.id).unwrap_or_default().is_empty() {
                result.add_warning(&format!(
                    "Stage '{}': output is not used by any later stage",
                    stage.id
                ));
            }
        }
    }

    /// Check that every tool named by an agent exists in the registry
    pub fn validate_tools(pipeline: &Pipeline, tools: &ToolRegistry) -> Vec<String> {
        let mut missing = Vec::new();

        for (name, persona) in &pipeline.agents {
            for tool in &persona.tools {
                if tools.get(tool).is_none() {
                    missing.push(format!(
                        "Agent '{}': unknown tool '{}' (available: {})",
                        name,
                        tool,
                        tools.names().join(", ")
                    ));
                }
            }
        }

        missing
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<CrewflowError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: CrewflowError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Consume the result, returning the first error if any
    pub fn into_result(self) -> Result<Vec<String>, CrewflowError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.warnings),
        }
    }
}
