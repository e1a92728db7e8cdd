// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Error types
//!
//! Pipeline errors carry a diagnostic code and, where one exists, a hint that
//! points the user at the fix rather than just the failure.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::reasoning::ReasoningError;

/// Result type for crewflow operations
pub type CrewflowResult<T> = Result<T, CrewflowError>;

/// Main error type for crewflow
#[derive(Error, Debug, Diagnostic)]
pub enum CrewflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(crewflow::pipeline_not_found),
        help("Create a pipeline with 'crewflow init' or write crewflow.yaml manually")
    )]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(crewflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Pipeline has no stages")]
    #[diagnostic(
        code(crewflow::empty_pipeline),
        help("Add at least one entry under 'stages:'")
    )]
    EmptyPipeline,

    #[error("Stage id '{stage}' is declared more than once")]
    #[diagnostic(code(crewflow::duplicate_stage))]
    DuplicateStage { stage: String },

    #[error("Stage '{stage}' depends on unknown stage '{dependency}'")]
    #[diagnostic(
        code(crewflow::unknown_dependency),
        help("Check that '{dependency}' is defined in your pipeline")
    )]
    UnknownDependency { stage: String, dependency: String },

    #[error("Stage '{stage}' depends on '{dependency}', which is declared after it")]
    #[diagnostic(
        code(crewflow::forward_dependency),
        help("Stages run in declaration order; move '{dependency}' above '{stage}'")
    )]
    ForwardDependency { stage: String, dependency: String },

    #[error("Stage '{stage}' references unknown agent '{agent}'")]
    #[diagnostic(
        code(crewflow::unknown_agent),
        help("Define '{agent}' under 'agents:' or remove the reference")
    )]
    UnknownAgent { stage: String, agent: String },

    #[error("Unresolved input '{{{name}}}' in {location}")]
    #[diagnostic(
        code(crewflow::missing_input),
        help("Pass it with --var {name}=<value> or add it under 'inputs:'")
    )]
    MissingInput { name: String, location: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Stage '{stage}' needs the output of '{dependency}', which has not been recorded")]
    #[diagnostic(code(crewflow::missing_context))]
    MissingContext { stage: String, dependency: String },

    #[error("Output for stage '{stage}' has already been recorded")]
    #[diagnostic(code(crewflow::context_already_recorded))]
    ContextAlreadyRecorded { stage: String },

    #[error("No reasoner bound to '{binding}' (needed by stage '{stage}')")]
    #[diagnostic(
        code(crewflow::reasoner_not_found),
        help("Define '{binding}' under 'llms:' in the pipeline or in your crewflow config")
    )]
    ReasonerNotFound { binding: String, stage: String },

    #[error("Stage '{stage}' failed")]
    #[diagnostic(code(crewflow::reasoning_failed))]
    ReasoningFailed {
        stage: String,
        #[source]
        source: ReasoningError,
        #[help]
        help: Option<String>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // File / Config Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(crewflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(crewflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(crewflow::config_error))]
    ConfigError { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(crewflow::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(crewflow::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(crewflow::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(crewflow::toml_error))]
    Toml { message: String },
}

impl From<std::io::Error> for CrewflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for CrewflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for CrewflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for CrewflowError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl CrewflowError {
    /// Wrap a reasoner failure with the failing stage and a hint
    pub fn reasoning_failed(stage: &str, source: ReasoningError) -> Self {
        let help = Self::help_for_reasoning_error(&source);
        Self::ReasoningFailed {
            stage: stage.to_string(),
            source,
            help,
        }
    }

    /// True for errors raised by pipeline configuration rather than a backend
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPipeline { .. }
                | Self::EmptyPipeline
                | Self::DuplicateStage { .. }
                | Self::UnknownDependency { .. }
                | Self::ForwardDependency { .. }
                | Self::UnknownAgent { .. }
                | Self::MissingInput { .. }
                | Self::MissingContext { .. }
                | Self::ReasonerNotFound { .. }
        )
    }

    /// The stage this error is attributed to, if any
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::DuplicateStage { stage }
            | Self::UnknownDependency { stage, .. }
            | Self::ForwardDependency { stage, .. }
            | Self::UnknownAgent { stage, .. }
            | Self::MissingContext { stage, .. }
            | Self::ContextAlreadyRecorded { stage }
            | Self::ReasonerNotFound { stage, .. }
            | Self::ReasoningFailed { stage, .. } => Some(stage),
            _ => None,
        }
    }

    fn help_for_reasoning_error(error: &ReasoningError) -> Option<String> {
        match error {
            ReasoningError::Auth(_) => {
                Some("Export the API key named by 'api_key_env' (default OPENAI_API_KEY)".into())
            }
            ReasoningError::Transport(_) => {
                Some("Check that the provider is reachable; for Ollama run 'ollama serve'".into())
            }
            ReasoningError::Api { status: 429, .. } => {
                Some("The provider is rate limiting or out of quota; retry later".into())
            }
            ReasoningError::ToolLoopExhausted { .. } => {
                Some("Raise [tools] max_iterations or simplify the stage".into())
            }
            _ => None,
        }
    }
}
