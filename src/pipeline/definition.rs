// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Pipeline definition structures
//!
//! Defines the schema for crewflow.yaml files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::CrewflowError;

/// Binding name used when a stage has no agent, or its agent names no llm
pub const DEFAULT_BINDING: &str = "default";

/// Pipeline definition from crewflow.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    /// Pipeline name
    pub name: String,

    /// Pipeline description
    #[serde(default)]
    pub description: Option<String>,

    /// Default values for `{name}` placeholders
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,

    /// Named reasoner profiles
    #[serde(default)]
    pub llms: BTreeMap<String, LlmProfile>,

    /// Named agent personas
    #[serde(default)]
    pub agents: BTreeMap<String, Persona>,

    /// Stages in execution order
    pub stages: Vec<Stage>,
}

fn default_version() -> String {
    "1".to_string()
}

impl Pipeline {
    /// Create an empty pipeline with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            name: name.into(),
            description: None,
            inputs: BTreeMap::new(),
            llms: BTreeMap::new(),
            agents: BTreeMap::new(),
            stages: Vec::new(),
        }
    }

    /// Append a stage
    pub fn with_stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    /// Register an agent persona
    pub fn with_agent(mut self, name: impl Into<String>, persona: Persona) -> Self {
        self.agents.insert(name.into(), persona);
        self
    }

    /// Load pipeline from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, CrewflowError> {
        if !path.exists() {
            return Err(CrewflowError::PipelineNotFound {
                path: path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| CrewflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        Self::from_yaml(&content)
    }

    /// Parse pipeline from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, CrewflowError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Serialize pipeline to YAML
    pub fn to_yaml(&self) -> Result<String, CrewflowError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get a stage by id
    pub fn get_stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Position of a stage in declaration order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.id == id)
    }

    /// Get all stage ids
    pub fn stage_ids(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.id.as_str()).collect()
    }

    /// The persona a stage is bound to, if it names one that exists
    pub fn persona_for(&self, stage: &Stage) -> Option<&Persona> {
        stage.agent.as_ref().and_then(|name| self.agents.get(name))
    }

    /// Reasoner binding name for a stage
    pub fn binding_for(&self, stage: &Stage) -> &str {
        self.persona_for(stage)
            .and_then(|p| p.llm.as_deref())
            .unwrap_or(DEFAULT_BINDING)
    }
}

/// A single pipeline stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    /// Stage id (must be unique within pipeline)
    pub id: String,

    /// The work this stage performs
    pub description: String,

    /// What the answer should look like; passed to the reasoner, not the prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,

    /// Persona name from the pipeline's `agents`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,

    /// Upstream stages whose outputs are rendered into this stage's prompt
    #[serde(default, alias = "context", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl Stage {
    /// Create a stage with no dependencies
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            expected_output: None,
            agent: None,
            depends_on: Vec::new(),
        }
    }

    /// Add upstream dependencies, in the order their context is rendered
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Bind the stage to a persona
    pub fn with_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    /// Describe the expected answer
    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }
}

/// Agent persona: opaque configuration handed to the reasoner
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Persona {
    /// Role name, e.g. "Research Analyst"
    pub role: String,

    /// What the agent is trying to achieve
    #[serde(default)]
    pub goal: String,

    /// Background that shapes the agent's voice
    #[serde(default)]
    pub backstory: String,

    /// Reasoner binding; falls back to `default`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<String>,

    /// Tool names the agent may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

impl Persona {
    /// Create a persona with the given role, goal and backstory
    pub fn new(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            llm: None,
            tools: Vec::new(),
        }
    }

    /// Render the persona as a system instruction
    pub fn system_prompt(&self) -> String {
        let mut out = format!("You are {}.", self.role);
        if !self.backstory.is_empty() {
            out.push(' ');
            out.push_str(&self.backstory);
        }
        if !self.goal.is_empty() {
            out.push_str("\nYour personal goal is: ");
            out.push_str(&self.goal);
        }
        out
    }
}

/// Reasoner profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum LlmProfile {
    /// OpenAI-compatible chat completions endpoint
    #[serde(rename = "openai")]
    OpenAi {
        /// Model name
        model: String,

        /// API base URL
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,

        /// Environment variable holding the API key
        #[serde(default = "default_api_key_env")]
        api_key_env: String,

        /// Sampling temperature
        #[serde(default, skip_serializing_if = "Option::is_none")]
        temperature: Option<f32>,

        /// Completion token limit
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_tokens: Option<u32>,

        /// Per-request timeout
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,

        /// Attempts after the first on transport failure
        #[serde(default = "default_max_retries")]
        max_retries: u32,
    },

    /// Local Ollama server
    Ollama {
        /// Model name
        model: String,

        /// Server URL
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,

        /// Sampling temperature
        #[serde(default, skip_serializing_if = "Option::is_none")]
        temperature: Option<f32>,

        /// Completion token limit
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_tokens: Option<u32>,

        /// Per-request timeout
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,

        /// Attempts after the first on transport failure
        #[serde(default = "default_max_retries")]
        max_retries: u32,
    },

    /// Deterministic offline stub
    Echo {
        #[serde(default)]
        transform: EchoTransform,
    },
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

impl LlmProfile {
    /// OpenAI profile with default settings
    pub fn openai(model: impl Into<String>) -> Self {
        Self::OpenAi {
            model: model.into(),
            base_url: None,
            api_key_env: default_api_key_env(),
            temperature: None,
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }

    /// Ollama profile with default settings
    pub fn ollama(model: impl Into<String>) -> Self {
        Self::Ollama {
            model: model.into(),
            base_url: None,
            temperature: None,
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }

    /// Provider name
    pub fn provider(&self) -> &'static str {
        match self {
            Self::OpenAi { .. } => "openai",
            Self::Ollama { .. } => "ollama",
            Self::Echo { .. } => "echo",
        }
    }

    /// Short human-readable label
    pub fn label(&self) -> String {
        match self {
            Self::OpenAi { model, .. } | Self::Ollama { model, .. } => {
                format!("{}:{}", self.provider(), model)
            }
            Self::Echo { transform } => format!("echo:{transform}"),
        }
    }
}

/// Transform applied by the echo reasoner
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EchoTransform {
    /// Return the prompt unchanged
    #[default]
    Identity,
    /// Return the prompt uppercased
    Uppercase,
}

impl std::fmt::Display for EchoTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Uppercase => write!(f, "uppercase"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_pipeline() {
        let yaml = r#"
version: "1"
name: "research-report"
stages:
  - id: research
    description: "Research latest trends in Agentic AI."
"#;

        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        assert_eq!(pipeline.name, "research-report");
        assert_eq!(pipeline.stages.len(), 1);
        assert_eq!(pipeline.stages[0].id, "research");
        assert!(pipeline.stages[0].depends_on.is_empty());
    }

    #[test]
    fn test_context_alias_for_dependencies() {
        let yaml = r#"
name: "chain"
stages:
  - id: idea
    description: "Generate one idea."
  - id: critique
    description: "Critique the idea."
    context: [idea]
  - id: refine
    description: "Refine."
    depends_on: [idea, critique]
"#;

        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        assert_eq!(pipeline.stages[1].depends_on, vec!["idea"]);
        assert_eq!(pipeline.stages[2].depends_on, vec!["idea", "critique"]);
    }

    #[test]
    fn test_parse_agents_and_llms() {
        let yaml = r#"
name: "crew"
llms:
  default:
    provider: openai
    model: gpt-4o-mini
    temperature: 0.2
  local:
    provider: ollama
    model: llama3
  stub:
    provider: echo
    transform: uppercase
agents:
  writer:
    role: Technical Writer
    goal: Write structured professional reports
    backstory: Expert in business communication.
    llm: local
    tools: [word_count]
stages:
  - id: write
    description: "Write a report."
    agent: writer
"#;

        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        assert_eq!(pipeline.llms.len(), 3);
        match &pipeline.llms["default"] {
            LlmProfile::OpenAi {
                model,
                temperature,
                api_key_env,
                ..
            } => {
                assert_eq!(model, "gpt-4o-mini");
                assert_eq!(*temperature, Some(0.2));
                assert_eq!(api_key_env, "OPENAI_API_KEY");
            }
            other => panic!("Expected OpenAI profile, got {other:?}"),
        }
        assert_eq!(
            pipeline.llms["stub"],
            LlmProfile::Echo {
                transform: EchoTransform::Uppercase
            }
        );

        let stage = &pipeline.stages[0];
        assert_eq!(pipeline.binding_for(stage), "local");
        assert_eq!(pipeline.persona_for(stage).unwrap().tools, vec!["word_count"]);
    }

    #[test]
    fn test_binding_defaults() {
        let pipeline = Pipeline::new("p")
            .with_agent("plain", Persona::new("Analyst", "", ""))
            .with_stage(Stage::new("a", "no agent"))
            .with_stage(Stage::new("b", "agent without llm").with_agent("plain"));

        assert_eq!(pipeline.binding_for(&pipeline.stages[0]), DEFAULT_BINDING);
        assert_eq!(pipeline.binding_for(&pipeline.stages[1]), DEFAULT_BINDING);
    }

    #[test]
    fn test_persona_system_prompt() {
        let persona = Persona::new(
            "Senior Code Reviewer",
            "Review and improve code quality",
            "Strict reviewer with security mindset.",
        );

        assert_eq!(
            persona.system_prompt(),
            "You are Senior Code Reviewer. Strict reviewer with security mindset.\n\
             Your personal goal is: Review and improve code quality"
        );
    }

    #[test]
    fn test_yaml_keeps_stage_order() {
        let pipeline = Pipeline::new("ordered")
            .with_stage(Stage::new("first", "one"))
            .with_stage(Stage::new("second", "two").depends_on(["first"]));

        let yaml = pipeline.to_yaml().unwrap();
        let parsed = Pipeline::from_yaml(&yaml).unwrap();

        assert_eq!(parsed.stage_ids(), vec!["first", "second"]);
        assert_eq!(parsed.stages[1], pipeline.stages[1]);
    }

    #[test]
    fn test_from_file_missing() {
        let err = Pipeline::from_file(Path::new("does/not/exist.yaml")).unwrap_err();
        assert!(matches!(err, CrewflowError::PipelineNotFound { .. }));
    }
}
