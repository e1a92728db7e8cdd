// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Reasoning backends
//!
//! A [`Reasoner`] turns a stage's effective prompt into text. The executor
//! only ever sees this trait; concrete backends are bound by name through a
//! [`ReasonerRegistry`] handed to it at construction.

mod echo;
mod ollama;
mod openai;

pub use echo::EchoReasoner;
pub use ollama::OllamaReasoner;
pub use openai::OpenAiReasoner;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::pipeline::{LlmProfile, Persona};

/// Errors a reasoning backend can report
#[derive(Error, Debug)]
pub enum ReasoningError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("tool loop did not reach a final answer after {iterations} iterations")]
    ToolLoopExhausted { iterations: usize },
}

/// Everything a reasoner receives for one stage
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningRequest {
    /// Stage being executed
    pub stage_id: String,

    /// Effective prompt: description plus rendered context
    pub prompt: String,

    /// Persona of the stage's agent
    pub persona: Option<Persona>,

    /// Expected answer shape
    pub expected_output: Option<String>,

    /// Tool names the agent may call
    pub tools: Vec<String>,
}

impl ReasoningRequest {
    /// Request with only a prompt
    pub fn new(stage_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            stage_id: stage_id.into(),
            prompt: prompt.into(),
            persona: None,
            expected_output: None,
            tools: Vec::new(),
        }
    }

    /// System instruction assembled from persona and expected output
    pub fn system_prompt(&self) -> Option<String> {
        let persona = self.persona.as_ref().map(Persona::system_prompt);
        let expected = self
            .expected_output
            .as_ref()
            .map(|e| format!("Your final answer must match this description: {e}"));

        match (persona, expected) {
            (Some(p), Some(e)) => Some(format!("{p}\n\n{e}")),
            (p, e) => p.or(e),
        }
    }
}

/// Text-in / text-out reasoning capability
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Produce the stage's output
    async fn reason(&self, request: &ReasoningRequest) -> Result<String, ReasoningError>;

    /// Whether the backend looks usable (credentials present, server up)
    async fn check_available(&self) -> Result<bool, ReasoningError>;

    /// Short label for logs, e.g. `openai:gpt-4o-mini`
    fn name(&self) -> String;
}

/// Create a reasoner from a profile
pub fn from_profile(profile: &LlmProfile) -> Result<Arc<dyn Reasoner>, ReasoningError> {
    let reasoner: Arc<dyn Reasoner> = match profile {
        LlmProfile::OpenAi { .. } => Arc::new(OpenAiReasoner::from_profile(profile)?),
        LlmProfile::Ollama { .. } => Arc::new(OllamaReasoner::from_profile(profile)?),
        LlmProfile::Echo { transform } => Arc::new(EchoReasoner::new(*transform)),
    };
    Ok(reasoner)
}

/// Named reasoner bindings with an optional catch-all
#[derive(Clone, Default)]
pub struct ReasonerRegistry {
    bindings: BTreeMap<String, Arc<dyn Reasoner>>,
    fallback: Option<Arc<dyn Reasoner>>,
}

impl ReasonerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where every binding resolves to `reasoner`
    pub fn single(reasoner: Arc<dyn Reasoner>) -> Self {
        Self {
            bindings: BTreeMap::new(),
            fallback: Some(reasoner),
        }
    }

    /// Bind a name
    pub fn register(&mut self, name: impl Into<String>, reasoner: Arc<dyn Reasoner>) {
        self.bindings.insert(name.into(), reasoner);
    }

    /// Set the reasoner used for names with no explicit binding
    pub fn with_fallback(mut self, reasoner: Arc<dyn Reasoner>) -> Self {
        self.fallback = Some(reasoner);
        self
    }

    /// Resolve a binding name
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Reasoner>> {
        self.bindings
            .get(name)
            .or(self.fallback.as_ref())
            .cloned()
    }

    /// Explicitly bound names
    pub fn names(&self) -> Vec<&str> {
        self.bindings.keys().map(String::as_str).collect()
    }

    /// Apply `wrap` to every bound reasoner, including the fallback
    pub fn map<F>(self, wrap: F) -> Self
    where
        F: Fn(Arc<dyn Reasoner>) -> Arc<dyn Reasoner>,
    {
        Self {
            bindings: self
                .bindings
                .into_iter()
                .map(|(name, r)| (name, wrap(r)))
                .collect(),
            fallback: self.fallback.map(&wrap),
        }
    }
}

/// Linear backoff between HTTP retries
pub(crate) fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(250 * u64::from(attempt))
}
