// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Agent tools
//!
//! Tools are resolved by name through an explicit [`ToolRegistry`]. Agents
//! list the names they may use; the [`ToolLoop`] reasoner decorator runs the
//! act/observe cycle against the registry.

mod builtin;
mod react;

pub use builtin::{CharCountTool, WordCountTool};
pub use react::{ToolLoop, DEFAULT_MAX_ITERATIONS};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a tool invocation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Failed(String),
}

/// A named operation an agent can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name used in `ACTION:` lines and agent `tools:` lists
    fn name(&self) -> &str;

    /// One-line description shown to the model
    fn description(&self) -> &str;

    /// Run the tool on a text input
    async fn invoke(&self, input: &str) -> Result<String, ToolError>;
}

/// Name → tool mapping
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tools
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(WordCountTool));
        registry.register(Arc::new(CharCountTool));
        registry
    }

    /// Register a tool, replacing any existing tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Invoke a tool by name
    pub async fn invoke(&self, name: &str, input: &str) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.invoke(input).await
    }

    /// `- name: description` lines for the given names (unknown names skipped)
    pub fn describe(&self, names: &[String]) -> String {
        names
            .iter()
            .filter_map(|n| self.tools.get(n))
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = ToolRegistry::builtin();
        assert_eq!(registry.names(), vec!["char_count", "word_count"]);
        assert!(registry.get("web_search").is_none());
    }

    #[test]
    fn test_describe_skips_unknown() {
        let registry = ToolRegistry::builtin();
        let text = registry.describe(&["word_count".into(), "nope".into()]);
        assert_eq!(text, "- word_count: Count words in a given text.");
    }

    #[test]
    fn test_invoke_by_name() {
        let registry = ToolRegistry::builtin();
        let out = tokio_test::block_on(registry.invoke("word_count", "one two  three"));
        assert_eq!(out.unwrap(), "3");

        let err = tokio_test::block_on(registry.invoke("teleport", "x")).unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("teleport".into()));
    }
}
