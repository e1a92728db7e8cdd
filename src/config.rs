// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! User settings
//!
//! Loaded from `config.toml` in the platform config directory (or the file
//! named by `CREWFLOW_CONFIG`), then adjusted from the environment.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::CrewflowError;
use crate::pipeline::{LlmProfile, Pipeline, DEFAULT_BINDING};
use crate::reasoning::{self, Reasoner, ReasonerRegistry};
use crate::tools::{ToolLoop, ToolRegistry, DEFAULT_MAX_ITERATIONS};

/// Environment variable overriding the settings path
pub const CONFIG_ENV: &str = "CREWFLOW_CONFIG";

/// Settings from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Profile used for the `default` binding when nothing else defines it
    #[serde(default = "default_llm")]
    pub default_llm: String,

    /// Named reasoner profiles
    #[serde(default)]
    pub llms: BTreeMap<String, LlmProfile>,

    /// Tool loop settings
    #[serde(default)]
    pub tools: ToolSettings,

    /// Base URL from `OPENAI_BASE_URL`
    #[serde(skip)]
    pub openai_base_url: Option<String>,

    /// Server URL from `OLLAMA_HOST`
    #[serde(skip)]
    pub ollama_host: Option<String>,
}

fn default_llm() -> String {
    DEFAULT_BINDING.to_string()
}

/// Tool loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Model turns allowed per stage when tools are in play
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_llm: default_llm(),
            llms: BTreeMap::new(),
            tools: ToolSettings::default(),
            openai_base_url: None,
            ollama_host: None,
        }
    }
}

impl Settings {
    /// Default settings file location
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("dev", "crewflow", "crewflow").map(|d| d.config_dir().join("config.toml"))
    }

    /// Load settings from the default location; a missing file means defaults
    pub fn load() -> Result<Self, CrewflowError> {
        let mut settings = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Load settings from a specific file
    pub fn from_file(path: &Path) -> Result<Self, CrewflowError> {
        let content = std::fs::read_to_string(path).map_err(|e| CrewflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML
    pub fn from_toml(content: &str) -> Result<Self, CrewflowError> {
        toml::from_str(content).map_err(Into::into)
    }

    /// Read `OPENAI_BASE_URL` and `OLLAMA_HOST`. They fill in the URL of
    /// every effective profile that does not set one.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.openai_base_url = lookup("OPENAI_BASE_URL").filter(|v| !v.trim().is_empty());
        self.ollama_host = lookup("OLLAMA_HOST").filter(|v| !v.trim().is_empty());
    }

    /// Effective binding table for a pipeline.
    ///
    /// Pipeline profiles override settings profiles of the same name. If
    /// nothing defines `default`, it aliases `default_llm` or falls back to
    /// OpenAI `gpt-4o-mini`. Environment URLs apply last, to profiles
    /// without an explicit URL.
    pub fn merged_profiles(&self, pipeline: &Pipeline) -> BTreeMap<String, LlmProfile> {
        let mut profiles = self.llms.clone();
        profiles.extend(pipeline.llms.iter().map(|(k, v)| (k.clone(), v.clone())));

        if !profiles.contains_key(DEFAULT_BINDING) {
            let fallback = profiles
                .get(&self.default_llm)
                .cloned()
                .unwrap_or_else(|| LlmProfile::openai("gpt-4o-mini"));
            profiles.insert(DEFAULT_BINDING.to_string(), fallback);
        }

        for profile in profiles.values_mut() {
            match profile {
                LlmProfile::OpenAi { base_url, .. } if base_url.is_none() => {
                    base_url.clone_from(&self.openai_base_url);
                }
                LlmProfile::Ollama { base_url, .. } if base_url.is_none() => {
                    base_url.clone_from(&self.ollama_host);
                }
                _ => {}
            }
        }

        profiles
    }

    /// Build the reasoner registry for a pipeline, wrapping each backend in
    /// a tool loop over `tools`
    pub fn build_registry(
        &self,
        pipeline: &Pipeline,
        tools: &ToolRegistry,
    ) -> Result<ReasonerRegistry, CrewflowError> {
        let mut registry = ReasonerRegistry::new();
        for (name, profile) in self.merged_profiles(pipeline) {
            let reasoner =
                reasoning::from_profile(&profile).map_err(|e| CrewflowError::ConfigError {
                    message: format!("llm '{}': {}", name, e),
                })?;
            registry.register(name, reasoner);
        }
        Ok(self.with_tool_loop(registry, tools))
    }

    /// Wrap every reasoner in the registry with a tool loop
    pub fn with_tool_loop(&self, registry: ReasonerRegistry, tools: &ToolRegistry) -> ReasonerRegistry {
        let max_iterations = self.tools.max_iterations;
        registry.map(|inner| -> Arc<dyn Reasoner> {
            Arc::new(ToolLoop::new(inner, tools.clone()).with_max_iterations(max_iterations))
        })
    }
}
