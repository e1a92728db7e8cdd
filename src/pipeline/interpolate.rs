// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Input interpolation
//!
//! Replaces `{name}` placeholders in stage and persona text with run inputs.
//! Only bare identifiers count as placeholders, so prose such as
//! `{message: str}` passes through untouched.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::errors::CrewflowError;
use crate::pipeline::Pipeline;

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder regex"))
}

/// Names of all placeholders in `text`, in order of appearance
pub fn placeholders(text: &str) -> Vec<&str> {
    placeholder()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Substitute placeholders in one string
pub fn interpolate_str(
    text: &str,
    inputs: &BTreeMap<String, String>,
    location: &str,
) -> Result<String, CrewflowError> {
    if let Some(missing) = placeholders(text)
        .into_iter()
        .find(|name| !inputs.contains_key(*name))
    {
        return Err(CrewflowError::MissingInput {
            name: missing.to_string(),
            location: location.to_string(),
        });
    }

    Ok(placeholder()
        .replace_all(text, |caps: &Captures| inputs[&caps[1]].clone())
        .into_owned())
}

impl Pipeline {
    /// Return a copy with every placeholder resolved.
    ///
    /// `overrides` win over the pipeline's own `inputs`.
    pub fn interpolate(
        &self,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Pipeline, CrewflowError> {
        let mut inputs = self.inputs.clone();
        inputs.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut resolved = self.clone();

        for stage in &mut resolved.stages {
            let location = format!("stage '{}' description", stage.id);
            stage.description = interpolate_str(&stage.description, &inputs, &location)?;

            if let Some(expected) = &stage.expected_output {
                let location = format!("stage '{}' expected_output", stage.id);
                stage.expected_output = Some(interpolate_str(expected, &inputs, &location)?);
            }
        }

        for (name, persona) in &mut resolved.agents {
            persona.role = interpolate_str(&persona.role, &inputs, &format!("agent '{name}' role"))?;
            persona.goal = interpolate_str(&persona.goal, &inputs, &format!("agent '{name}' goal"))?;
            persona.backstory =
                interpolate_str(&persona.backstory, &inputs, &format!("agent '{name}' backstory"))?;
        }

        resolved.inputs = inputs;
        Ok(resolved)
    }

    /// Placeholders not covered by the pipeline's own inputs
    pub fn unresolved_inputs(&self) -> Vec<String> {
        let texts = self
            .stages
            .iter()
            .flat_map(|s| std::iter::once(s.description.as_str()).chain(s.expected_output.as_deref()))
            .chain(
                self.agents
                    .values()
                    .flat_map(|p| [p.role.as_str(), p.goal.as_str(), p.backstory.as_str()]),
            );

        let mut missing = Vec::new();
        for text in texts {
            for name in placeholders(text) {
                if !self.inputs.contains_key(name) && !missing.iter().any(|m| m == name) {
                    missing.push(name.to_string());
                }
            }
        }
        missing
    }
}
