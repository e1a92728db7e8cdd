// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Act/observe loop around a reasoner
//!
//! When a request names tools, the model is told how to call them. A reply
//! containing an `ACTION: name(input)` line runs the tool and the result is
//! fed back as `OBSERVATION: ...`; a reply without one is the answer.

use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, OnceLock};

use super::ToolRegistry;
use crate::reasoning::{Reasoner, ReasoningError, ReasoningRequest};

/// Model turns allowed before giving up
pub const DEFAULT_MAX_ITERATIONS: usize = 6;

const FINAL_MARKER: &str = "FINAL ANSWER:";

fn action_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*ACTION:\s*([A-Za-z_][A-Za-z0-9_]*)\((.*)\)\s*$")
            .expect("valid action regex")
    })
}

/// First `ACTION:` line in a reply, as (tool, input)
fn parse_action(reply: &str) -> Option<(&str, &str)> {
    let caps = action_line().captures(reply)?;
    let name = caps.get(1)?.as_str();
    let input = caps.get(2)?.as_str().trim();
    Some((name, unquote(input)))
}

fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Text after the final-answer marker, or the whole reply
fn final_answer(reply: &str) -> String {
    match reply.find(FINAL_MARKER) {
        Some(pos) => reply[pos + FINAL_MARKER.len()..].trim().to_string(),
        None => reply.to_string(),
    }
}

/// Reasoner decorator that lets agents call registered tools
pub struct ToolLoop {
    inner: Arc<dyn Reasoner>,
    tools: ToolRegistry,
    max_iterations: usize,
}

impl ToolLoop {
    pub fn new(inner: Arc<dyn Reasoner>, tools: ToolRegistry) -> Self {
        Self {
            inner,
            tools,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    fn preamble(&self, allowed: &[String]) -> String {
        format!(
            "You have access to the following tools:\n{}\n\n\
             To use a tool, reply with exactly one line:\n\
             ACTION: <tool_name>(<input>)\n\
             You will then receive an OBSERVATION line with the result.\n\
             When you are done, reply with:\n\
             {} <your answer>",
            self.tools.describe(allowed),
            FINAL_MARKER
        )
    }

    async fn observe(&self, allowed: &[String], name: &str, input: &str) -> String {
        if !allowed.iter().any(|t| t == name) {
            return format!("error: tool '{}' is not available to this agent", name);
        }
        match self.tools.invoke(name, input).await {
            Ok(output) => output,
            Err(e) => format!("error: {}", e),
        }
    }
}

#[async_trait]
impl Reasoner for ToolLoop {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String, ReasoningError> {
        if request.tools.is_empty() {
            return self.inner.reason(request).await;
        }

        let mut step = request.clone();
        step.prompt = format!("{}\n\n{}", request.prompt, self.preamble(&request.tools));

        for iteration in 1..=self.max_iterations {
            let reply = self.inner.reason(&step).await?;

            let Some((name, input)) = parse_action(&reply) else {
                return Ok(final_answer(&reply));
            };

            let observation = self.observe(&request.tools, name, input).await;
            tracing::debug!(
                stage = %request.stage_id,
                iteration,
                tool = name,
                "tool observation: {} chars",
                observation.len()
            );

            step.prompt.push('\n');
            step.prompt.push_str(reply.trim_end());
            step.prompt.push_str("\nOBSERVATION: ");
            step.prompt.push_str(&observation);
        }

        Err(ReasoningError::ToolLoopExhausted {
            iterations: self.max_iterations,
        })
    }

    async fn check_available(&self) -> Result<bool, ReasoningError> {
        self.inner.check_available().await
    }

    fn name(&self) -> String {
        self.inner.name()
    }
}
