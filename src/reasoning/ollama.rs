// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Ollama backend (`/api/chat`, non-streaming)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{backoff, Reasoner, ReasoningError, ReasoningRequest};
use crate::pipeline::LlmProfile;

const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaReply>,
}

#[derive(Debug, Deserialize)]
struct OllamaReply {
    #[serde(default)]
    content: String,
}

/// Reply text. A missing message is an empty answer.
fn extract_content(response: OllamaChatResponse) -> String {
    response.message.map(|m| m.content).unwrap_or_default()
}

/// Ollama chat reasoner
#[derive(Debug, Clone)]
pub struct OllamaReasoner {
    client: Client,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_retries: u32,
}

impl OllamaReasoner {
    /// Build from an `ollama` profile
    pub fn from_profile(profile: &LlmProfile) -> Result<Self, ReasoningError> {
        let LlmProfile::Ollama {
            model,
            base_url,
            temperature,
            max_tokens,
            timeout_secs,
            max_retries,
        } = profile
        else {
            return Err(ReasoningError::InvalidResponse(format!(
                "expected an ollama profile, got {}",
                profile.provider()
            )));
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(*timeout_secs))
            .build()
            .map_err(|e| ReasoningError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url
                .as_deref()
                .unwrap_or(DEFAULT_OLLAMA_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.clone(),
            temperature: *temperature,
            max_tokens: *max_tokens,
            max_retries: *max_retries,
        })
    }

    fn build_body<'a>(&'a self, system: Option<&'a str>, prompt: &'a str) -> OllamaChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(OllamaMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(OllamaMessage {
            role: "user",
            content: prompt,
        });

        let options = (self.temperature.is_some() || self.max_tokens.is_some()).then(|| {
            OllamaOptions {
                num_predict: self.max_tokens,
                temperature: self.temperature,
            }
        });

        OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options,
        }
    }
}

#[async_trait]
impl Reasoner for OllamaReasoner {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String, ReasoningError> {
        let system = request.system_prompt();
        let body = self.build_body(system.as_deref(), &request.prompt);
        let url = format!("{}/api/chat", self.base_url);

        let mut attempt = 0;
        let response = loop {
            match self.client.post(&url).json(&body).send().await {
                Ok(response) => break response,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        stage = %request.stage_id,
                        attempt,
                        "Ollama request failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(ReasoningError::Transport(e.to_string())),
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| ReasoningError::InvalidResponse(e.to_string()))?;

        Ok(extract_content(parsed))
    }

    async fn check_available(&self) -> Result<bool, ReasoningError> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::debug!("Ollama not reachable at {}: {}", self.base_url, e);
                Ok(false)
            }
        }
    }

    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }
}
