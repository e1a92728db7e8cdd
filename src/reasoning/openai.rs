// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! OpenAI-compatible chat completions backend

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{backoff, Reasoner, ReasoningError, ReasoningRequest};
use crate::pipeline::LlmProfile;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat completions reasoner
#[derive(Debug, Clone)]
pub struct OpenAiReasoner {
    client: Client,
    base_url: String,
    model: String,
    api_key_env: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_retries: u32,
}

impl OpenAiReasoner {
    /// Build from an `openai` profile
    pub fn from_profile(profile: &LlmProfile) -> Result<Self, ReasoningError> {
        let LlmProfile::OpenAi {
            model,
            base_url,
            api_key_env,
            temperature,
            max_tokens,
            timeout_secs,
            max_retries,
        } = profile
        else {
            return Err(ReasoningError::InvalidResponse(format!(
                "expected an openai profile, got {}",
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
                .unwrap_or(DEFAULT_OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.clone(),
            api_key_env: api_key_env.clone(),
            temperature: *temperature,
            max_tokens: *max_tokens,
            max_retries: *max_retries,
        })
    }

    fn api_url(&self) -> String {
        if self.base_url.ends_with("/chat/completions") {
            self.base_url.clone()
        } else if self.base_url.ends_with("/v1") {
            format!("{}/chat/completions", self.base_url)
        } else {
            format!("{}/v1/chat/completions", self.base_url)
        }
    }

    fn api_key(&self) -> Result<String, ReasoningError> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ReasoningError::Auth(format!("{} is not set", self.api_key_env))),
        }
    }

    fn build_body<'a>(&'a self, system: Option<&'a str>, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// First choice's text. No choices or null content is an empty answer.
fn extract_content(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default()
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String, ReasoningError> {
        let key = self.api_key()?;
        let system = request.system_prompt();
        let body = self.build_body(system.as_deref(), &request.prompt);

        let mut attempt = 0;
        let response = loop {
            match self
                .client
                .post(self.api_url())
                .bearer_auth(&key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => break response,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        stage = %request.stage_id,
                        attempt,
                        "OpenAI request failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(e) => return Err(ReasoningError::Transport(e.to_string())),
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ReasoningError::Auth(format!(
                "provider rejected the key in {}",
                self.api_key_env
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ReasoningError::InvalidResponse(e.to_string()))?;

        Ok(extract_content(parsed))
    }

    async fn check_available(&self) -> Result<bool, ReasoningError> {
        Ok(self.api_key().is_ok())
    }

    fn name(&self) -> String {
        format!("openai:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reasoner(base_url: Option<&str>) -> OpenAiReasoner {
        let mut profile = LlmProfile::openai("gpt-4o-mini");
        if let LlmProfile::OpenAi {
            base_url: url,
            api_key_env,
            ..
        } = &mut profile
        {
            *url = base_url.map(String::from);
            *api_key_env = "CREWFLOW_TEST_UNSET_KEY".into();
        }
        OpenAiReasoner::from_profile(&profile).unwrap()
    }

    #[test]
    fn test_api_url_variants() {
        assert_eq!(
            reasoner(None).api_url(),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            reasoner(Some("http://localhost:8000/v1/")).api_url(),
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(
            reasoner(Some("http://proxy/v1/chat/completions")).api_url(),
            "http://proxy/v1/chat/completions"
        );
    }

    #[test]
    fn test_body_includes_system_message() {
        let r = reasoner(None);
        let body = serde_json::to_value(r.build_body(Some("You are CEO."), "Decide")).unwrap();

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Decide");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_missing_content_is_empty_answer() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(extract_content(parsed), "");

        let parsed: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(extract_content(parsed), "");

        let parsed: ChatResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(extract_content(parsed), "");

        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"ok"}}]}"#).unwrap();
        assert_eq!(extract_content(parsed), "ok");
    }

    #[tokio::test]
    async fn test_missing_key_is_auth_error() {
        let r = reasoner(None);
        assert!(!r.check_available().await.unwrap());

        let err = r
            .reason(&ReasoningRequest::new("a", "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReasoningError::Auth(_)));
    }
}
