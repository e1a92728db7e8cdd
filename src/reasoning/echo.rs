// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Echo reasoner
//!
//! Deterministic offline backend: returns the prompt, optionally uppercased.
//! Used for dry pipelines, demos and tests.

use async_trait::async_trait;

use super::{Reasoner, ReasoningError, ReasoningRequest};
use crate::pipeline::EchoTransform;

/// Echo reasoner
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoReasoner {
    transform: EchoTransform,
}

impl EchoReasoner {
    pub fn new(transform: EchoTransform) -> Self {
        Self { transform }
    }

    pub fn uppercase() -> Self {
        Self::new(EchoTransform::Uppercase)
    }
}

#[async_trait]
impl Reasoner for EchoReasoner {
    async fn reason(&self, request: &ReasoningRequest) -> Result<String, ReasoningError> {
        Ok(match self.transform {
            EchoTransform::Identity => request.prompt.clone(),
            EchoTransform::Uppercase => request.prompt.to_uppercase(),
        })
    }

    async fn check_available(&self) -> Result<bool, ReasoningError> {
        Ok(true)
    }

    fn name(&self) -> String {
        format!("echo:{}", self.transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_uppercase() {
        let reasoner = EchoReasoner::uppercase();
        let out = reasoner
            .reason(&ReasoningRequest::new("a", "Summarize topic X"))
            .await
            .unwrap();
        assert_eq!(out, "SUMMARIZE TOPIC X");
    }

    #[tokio::test]
    async fn test_identity_ignores_persona() {
        let reasoner = EchoReasoner::default();
        let mut req = ReasoningRequest::new("a", "keep me");
        req.expected_output = Some("anything".into());

        assert_eq!(reasoner.reason(&req).await.unwrap(), "keep me");
        assert!(reasoner.check_available().await.unwrap());
    }
}
