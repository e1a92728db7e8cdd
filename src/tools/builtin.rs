// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Built-in tools

use async_trait::async_trait;

use super::{Tool, ToolError};

/// Counts whitespace-separated words
pub struct WordCountTool;

#[async_trait]
impl Tool for WordCountTool {
    fn name(&self) -> &str {
        "word_count"
    }

    fn description(&self) -> &str {
        "Count words in a given text."
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        Ok(input.split_whitespace().count().to_string())
    }
}

/// Counts characters (Unicode scalar values)
pub struct CharCountTool;

#[async_trait]
impl Tool for CharCountTool {
    fn name(&self) -> &str {
        "char_count"
    }

    fn description(&self) -> &str {
        "Count characters in a given text."
    }

    async fn invoke(&self, input: &str) -> Result<String, ToolError> {
        Ok(input.chars().count().to_string())
    }
}
