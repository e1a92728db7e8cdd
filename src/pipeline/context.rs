// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Execution context
//!
//! The run-scoped record of every stage's output. Entries keep the order in
//! which stages completed and are write-once.

use blake3::Hasher;
use serde::{Deserialize, Serialize};

use crate::errors::CrewflowError;

/// Outputs recorded so far during one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    entries: Vec<ContextEntry>,
}

/// One recorded stage output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub stage: String,
    pub output: String,
}

impl ExecutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a stage's output. Fails if the stage already has an entry.
    pub fn record(
        &mut self,
        stage: impl Into<String>,
        output: impl Into<String>,
    ) -> Result<(), CrewflowError> {
        let stage = stage.into();
        if self.contains(&stage) {
            return Err(CrewflowError::ContextAlreadyRecorded { stage });
        }

        self.entries.push(ContextEntry {
            stage,
            output: output.into(),
        });
        Ok(())
    }

    /// Output recorded for a stage
    pub fn get(&self, stage: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.stage == stage)
            .map(|e| e.output.as_str())
    }

    pub fn contains(&self, stage: &str) -> bool {
        self.entries.iter().any(|e| e.stage == stage)
    }

    /// Collect the outputs of `dependencies` in the order given.
    ///
    /// A dependency without an entry is a configuration error for `stage`;
    /// it is never treated as empty context.
    pub fn gather<'a>(
        &'a self,
        stage: &str,
        dependencies: &'a [String],
    ) -> Result<Vec<(&'a str, &'a str)>, CrewflowError> {
        dependencies
            .iter()
            .map(|dep| {
                self.get(dep)
                    .map(|output| (dep.as_str(), output))
                    .ok_or_else(|| CrewflowError::MissingContext {
                        stage: stage.to_string(),
                        dependency: dep.clone(),
                    })
            })
            .collect()
    }

    /// Entries in completion order
    pub fn entries(&self) -> &[ContextEntry] {
        &self.entries
    }

    /// Most recently recorded entry
    pub fn last(&self) -> Option<&ContextEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// BLAKE3 digest over the ordered entries
    ///
    /// Two runs with a deterministic reasoner produce the same fingerprint.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Hasher::new();
        for entry in &self.entries {
            // Length-prefix each field so ("ab","c") and ("a","bc") differ.
            hasher.update(&(entry.stage.len() as u64).to_le_bytes());
            hasher.update(entry.stage.as_bytes());
            hasher.update(&(entry.output.len() as u64).to_le_bytes());
            hasher.update(entry.output.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_get() {
        let mut ctx = ExecutionContext::new();
        ctx.record("a", "alpha").unwrap();
        ctx.record("b", "").unwrap();

        assert_eq!(ctx.get("a"), Some("alpha"));
        assert_eq!(ctx.get("b"), Some(""));
        assert_eq!(ctx.get("c"), None);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.last().unwrap().stage, "b");
    }

    #[test]
    fn test_entries_are_write_once() {
        let mut ctx = ExecutionContext::new();
        ctx.record("a", "first").unwrap();

        let err = ctx.record("a", "second").unwrap_err();
        assert!(matches!(err, CrewflowError::ContextAlreadyRecorded { .. }));
        assert_eq!(ctx.get("a"), Some("first"));
    }

    #[test]
    fn test_gather_keeps_declared_order() {
        let mut ctx = ExecutionContext::new();
        ctx.record("a", "1").unwrap();
        ctx.record("b", "2").unwrap();
        ctx.record("c", "3").unwrap();

        let deps = vec!["c".to_string(), "a".to_string()];
        let gathered = ctx.gather("d", &deps).unwrap();
        assert_eq!(gathered, vec![("c", "3"), ("a", "1")]);
    }

    #[test]
    fn test_gather_missing_dependency_fails() {
        let mut ctx = ExecutionContext::new();
        ctx.record("a", "1").unwrap();

        let deps = vec!["a".to_string(), "later".to_string()];
        match ctx.gather("d", &deps) {
            Err(CrewflowError::MissingContext { stage, dependency }) => {
                assert_eq!(stage, "d");
                assert_eq!(dependency, "later");
            }
            other => panic!("expected MissingContext, got {other:?}"),
        }
    }

    #[test]
    fn test_fingerprint_tracks_content_and_order() {
        let mut one = ExecutionContext::new();
        one.record("a", "x").unwrap();
        one.record("b", "y").unwrap();

        let mut same = ExecutionContext::new();
        same.record("a", "x").unwrap();
        same.record("b", "y").unwrap();

        let mut swapped = ExecutionContext::new();
        swapped.record("b", "y").unwrap();
        swapped.record("a", "x").unwrap();

        let mut shifted = ExecutionContext::new();
        shifted.record("a", "xb").unwrap();
        shifted.record("", "y").unwrap();

        assert_eq!(one.fingerprint(), same.fingerprint());
        assert_ne!(one.fingerprint(), swapped.fingerprint());
        assert_ne!(one.fingerprint(), shifted.fingerprint());
        assert_eq!(one.fingerprint().len(), 64);
    }
}
