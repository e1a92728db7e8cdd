// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Effective prompt assembly

/// Build the prompt sent to a stage's reasoner.
///
/// The description comes first, followed by one labeled section per
/// dependency in the order given:
///
/// ```text
/// Write a report using the summary
/// [context from summarize]: SUMMARIZE TOPIC X
/// ```
pub fn effective_prompt(description: &str, context: &[(&str, &str)]) -> String {
    let extra: usize = context
        .iter()
        .map(|(id, output)| id.len() + output.len() + 18)
        .sum();

    let mut prompt = String::with_capacity(description.len() + extra);
    prompt.push_str(description);
    for (id, output) in context {
        prompt.push_str(&context_section(id, output));
    }
    prompt
}

/// One labeled context section, including its leading newline
pub fn context_section(stage: &str, output: &str) -> String {
    format!("\n[context from {stage}]: {output}")
}
