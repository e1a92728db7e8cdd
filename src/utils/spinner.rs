// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Progress spinner utilities

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner shown while a stage waits on its reasoner
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.blue} {msg} {elapsed:.dim}")
            .expect("Invalid spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Clear the spinner and print the stage's outcome line
pub fn finish_stage(pb: ProgressBar, stage: &str, elapsed: Duration, ok: bool) {
    pb.finish_and_clear();
    if ok {
        println!(
            "  {} {} ({:.2}s)",
            "✓".green(),
            stage.bold(),
            elapsed.as_secs_f64()
        );
    } else {
        println!("  {} {} failed", "✗".red(), stage.bold());
    }
}
