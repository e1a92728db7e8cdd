// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 crewflow contributors

//! Utility modules
//!
//! Common utilities for the crewflow CLI.

pub mod colors;
pub mod spinner;

pub use colors::*;
pub use spinner::*;
