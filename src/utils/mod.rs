// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! Console helpers for the CLI

pub mod spinner;

pub use spinner::*;
