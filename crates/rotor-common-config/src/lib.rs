// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Common configuration primitives for rotor.
//!
//! This crate provides shared helpers for configuration across all rotor
//! crates, including:
//!
//! - [`Secret`]/[`SecretString`]: wrapper types that prevent accidental
//!   logging of sensitive values (re-exported from [`rotor_common_secret`])
//! - [`load_secret_env`]: helper for loading secrets from environment
//!   variables with `*_FILE` support

pub mod env;

// Re-export Secret types for convenience
pub use rotor_common_secret::{Secret, SecretString, REDACTED};

pub use env::{load_secret_env, require_secret_env, SecretEnvError};
