// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Environment-variable loading with `*_FILE` indirection.
//!
//! Secrets may be supplied either directly (`ROTOR_OAUTH_CLIENT_SECRET=...`)
//! or via a file path (`ROTOR_OAUTH_CLIENT_SECRET_FILE=/run/secrets/...`),
//! the usual container-orchestration convention. The direct variable wins
//! when both are set.

use rotor_common_secret::SecretString;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum SecretEnvError {
	#[error("environment variable {0} is not set (nor {0}_FILE)")]
	Missing(String),

	#[error("failed to read {path} referenced by {var}_FILE: {source}")]
	FileRead {
		var: String,
		path: String,
		source: std::io::Error,
	},
}

/// Load a secret from `var`, falling back to the file named by `{var}_FILE`.
///
/// Returns `None` when neither form is present. File contents are trimmed of
/// trailing whitespace so `echo secret > file` works as expected.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, SecretEnvError> {
	if let Ok(value) = std::env::var(var) {
		debug!(var = %var, "loaded secret from environment");
		return Ok(Some(SecretString::new(value)));
	}

	let file_var = format!("{var}_FILE");
	match std::env::var(&file_var) {
		Ok(path) => {
			let contents = std::fs::read_to_string(&path).map_err(|source| {
				SecretEnvError::FileRead {
					var: var.to_string(),
					path,
					source,
				}
			})?;
			debug!(var = %file_var, "loaded secret from file");
			Ok(Some(SecretString::new(
				contents.trim_end().to_string(),
			)))
		}
		Err(_) => Ok(None),
	}
}

/// Like [`load_secret_env`] but treats absence as an error.
pub fn require_secret_env(var: &str) -> Result<SecretString, SecretEnvError> {
	load_secret_env(var)?.ok_or_else(|| SecretEnvError::Missing(var.to_string()))
}
