// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Orchestrator configuration.

use std::time::Duration;

use rotor_common_config::{require_secret_env, SecretEnvError, SecretString};

use crate::error::Result;

/// Environment variable holding the OAuth client id.
pub const CLIENT_ID_ENV: &str = "ROTOR_OAUTH_CLIENT_ID";
/// Environment variable holding the OAuth client secret. A sibling
/// `ROTOR_OAUTH_CLIENT_SECRET_FILE` pointing at a file also works.
pub const CLIENT_SECRET_ENV: &str = "ROTOR_OAUTH_CLIENT_SECRET";

/// Google API endpoints, overridable for tests.
#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
	pub authorize: String,
	pub token: String,
	pub userinfo: String,
	pub projects: String,
	/// Base for `{base}/{project}/services/{service}:enable`.
	pub service_usage: String,
}

impl Default for GoogleEndpoints {
	fn default() -> Self {
		Self {
			authorize: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
			token: "https://oauth2.googleapis.com/token".to_string(),
			userinfo: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
			projects: "https://cloudresourcemanager.googleapis.com/v1/projects".to_string(),
			service_usage: "https://serviceusage.googleapis.com/v1/projects".to_string(),
		}
	}
}

/// Configuration for the authorization-flow orchestrator.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
	pub client_id: String,
	pub client_secret: SecretString,
	/// Hostname callers are told to reach the callback listener on.
	pub callback_host: String,
	/// First port tried for the callback listener.
	pub base_port: u16,
	/// Number of ports probed above `base_port` before falling back to an
	/// OS-assigned one.
	pub port_range: u16,
	/// Flows older than this are swept.
	pub flow_ttl: Duration,
	/// Hard cap on concurrent live flows; oldest evicted beyond it.
	pub max_flows: usize,
	/// How long `complete_flow` waits for the browser redirect.
	pub callback_wait: Duration,
	pub endpoints: GoogleEndpoints,
}

impl OAuthConfig {
	pub fn new(client_id: impl Into<String>, client_secret: SecretString) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret,
			callback_host: "localhost".to_string(),
			base_port: 8080,
			port_range: 100,
			flow_ttl: Duration::from_secs(30 * 60),
			max_flows: 20,
			callback_wait: Duration::from_secs(300),
			endpoints: GoogleEndpoints::default(),
		}
	}

	/// Build from [`CLIENT_ID_ENV`] and [`CLIENT_SECRET_ENV`].
	pub fn from_env() -> Result<Self> {
		let client_id = std::env::var(CLIENT_ID_ENV)
			.map_err(|_| SecretEnvError::Missing(CLIENT_ID_ENV.to_string()))?;
		let client_secret = require_secret_env(CLIENT_SECRET_ENV)?;
		Ok(Self::new(client_id, client_secret))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults_match_flow_contract() {
		let config = OAuthConfig::new("id", SecretString::from("secret"));
		assert_eq!(config.callback_host, "localhost");
		assert_eq!(config.base_port, 8080);
		assert_eq!(config.port_range, 100);
		assert_eq!(config.flow_ttl, Duration::from_secs(1800));
		assert_eq!(config.max_flows, 20);
		assert_eq!(config.callback_wait, Duration::from_secs(300));
	}

	#[test]
	fn test_from_env_missing_client_id() {
		// Unique-name variables are never set in the test environment.
		std::env::remove_var(CLIENT_ID_ENV);
		let err = OAuthConfig::from_env().unwrap_err();
		assert!(matches!(err, crate::error::FlowError::Config(_)));
	}

	#[test]
	fn test_debug_does_not_leak_secret() {
		let config = OAuthConfig::new("id", SecretString::from("very-secret"));
		let rendered = format!("{config:?}");
		assert!(!rendered.contains("very-secret"));
	}
}
