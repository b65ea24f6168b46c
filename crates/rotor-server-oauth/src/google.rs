// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Google OAuth and Cloud API calls used by the flow orchestrator.
//!
//! Endpoints come from [`GoogleEndpoints`](crate::config::GoogleEndpoints)
//! so tests can point them at a local stub.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use url::Url;

use crate::config::{GoogleEndpoints, OAuthConfig};
use crate::error::{FlowError, Result};

/// Scopes requested during authorization.
pub const SCOPES: [&str; 3] = [
	"https://www.googleapis.com/auth/cloud-platform",
	"https://www.googleapis.com/auth/userinfo.email",
	"https://www.googleapis.com/auth/userinfo.profile",
];

/// Service enabled for newly authorized projects.
pub const REQUIRED_SERVICE: &str = "cloudaicompanion.googleapis.com";

/// Build the authorization URL for the browser.
pub fn build_authorize_url(
	config: &OAuthConfig,
	redirect_uri: &str,
	challenge: &str,
	state: &str,
) -> Result<String> {
	let mut url = Url::parse(&config.endpoints.authorize)?;
	{
		let mut params = url.query_pairs_mut();
		params.append_pair("client_id", &config.client_id);
		params.append_pair("redirect_uri", redirect_uri);
		params.append_pair("response_type", "code");
		params.append_pair("scope", &SCOPES.join(" "));
		params.append_pair("state", state);
		params.append_pair("code_challenge", challenge);
		params.append_pair("code_challenge_method", "S256");
		// Offline access with forced consent, so a refresh token is
		// always issued.
		params.append_pair("access_type", "offline");
		params.append_pair("prompt", "consent");
	}
	Ok(url.to_string())
}

/// Tokens returned by a code exchange or refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
	pub access_token: String,
	#[serde(default)]
	pub refresh_token: Option<String>,
	pub expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

fn exchange_error(status: reqwest::StatusCode, body: String) -> FlowError {
	let message = match serde_json::from_str::<TokenErrorBody>(&body) {
		Ok(parsed) => parsed.error_description.unwrap_or(parsed.error),
		Err(_) => format!("{status}: {body}"),
	};
	error!(error = %message, "token endpoint rejected request");
	FlowError::Exchange(message)
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(
	client: &reqwest::Client,
	config: &OAuthConfig,
	code: &str,
	redirect_uri: &str,
	verifier: &str,
) -> Result<TokenGrant> {
	debug!("exchanging authorization code");

	let params = [
		("code", code),
		("client_id", config.client_id.as_str()),
		("client_secret", config.client_secret.expose().as_str()),
		("redirect_uri", redirect_uri),
		("grant_type", "authorization_code"),
		("code_verifier", verifier),
	];

	let response = client
		.post(&config.endpoints.token)
		.form(&params)
		.send()
		.await?;

	let status = response.status();
	if !status.is_success() {
		return Err(exchange_error(status, response.text().await.unwrap_or_default()));
	}

	let grant: TokenGrant = response.json().await?;
	info!("authorization code exchanged");
	Ok(grant)
}

/// Obtain a fresh access token from a refresh token.
pub async fn refresh_access_token(
	client: &reqwest::Client,
	config: &OAuthConfig,
	refresh_token: &str,
) -> Result<TokenGrant> {
	debug!("refreshing access token");

	let params = [
		("client_id", config.client_id.as_str()),
		("client_secret", config.client_secret.expose().as_str()),
		("refresh_token", refresh_token),
		("grant_type", "refresh_token"),
	];

	let response = client
		.post(&config.endpoints.token)
		.form(&params)
		.send()
		.await?;

	let status = response.status();
	if !status.is_success() {
		return Err(exchange_error(status, response.text().await.unwrap_or_default()));
	}

	let grant: TokenGrant = response.json().await?;
	debug!("access token refreshed");
	Ok(grant)
}

#[derive(Debug, Deserialize)]
struct UserinfoBody {
	#[serde(default)]
	email: Option<String>,
}

/// Resolve the email of the account behind an access token.
pub async fn fetch_user_email(
	client: &reqwest::Client,
	endpoints: &GoogleEndpoints,
	access_token: &str,
) -> Result<Option<String>> {
	let response = client
		.get(&endpoints.userinfo)
		.bearer_auth(access_token)
		.send()
		.await?
		.error_for_status()?;

	let body: UserinfoBody = response.json().await?;
	Ok(body.email)
}

/// One project visible to the authorized account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
	#[serde(rename = "projectId")]
	pub project_id: String,
	#[serde(default)]
	pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectListBody {
	#[serde(default)]
	projects: Vec<ProjectEntry>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
	#[serde(rename = "projectId")]
	project_id: String,
	#[serde(default)]
	name: Option<String>,
	#[serde(rename = "lifecycleState", default)]
	lifecycle_state: Option<String>,
}

/// List ACTIVE projects via the Cloud Resource Manager.
pub async fn list_active_projects(
	client: &reqwest::Client,
	endpoints: &GoogleEndpoints,
	access_token: &str,
) -> Result<Vec<ProjectInfo>> {
	let response = client
		.get(&endpoints.projects)
		.query(&[("filter", "lifecycleState:ACTIVE")])
		.bearer_auth(access_token)
		.send()
		.await?
		.error_for_status()?;

	let body: ProjectListBody = response.json().await?;

	// The filter is advisory; drop anything non-ACTIVE that slipped through.
	let projects: Vec<ProjectInfo> = body
		.projects
		.into_iter()
		.filter(|p| {
			p.lifecycle_state
				.as_deref()
				.map(|s| s == "ACTIVE")
				.unwrap_or(true)
		})
		.map(|p| ProjectInfo {
			project_id: p.project_id,
			name: p.name,
		})
		.collect();

	debug!(count = projects.len(), "listed active projects");
	Ok(projects)
}

/// Enable [`REQUIRED_SERVICE`] for a project.
pub async fn enable_required_service(
	client: &reqwest::Client,
	endpoints: &GoogleEndpoints,
	access_token: &str,
	project_id: &str,
) -> Result<()> {
	let url = format!(
		"{}/{}/services/{}:enable",
		endpoints.service_usage, project_id, REQUIRED_SERVICE
	);

	client
		.post(&url)
		.bearer_auth(access_token)
		.json(&serde_json::json!({}))
		.send()
		.await?
		.error_for_status()?;

	info!(project_id = %project_id, service = REQUIRED_SERVICE, "service enabled");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use rotor_common_config::SecretString;
	use std::collections::HashMap;

	fn test_config() -> OAuthConfig {
		OAuthConfig::new("client-123", SecretString::from("shh"))
	}

	#[test]
	fn test_authorize_url_params() {
		let config = test_config();
		let url = build_authorize_url(&config, "http://localhost:8080", "chal", "state-1").unwrap();
		let parsed = Url::parse(&url).unwrap();
		let params: HashMap<_, _> = parsed.query_pairs().collect();

		assert_eq!(params.get("client_id").map(|s| s.as_ref()), Some("client-123"));
		assert_eq!(
			params.get("redirect_uri").map(|s| s.as_ref()),
			Some("http://localhost:8080")
		);
		assert_eq!(params.get("response_type").map(|s| s.as_ref()), Some("code"));
		assert_eq!(params.get("state").map(|s| s.as_ref()), Some("state-1"));
		assert_eq!(params.get("code_challenge").map(|s| s.as_ref()), Some("chal"));
		assert_eq!(
			params.get("code_challenge_method").map(|s| s.as_ref()),
			Some("S256")
		);
		assert_eq!(params.get("access_type").map(|s| s.as_ref()), Some("offline"));
		assert_eq!(params.get("prompt").map(|s| s.as_ref()), Some("consent"));

		let scope = params.get("scope").unwrap();
		for wanted in SCOPES {
			assert!(scope.contains(wanted));
		}
	}

	#[test]
	fn test_authorize_url_rejects_malformed_endpoint() {
		let mut config = test_config();
		config.endpoints.authorize = "not a url".to_string();

		let err = build_authorize_url(&config, "http://localhost:8080", "chal", "s").unwrap_err();
		assert!(matches!(err, FlowError::InvalidEndpoint(_)));
	}

	#[test]
	fn test_token_grant_without_refresh_token() {
		let grant: TokenGrant = serde_json::from_str(
			r#"{"access_token": "at", "expires_in": 3599, "token_type": "Bearer"}"#,
		)
		.unwrap();
		assert_eq!(grant.access_token, "at");
		assert!(grant.refresh_token.is_none());
	}

	#[test]
	fn test_project_list_filters_inactive() {
		let body: ProjectListBody = serde_json::from_str(
			r#"{"projects": [
				{"projectId": "live", "name": "Live", "lifecycleState": "ACTIVE"},
				{"projectId": "gone", "lifecycleState": "DELETE_REQUESTED"}
			]}"#,
		)
		.unwrap();

		let active: Vec<_> = body
			.projects
			.into_iter()
			.filter(|p| p.lifecycle_state.as_deref() == Some("ACTIVE"))
			.collect();
		assert_eq!(active.len(), 1);
		assert_eq!(active[0].project_id, "live");
	}

	#[test]
	fn test_exchange_error_prefers_description() {
		let err = exchange_error(
			reqwest::StatusCode::BAD_REQUEST,
			r#"{"error": "invalid_grant", "error_description": "Code was already redeemed."}"#
				.to_string(),
		);
		match err {
			FlowError::Exchange(message) => assert_eq!(message, "Code was already redeemed."),
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[test]
	fn test_exchange_error_falls_back_to_body() {
		let err = exchange_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down".to_string());
		match err {
			FlowError::Exchange(message) => assert!(message.contains("upstream down")),
			other => panic!("unexpected error: {other:?}"),
		}
	}
}
