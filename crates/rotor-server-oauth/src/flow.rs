// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Authorization-flow orchestrator.
//!
//! A flow is born in [`FlowOrchestrator::start_flow`]: a callback listener
//! is bound, an authorization URL is built, and the flow waits for the
//! browser redirect. [`FlowOrchestrator::complete_flow`] picks the flow
//! back up, waits (bounded) for the captured code, exchanges it, resolves
//! the target project, and hands the finished credential to the pool.
//!
//! Flows are in-memory only. A restart forgets them; the user starts over.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use rotor_server_pool::CredentialPool;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::config::OAuthConfig;
use crate::error::{FlowError, Result};
use crate::google::{self, ProjectInfo, TokenGrant};
use crate::listener::{bind_callback_listener, CallbackServer, RedirectHandler};
use crate::pkce::PkcePair;

/// What `start_flow` hands back to the caller.
#[derive(Debug, Clone)]
pub struct StartedFlow {
	/// URL for the user's browser.
	pub auth_url: String,
	/// Opaque flow identifier, echoed back in the redirect.
	pub state: String,
	pub callback_port: u16,
}

/// Terminal outcome of `complete_flow`.
#[derive(Debug)]
pub enum CompleteOutcome {
	/// A credential was persisted under this pool name.
	Credential { name: String },
	/// Several projects are visible; the caller must pick one and invoke
	/// `complete_flow` again with it. The flow stays alive until then.
	SelectionRequired { projects: Vec<ProjectInfo> },
}

/// One in-flight authorization.
struct AuthFlow {
	project_id: Option<String>,
	owner_session: Option<String>,
	/// True when no project was pinned at start; resolved after exchange.
	auto_project: bool,
	redirect_uri: String,
	verifier: String,
	code: Option<String>,
	created_at: Instant,
	notify: Arc<Notify>,
	server: Option<CallbackServer>,
}

/// Shared flow table; doubles as the redirect sink for every listener.
struct FlowRegistry {
	flows: Mutex<HashMap<String, AuthFlow>>,
}

#[async_trait]
impl RedirectHandler for FlowRegistry {
	async fn accept(&self, state: &str, code: &str) -> bool {
		let mut flows = self.flows.lock().await;
		let Some(flow) = flows.get_mut(state) else {
			debug!(state = %state, "redirect for unknown flow");
			return false;
		};

		flow.code = Some(code.to_string());
		let notify = Arc::clone(&flow.notify);
		drop(flows);

		notify.notify_one();
		info!(state = %state, "authorization code captured");
		true
	}
}

/// Orchestrates OAuth authorization flows and feeds finished credentials
/// into the pool.
pub struct FlowOrchestrator {
	config: OAuthConfig,
	http: reqwest::Client,
	pool: Arc<CredentialPool>,
	registry: Arc<FlowRegistry>,
}

impl std::fmt::Debug for FlowOrchestrator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FlowOrchestrator")
			.field("config", &self.config)
			.finish()
	}
}

impl FlowOrchestrator {
	pub fn new(config: OAuthConfig, pool: Arc<CredentialPool>) -> Self {
		Self {
			config,
			http: rotor_common_http::new_client(),
			pool,
			registry: Arc::new(FlowRegistry {
				flows: Mutex::new(HashMap::new()),
			}),
		}
	}

	/// Begin an authorization flow.
	///
	/// Binds a fresh callback listener, builds the authorization URL with
	/// a PKCE challenge, and registers the flow. Expired flows are swept
	/// first; at capacity the oldest flow is evicted, listener and all.
	pub async fn start_flow(
		&self,
		project_id: Option<String>,
		owner_session: Option<String>,
	) -> Result<StartedFlow> {
		self.sweep_expired().await;
		self.evict_to_capacity().await;

		let (listener, port) =
			bind_callback_listener(self.config.base_port, self.config.port_range).await?;
		let redirect_uri = format!("http://{}:{}", self.config.callback_host, port);

		let pkce = PkcePair::generate();
		let state = match &owner_session {
			Some(session) => format!("{session}_{}", uuid::Uuid::new_v4()),
			None => uuid::Uuid::new_v4().to_string(),
		};
		let auth_url =
			google::build_authorize_url(&self.config, &redirect_uri, &pkce.challenge, &state)?;

		let server = CallbackServer::spawn(
			listener,
			port,
			Arc::clone(&self.registry) as Arc<dyn RedirectHandler>,
		);

		let auto_project = project_id.is_none();
		self.registry.flows.lock().await.insert(
			state.clone(),
			AuthFlow {
				project_id,
				owner_session,
				auto_project,
				redirect_uri,
				verifier: pkce.verifier,
				code: None,
				created_at: Instant::now(),
				notify: Arc::new(Notify::new()),
				server: Some(server),
			},
		);

		info!(state = %state, port, "authorization flow started");
		Ok(StartedFlow {
			auth_url,
			state,
			callback_port: port,
		})
	}

	/// Feed a redirect in programmatically, as the callback listener does.
	pub async fn handle_redirect(&self, state: &str, code: &str) -> bool {
		self.registry.accept(state, code).await
	}

	/// Finish the matching flow: wait for the code, exchange it, resolve
	/// the project, persist the credential.
	pub async fn complete_flow(
		&self,
		project_id: Option<&str>,
		owner_session: Option<&str>,
	) -> Result<CompleteOutcome> {
		let (state, notify) = self
			.find_flow(project_id, owner_session)
			.await
			.ok_or(FlowError::FlowNotFound)?;

		let code = self.wait_for_code(&state, notify).await?;

		let (verifier, redirect_uri, pinned) = {
			let flows = self.registry.flows.lock().await;
			let flow = flows.get(&state).ok_or(FlowError::FlowNotFound)?;
			(
				flow.verifier.clone(),
				flow.redirect_uri.clone(),
				flow.project_id.clone(),
			)
		};

		let grant =
			google::exchange_code(&self.http, &self.config, &code, &redirect_uri, &verifier).await?;

		let email = match google::fetch_user_email(
			&self.http,
			&self.config.endpoints,
			&grant.access_token,
		)
		.await
		{
			Ok(email) => email,
			Err(e) => {
				warn!(error = %e, "could not resolve account email");
				None
			}
		};

		let project = match project_id.map(str::to_string).or(pinned) {
			Some(project) => project,
			None => {
				let projects = google::list_active_projects(
					&self.http,
					&self.config.endpoints,
					&grant.access_token,
				)
				.await?;
				match projects.len() {
					0 => return Err(FlowError::NoProjects),
					1 => projects.into_iter().next().map(|p| p.project_id).unwrap_or_default(),
					_ => {
						info!(
							state = %state,
							count = projects.len(),
							"multiple projects visible, selection required"
						);
						return Ok(CompleteOutcome::SelectionRequired { projects });
					}
				}
			}
		};

		// Best effort: the credential still works if enablement fails, the
		// user just has to enable the service themselves.
		if let Err(e) = google::enable_required_service(
			&self.http,
			&self.config.endpoints,
			&grant.access_token,
			&project,
		)
		.await
		{
			warn!(project_id = %project, error = %e, "could not enable required service");
		}

		let name = format!("{project}-{}.json", Utc::now().timestamp());
		let secret = self.credential_blob(&grant, &project);
		self.pool.add(&name, secret).await?;
		if let Some(email) = &email {
			self.pool.set_resolved_email(&name, email).await?;
		}

		if let Some(mut flow) = self.registry.flows.lock().await.remove(&state) {
			if let Some(server) = flow.server.take() {
				server.close().await;
			}
		}

		info!(name = %name, project_id = %project, "credential persisted");
		Ok(CompleteOutcome::Credential { name })
	}

	/// Drop flows older than the TTL, closing their listeners.
	pub async fn sweep_expired(&self) {
		let mut expired = Vec::new();
		{
			let mut flows = self.registry.flows.lock().await;
			let stale: Vec<String> = flows
				.iter()
				.filter(|(_, flow)| flow.created_at.elapsed() > self.config.flow_ttl)
				.map(|(state, _)| state.clone())
				.collect();
			for state in stale {
				if let Some(flow) = flows.remove(&state) {
					expired.push((state, flow));
				}
			}
		}

		for (state, mut flow) in expired {
			// A waiter blocked on this flow re-checks the table and fails
			// fast with FlowNotFound instead of running out the clock.
			flow.notify.notify_one();
			if let Some(server) = flow.server.take() {
				server.close().await;
			}
			debug!(state = %state, "expired flow swept");
		}
	}

	/// Number of live flows.
	pub async fn flow_count(&self) -> usize {
		self.registry.flows.lock().await.len()
	}

	/// Refresh the access token inside a credential blob.
	pub async fn refresh_credential(&self, secret: &serde_json::Value) -> Result<TokenGrant> {
		let refresh_token = secret
			.get("refresh_token")
			.and_then(|v| v.as_str())
			.ok_or_else(|| FlowError::Exchange("credential has no refresh token".to_string()))?;
		google::refresh_access_token(&self.http, &self.config, refresh_token).await
	}

	/// Evict oldest flows until below the configured cap.
	async fn evict_to_capacity(&self) {
		let mut evicted = Vec::new();
		{
			let mut flows = self.registry.flows.lock().await;
			while flows.len() >= self.config.max_flows {
				let Some(oldest) = flows
					.iter()
					.min_by_key(|(_, flow)| flow.created_at)
					.map(|(state, _)| state.clone())
				else {
					break;
				};
				if let Some(flow) = flows.remove(&oldest) {
					warn!(state = %oldest, "flow evicted at capacity");
					evicted.push(flow);
				}
			}
		}

		for mut flow in evicted {
			flow.notify.notify_one();
			if let Some(server) = flow.server.take() {
				server.close().await;
			}
		}
	}

	/// Locate the flow a completion call refers to.
	///
	/// A pinned project id matches its flow directly, preferring one owned
	/// by the same session. Without a match, auto-detection flows are
	/// considered with the same session preference.
	async fn find_flow(
		&self,
		project_id: Option<&str>,
		owner_session: Option<&str>,
	) -> Option<(String, Arc<Notify>)> {
		let flows = self.registry.flows.lock().await;
		let mut fallback: Option<(String, Arc<Notify>)> = None;

		if let Some(pid) = project_id {
			for (state, flow) in flows.iter() {
				if flow.project_id.as_deref() != Some(pid) {
					continue;
				}
				if owner_session.is_some() && flow.owner_session.as_deref() == owner_session {
					return Some((state.clone(), Arc::clone(&flow.notify)));
				}
				if fallback.is_none() {
					fallback = Some((state.clone(), Arc::clone(&flow.notify)));
				}
			}
		}

		if fallback.is_none() {
			for (state, flow) in flows.iter() {
				if !flow.auto_project {
					continue;
				}
				if owner_session.is_some() && flow.owner_session.as_deref() == owner_session {
					return Some((state.clone(), Arc::clone(&flow.notify)));
				}
				if fallback.is_none() {
					fallback = Some((state.clone(), Arc::clone(&flow.notify)));
				}
			}
		}

		fallback
	}

	/// Wait until the redirect delivers a code, bounded by the configured
	/// callback wait.
	async fn wait_for_code(&self, state: &str, notify: Arc<Notify>) -> Result<String> {
		let deadline = tokio::time::Instant::now() + self.config.callback_wait;
		loop {
			{
				let flows = self.registry.flows.lock().await;
				let flow = flows.get(state).ok_or(FlowError::FlowNotFound)?;
				if let Some(code) = &flow.code {
					return Ok(code.clone());
				}
			}

			debug!(state = %state, "waiting for callback");
			if tokio::time::timeout_at(deadline, notify.notified())
				.await
				.is_err()
			{
				return Err(FlowError::CallbackTimeout);
			}
		}
	}

	/// The persisted credential shape, everything a later refresh needs.
	fn credential_blob(&self, grant: &TokenGrant, project_id: &str) -> serde_json::Value {
		let expiry = Utc::now() + chrono::Duration::seconds(grant.expires_in as i64);
		serde_json::json!({
			"client_id": self.config.client_id,
			"client_secret": self.config.client_secret.expose(),
			"token": grant.access_token,
			"refresh_token": grant.refresh_token,
			"scopes": google::SCOPES,
			"token_uri": self.config.endpoints.token,
			"project_id": project_id,
			"expiry": expiry.to_rfc3339(),
		})
	}
}
