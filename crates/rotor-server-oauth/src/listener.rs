// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transient HTTP listener that captures one OAuth redirect.
//!
//! Each authorization flow gets its own listener on its own port. The
//! port is bound during probing and the same socket is handed to the
//! server, so concurrent flows can never race onto one port.

use std::net::Ipv4Addr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{FlowError, Result};

const SUCCESS_PAGE: &str =
	"<h1>Authentication successful!</h1><p>You can close this window.</p>";
const FAILURE_PAGE: &str = "<h1>Authentication failed.</h1><p>Please try again.</p>";

/// Receives redirects captured by a callback listener.
#[async_trait]
pub trait RedirectHandler: Send + Sync + 'static {
	/// Accept a captured redirect. Returns false when the state is unknown.
	async fn accept(&self, state: &str, code: &str) -> bool;
}

/// Bind a listener, probing `base_port..base_port+range` in order and
/// falling back to an OS-assigned port when the whole range is taken.
pub async fn bind_callback_listener(base_port: u16, range: u16) -> Result<(TcpListener, u16)> {
	let end = base_port.saturating_add(range);
	for port in base_port..end {
		if let Ok(listener) = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
			// Port 0 in the range means the OS picked one; report what
			// was actually bound.
			let port = listener.local_addr()?.port();
			debug!(port, "callback port bound");
			return Ok((listener, port));
		}
	}

	match TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).await {
		Ok(listener) => {
			let port = listener.local_addr()?.port();
			debug!(port, "callback port assigned by OS");
			Ok((listener, port))
		}
		Err(_) => Err(FlowError::PortExhausted {
			start: base_port,
			end,
		}),
	}
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
	code: Option<String>,
	state: Option<String>,
}

async fn handle_callback(
	State(handler): State<Arc<dyn RedirectHandler>>,
	Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<&'static str>) {
	if let (Some(state), Some(code)) = (params.state, params.code) {
		if handler.accept(&state, &code).await {
			return (StatusCode::OK, Html(SUCCESS_PAGE));
		}
	}
	(StatusCode::BAD_REQUEST, Html(FAILURE_PAGE))
}

/// A running callback server; closing it releases the port.
pub struct CallbackServer {
	port: u16,
	shutdown: Option<oneshot::Sender<()>>,
	task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for CallbackServer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CallbackServer")
			.field("port", &self.port)
			.finish()
	}
}

impl CallbackServer {
	/// Serve redirects on an already-bound listener.
	pub fn spawn(listener: TcpListener, port: u16, handler: Arc<dyn RedirectHandler>) -> Self {
		let (shutdown, rx) = oneshot::channel::<()>();

		let router: Router = Router::new()
			.route("/", get(handle_callback))
			.with_state(handler);

		let task = tokio::spawn(async move {
			let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
				let _ = rx.await;
			});
			if let Err(e) = serve.await {
				warn!(port, error = %e, "callback server exited with error");
			}
		});

		debug!(port, "callback server started");
		Self {
			port,
			shutdown: Some(shutdown),
			task,
		}
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	/// Shut down and wait for the port to be released. Succeeds even if no
	/// redirect ever arrived.
	pub async fn close(mut self) {
		if let Some(tx) = self.shutdown.take() {
			let _ = tx.send(());
		}
		let _ = (&mut self.task).await;
		debug!(port = self.port, "callback server closed");
	}
}

impl Drop for CallbackServer {
	fn drop(&mut self) {
		// Closing the channel also triggers graceful shutdown.
		if let Some(tx) = self.shutdown.take() {
			let _ = tx.send(());
		}
	}
}
