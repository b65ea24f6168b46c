// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OAuth2 authorization-flow orchestrator for Google credentials.
//!
//! Each flow binds a transient local HTTP listener for the browser
//! redirect, walks the PKCE authorization-code exchange, resolves the
//! target Cloud project, and persists the finished credential into the
//! pool.

pub mod config;
pub mod error;
pub mod flow;
pub mod google;
pub mod listener;
pub mod pkce;

pub use config::{GoogleEndpoints, OAuthConfig, CLIENT_ID_ENV, CLIENT_SECRET_ENV};
pub use error::{FlowError, Result};
pub use flow::{CompleteOutcome, FlowOrchestrator, StartedFlow};
pub use google::{ProjectInfo, TokenGrant, SCOPES};
pub use listener::{bind_callback_listener, CallbackServer, RedirectHandler};
pub use pkce::PkcePair;
