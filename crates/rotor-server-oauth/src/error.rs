// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flow error types, one variant per failure stage.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
	#[error("no callback port available in {start}..{end}")]
	PortExhausted { start: u16, end: u16 },

	#[error("no matching authorization flow")]
	FlowNotFound,

	#[error("invalid endpoint url: {0}")]
	InvalidEndpoint(#[from] url::ParseError),

	#[error("timed out waiting for the OAuth callback")]
	CallbackTimeout,

	#[error("token exchange failed: {0}")]
	Exchange(String),

	#[error("no active projects visible to this account")]
	NoProjects,

	#[error("http error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("pool error: {0}")]
	Pool(#[from] rotor_server_pool::PoolError),

	#[error("configuration error: {0}")]
	Config(#[from] rotor_common_config::SecretEnvError),

	#[error("i/o error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;
