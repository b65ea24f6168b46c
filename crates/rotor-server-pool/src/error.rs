// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pool error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
	#[error("credential not found: {0}")]
	NotFound(String),

	#[error("storage error: {0}")]
	Store(#[from] rotor_server_store::StoreError),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PoolError>;
