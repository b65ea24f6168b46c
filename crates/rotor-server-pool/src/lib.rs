// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health-aware credential pool.
//!
//! Credentials are opaque secret blobs with persisted health and usage
//! bookkeeping. The pool rotates round-robin over a persisted order,
//! skipping disabled and cooling-down entries, and turns reported
//! rate-limit failures into cooldowns.

pub mod error;
pub mod pool;
pub mod types;

pub use error::{PoolError, Result};
pub use pool::{CooldownPolicy, CredentialHandle, CredentialPool, PoolConfig, Selection};
pub use types::{
	CallOutcome, CallSample, CredentialHealth, CredentialHealthInfo, CredentialRecord,
	CredentialState, CredentialStats, LatencySample, PoolStatus, STATS_WINDOW_HOURS,
};
