// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Credential records as persisted in the credentials table.
//!
//! Every field carries a serde default so records written by older builds
//! (or edited by hand) still deserialize.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Rolling window for usage samples.
pub const STATS_WINDOW_HOURS: i64 = 24;

/// Health state persisted alongside each credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialHealth {
	/// Administratively disabled; never selected until cleared.
	#[serde(default)]
	pub disabled: bool,
	/// Temporarily excluded from selection until this instant.
	#[serde(default)]
	pub cooldown_until: Option<DateTime<Utc>>,
	/// Recent failure status codes, oldest first, bounded by the pool's cap.
	#[serde(default)]
	pub error_codes: Vec<u16>,
	pub last_success: DateTime<Utc>,
	/// Account email resolved during authorization, for display only.
	#[serde(default)]
	pub resolved_email: Option<String>,
	/// Rate-limit errors since the last success, drives exponential cooldown.
	#[serde(default)]
	pub consecutive_rate_limits: u32,
}

impl CredentialHealth {
	pub fn new() -> Self {
		Self {
			disabled: false,
			cooldown_until: None,
			error_codes: Vec::new(),
			last_success: Utc::now(),
			resolved_email: None,
			consecutive_rate_limits: 0,
		}
	}

	/// Append a failure status code, evicting the oldest beyond `cap`.
	pub fn push_error_code(&mut self, code: u16, cap: usize) {
		self.error_codes.push(code);
		while self.error_codes.len() > cap {
			self.error_codes.remove(0);
		}
	}

	pub fn is_cooling(&self, now: DateTime<Utc>) -> bool {
		matches!(self.cooldown_until, Some(until) if until > now)
	}
}

impl Default for CredentialHealth {
	fn default() -> Self {
		Self::new()
	}
}

/// One API call, success or failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CallSample {
	pub at: DateTime<Utc>,
	pub ok: bool,
}

/// One observed request latency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatencySample {
	pub at: DateTime<Utc>,
	pub millis: u64,
}

/// Rolling usage statistics, pruned to [`STATS_WINDOW_HOURS`] on mutation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialStats {
	#[serde(default)]
	pub calls: Vec<CallSample>,
	#[serde(default)]
	pub latencies: Vec<LatencySample>,
}

impl CredentialStats {
	pub fn record_call(&mut self, at: DateTime<Utc>, ok: bool) {
		self.calls.push(CallSample { at, ok });
	}

	pub fn record_latency(&mut self, at: DateTime<Utc>, millis: u64) {
		self.latencies.push(LatencySample { at, millis });
	}

	/// Drop samples older than the rolling window.
	pub fn prune(&mut self, now: DateTime<Utc>) {
		let horizon = now - Duration::hours(STATS_WINDOW_HOURS);
		self.calls.retain(|s| s.at >= horizon);
		self.latencies.retain(|s| s.at >= horizon);
	}

	pub fn calls_in_window(&self) -> usize {
		self.calls.len()
	}
}

/// A pooled credential: opaque secret plus bookkeeping.
///
/// The secret blob is never interpreted here; the pool only tracks its
/// existence and health.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRecord {
	pub secret: serde_json::Value,
	#[serde(default)]
	pub health: CredentialHealth,
	#[serde(default)]
	pub stats: CredentialStats,
}

impl CredentialRecord {
	pub fn new(secret: serde_json::Value) -> Self {
		Self {
			secret,
			health: CredentialHealth::new(),
			stats: CredentialStats::default(),
		}
	}
}

/// The outcome of one upstream call made with a credential.
#[derive(Debug, Clone, Copy)]
pub struct CallOutcome {
	pub ok: bool,
	pub status: Option<u16>,
	pub latency_ms: Option<u64>,
}

impl CallOutcome {
	pub fn success(latency_ms: u64) -> Self {
		Self {
			ok: true,
			status: None,
			latency_ms: Some(latency_ms),
		}
	}

	pub fn failure(status: u16) -> Self {
		Self {
			ok: false,
			status: Some(status),
			latency_ms: None,
		}
	}
}

/// Selection-relevant state for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
	Available,
	CoolingDown,
	Disabled,
}

/// Health summary for one credential. Never includes secret material.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialHealthInfo {
	pub name: String,
	pub state: CredentialState,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cooldown_remaining_secs: Option<u64>,
	pub error_codes: Vec<u16>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub resolved_email: Option<String>,
	pub last_success: DateTime<Utc>,
	pub calls_24h: usize,
}

/// Overall pool status for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
	pub credentials_total: usize,
	pub credentials_available: usize,
	pub credentials_cooling: usize,
	pub credentials_disabled: usize,
	pub credentials: Vec<CredentialHealthInfo>,
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_error_code_ring_evicts_oldest() {
		let mut health = CredentialHealth::new();
		for code in 0..15u16 {
			health.push_error_code(500 + code, 10);
		}
		assert_eq!(health.error_codes.len(), 10);
		assert_eq!(health.error_codes[0], 505);
		assert_eq!(health.error_codes[9], 514);
	}

	#[test]
	fn test_is_cooling() {
		let now = Utc::now();
		let mut health = CredentialHealth::new();
		assert!(!health.is_cooling(now));

		health.cooldown_until = Some(now + Duration::minutes(5));
		assert!(health.is_cooling(now));

		health.cooldown_until = Some(now - Duration::minutes(5));
		assert!(!health.is_cooling(now));
	}

	#[test]
	fn test_stats_prune_keeps_window() {
		let now = Utc::now();
		let mut stats = CredentialStats::default();
		stats.record_call(now - Duration::hours(25), true);
		stats.record_call(now - Duration::hours(23), true);
		stats.record_call(now, false);
		stats.record_latency(now - Duration::hours(30), 120);
		stats.record_latency(now, 80);

		stats.prune(now);

		assert_eq!(stats.calls.len(), 2);
		assert_eq!(stats.latencies.len(), 1);
		assert_eq!(stats.latencies[0].millis, 80);
	}

	#[test]
	fn test_record_deserializes_with_missing_fields() {
		// A bare blob written before health tracking existed.
		let value = json!({ "secret": { "refresh_token": "rt" } });
		let record: CredentialRecord = serde_json::from_value(value).unwrap();

		assert!(!record.health.disabled);
		assert!(record.health.cooldown_until.is_none());
		assert!(record.stats.calls.is_empty());
	}

	#[test]
	fn test_record_round_trip() {
		let mut record = CredentialRecord::new(json!({"token": "abc"}));
		record.health.push_error_code(429, 10);
		record.health.resolved_email = Some("user@example.com".to_string());

		let value = serde_json::to_value(&record).unwrap();
		let back: CredentialRecord = serde_json::from_value(value).unwrap();

		assert_eq!(back.secret, json!({"token": "abc"}));
		assert_eq!(back.health.error_codes, vec![429]);
		assert_eq!(
			back.health.resolved_email.as_deref(),
			Some("user@example.com")
		);
	}

	#[test]
	fn test_health_info_omits_empty_optionals() {
		let info = CredentialHealthInfo {
			name: "cred-1".to_string(),
			state: CredentialState::Available,
			cooldown_remaining_secs: None,
			error_codes: Vec::new(),
			resolved_email: None,
			last_success: Utc::now(),
			calls_24h: 0,
		};

		let json = serde_json::to_string(&info).unwrap();
		assert!(json.contains("\"state\":\"available\""));
		assert!(!json.contains("cooldown_remaining_secs"));
		assert!(!json.contains("resolved_email"));
	}
}
