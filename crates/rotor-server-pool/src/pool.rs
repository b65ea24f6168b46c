// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health-aware credential pool with round-robin rotation.
//!
//! The pool owns two write-back caches: the credentials table (one record
//! per credential, secret plus health plus stats) and the config table,
//! which holds the rotation order under a reserved key. Callers take a
//! credential, use it upstream, and report the outcome back; the pool
//! turns repeated rate-limit errors into cooldowns so the next selection
//! lands on a healthier credential.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rotor_server_store::{
	DebouncedCache, DurableStore, Table, TableBackend, DEFAULT_FLUSH_INTERVAL,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{PoolError, Result};
use crate::types::{
	CallOutcome, CredentialHealthInfo, CredentialRecord, CredentialState, PoolStatus,
};

/// Config-table key holding the rotation order.
const ORDER_KEY: &str = "_credential_order";

/// How long a credential sits out after a rate-limit error.
#[derive(Debug, Clone, Copy)]
pub enum CooldownPolicy {
	Fixed(Duration),
	/// Doubles per consecutive rate-limit error, capped at `max`.
	Exponential { base: Duration, max: Duration },
}

impl CooldownPolicy {
	/// Cooldown for the nth consecutive rate-limit error, 1-based.
	pub fn duration_for(&self, consecutive: u32) -> Duration {
		match self {
			CooldownPolicy::Fixed(d) => *d,
			CooldownPolicy::Exponential { base, max } => {
				let shift = consecutive.saturating_sub(1).min(16);
				base.saturating_mul(1u32 << shift).min(*max)
			}
		}
	}
}

impl Default for CooldownPolicy {
	fn default() -> Self {
		CooldownPolicy::Fixed(Duration::from_secs(5 * 60))
	}
}

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
	pub cooldown: CooldownPolicy,
	/// Status codes treated as rate limiting rather than plain failure.
	pub rate_limit_codes: HashSet<u16>,
	/// Bound on the per-credential failure-code ring.
	pub error_code_cap: usize,
}

impl Default for PoolConfig {
	fn default() -> Self {
		Self {
			cooldown: CooldownPolicy::default(),
			rate_limit_codes: HashSet::from([429]),
			error_code_cap: 10,
		}
	}
}

/// A selected credential, detached from pool state.
#[derive(Debug, Clone)]
pub struct CredentialHandle {
	pub name: String,
	pub secret: serde_json::Value,
}

/// Outcome of a selection attempt.
///
/// `Exhausted` is an explicit signal, not an error: every credential is
/// disabled, cooling down, or the pool is empty.
#[derive(Debug, Clone)]
pub enum Selection {
	Credential(CredentialHandle),
	Exhausted,
}

/// Pool of upstream credentials with health-aware rotation.
pub struct CredentialPool {
	credentials: Arc<DebouncedCache>,
	config_table: Arc<DebouncedCache>,
	config: PoolConfig,
	/// Serializes every read-modify-write so per-credential mutations
	/// apply in arrival order.
	mutate: Mutex<()>,
	/// Round-robin position within the rotation order.
	cursor: Mutex<usize>,
}

impl std::fmt::Debug for CredentialPool {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CredentialPool")
			.field("config", &self.config)
			.finish()
	}
}

impl CredentialPool {
	/// Open the pool over a durable store with the default flush interval.
	pub async fn open(store: &DurableStore, config: PoolConfig) -> Self {
		Self::with_backends(
			store.backend(Table::Credentials),
			store.backend(Table::Config),
			config,
			DEFAULT_FLUSH_INTERVAL,
		)
		.await
	}

	/// Open the pool over explicit table backends.
	pub async fn with_backends(
		credentials: Arc<dyn TableBackend>,
		config_table: Arc<dyn TableBackend>,
		config: PoolConfig,
		flush_interval: Duration,
	) -> Self {
		let credentials = Arc::new(DebouncedCache::open("credentials", credentials, flush_interval).await);
		let config_table = Arc::new(DebouncedCache::open("config", config_table, flush_interval).await);

		let loaded = credentials.len().await;
		info!(credentials = loaded, "credential pool opened");

		Self {
			credentials,
			config_table,
			config,
			mutate: Mutex::new(()),
			cursor: Mutex::new(0),
		}
	}

	/// Add or replace a credential's secret.
	///
	/// Re-adding an existing name keeps its health and stats; only the
	/// secret blob is replaced. New names join the end of the rotation.
	pub async fn add(&self, name: &str, secret: serde_json::Value) -> Result<()> {
		let _guard = self.mutate.lock().await;

		let record = match self.load_record(name).await? {
			Some(mut existing) => {
				existing.secret = secret;
				existing
			}
			None => CredentialRecord::new(secret),
		};
		self.store_record(name, &record).await?;

		let mut order = self.load_order().await;
		if !order.iter().any(|n| n == name) {
			order.push(name.to_string());
			self.store_order(&order).await;
		}

		info!(name = %name, "credential added");
		Ok(())
	}

	/// Remove a credential and its rotation slot. Idempotent; returns
	/// whether the name existed.
	pub async fn remove(&self, name: &str) -> Result<bool> {
		let _guard = self.mutate.lock().await;

		let existed = self.credentials.delete(name).await;

		let mut order = self.load_order().await;
		let before = order.len();
		order.retain(|n| n != name);
		if order.len() != before {
			self.store_order(&order).await;
		}

		if existed {
			info!(name = %name, "credential removed");
		}
		Ok(existed)
	}

	/// Set or clear the administrative disable flag.
	pub async fn set_disabled(&self, name: &str, disabled: bool) -> Result<()> {
		let _guard = self.mutate.lock().await;

		let mut record = self
			.load_record(name)
			.await?
			.ok_or_else(|| PoolError::NotFound(name.to_string()))?;
		record.health.disabled = disabled;
		self.store_record(name, &record).await?;

		info!(name = %name, disabled, "credential disable flag updated");
		Ok(())
	}

	/// Record the account email resolved for a credential.
	pub async fn set_resolved_email(&self, name: &str, email: &str) -> Result<()> {
		let _guard = self.mutate.lock().await;

		let mut record = self
			.load_record(name)
			.await?
			.ok_or_else(|| PoolError::NotFound(name.to_string()))?;
		record.health.resolved_email = Some(email.to_string());
		self.store_record(name, &record).await?;

		debug!(name = %name, "resolved email recorded");
		Ok(())
	}

	/// Report the outcome of an upstream call made with a credential.
	///
	/// Success clears accumulated errors and any cooldown. A failure with
	/// a rate-limit status code starts a cooldown per the configured
	/// policy. Unknown names are a logged no-op: the credential may have
	/// been removed while the call was in flight.
	pub async fn record_outcome(&self, name: &str, outcome: CallOutcome) -> Result<()> {
		let _guard = self.mutate.lock().await;

		let Some(mut record) = self.load_record(name).await? else {
			warn!(name = %name, "outcome for unknown credential, ignoring");
			return Ok(());
		};

		let now = Utc::now();
		if outcome.ok {
			record.health.error_codes.clear();
			record.health.cooldown_until = None;
			record.health.consecutive_rate_limits = 0;
			record.health.last_success = now;
			record.stats.record_call(now, true);
			if let Some(millis) = outcome.latency_ms {
				record.stats.record_latency(now, millis);
			}
		} else {
			record.stats.record_call(now, false);
			if let Some(code) = outcome.status {
				record
					.health
					.push_error_code(code, self.config.error_code_cap);
				if self.config.rate_limit_codes.contains(&code) {
					record.health.consecutive_rate_limits =
						record.health.consecutive_rate_limits.saturating_add(1);
					let cooldown = self
						.config
						.cooldown
						.duration_for(record.health.consecutive_rate_limits);
					record.health.cooldown_until = Some(now + to_chrono(cooldown));
					info!(
						name = %name,
						status = code,
						cooldown_secs = cooldown.as_secs(),
						"credential cooling down after rate limit"
					);
				}
			}
		}
		record.stats.prune(now);

		self.store_record(name, &record).await
	}

	/// Select the next usable credential, round-robin over the rotation
	/// order.
	///
	/// Usable means not disabled and not cooling down; an expired cooldown
	/// is cleared in place. Names present in the credentials table but
	/// missing from the order are appended first, so every credential gets
	/// a rotation slot.
	pub async fn select_usable(&self) -> Result<Selection> {
		let _guard = self.mutate.lock().await;

		let order = self.reconciled_order().await;
		let n = order.len();
		if n == 0 {
			return Ok(Selection::Exhausted);
		}

		let mut cursor = self.cursor.lock().await;
		let start = *cursor % n;
		let now = Utc::now();

		for i in 0..n {
			let idx = (start + i) % n;
			let name = &order[idx];

			// Stale order entries are skipped; `remove` reconciles them.
			let Some(mut record) = self.load_record_lenient(name).await else {
				continue;
			};

			if record.health.disabled {
				continue;
			}
			if let Some(until) = record.health.cooldown_until {
				if until > now {
					continue;
				}
				record.health.cooldown_until = None;
				record.health.consecutive_rate_limits = 0;
				self.store_record(name, &record).await?;
				debug!(name = %name, "cooldown expired, credential available again");
			}

			*cursor = (idx + 1) % n;
			debug!(name = %name, "selected credential");
			return Ok(Selection::Credential(CredentialHandle {
				name: name.clone(),
				secret: record.secret,
			}));
		}

		debug!("no usable credential");
		Ok(Selection::Exhausted)
	}

	/// The persisted rotation order.
	pub async fn rotation_order(&self) -> Vec<String> {
		self.load_order().await
	}

	/// Replace the rotation order and restart the round-robin from its
	/// head.
	pub async fn set_rotation_order(&self, order: Vec<String>) {
		let _guard = self.mutate.lock().await;
		self.store_order(&order).await;
		*self.cursor.lock().await = 0;
		info!(entries = order.len(), "rotation order replaced");
	}

	/// Per-credential health plus aggregate counts. No secret material.
	pub async fn list_status(&self) -> PoolStatus {
		let now = Utc::now();
		let all = self.credentials.get_all().await;

		let mut available = 0;
		let mut cooling = 0;
		let mut disabled = 0;
		let mut credentials = Vec::with_capacity(all.len());

		for (name, value) in all {
			let record: CredentialRecord = match serde_json::from_value(value) {
				Ok(record) => record,
				Err(e) => {
					warn!(name = %name, error = %e, "skipping malformed credential record");
					continue;
				}
			};

			let (state, cooldown_remaining_secs) = if record.health.disabled {
				disabled += 1;
				(CredentialState::Disabled, None)
			} else if record.health.is_cooling(now) {
				cooling += 1;
				let remaining = record
					.health
					.cooldown_until
					.map(|until| (until - now).num_seconds().max(0) as u64);
				(CredentialState::CoolingDown, remaining)
			} else {
				available += 1;
				(CredentialState::Available, None)
			};

			credentials.push(CredentialHealthInfo {
				name,
				state,
				cooldown_remaining_secs,
				error_codes: record.health.error_codes.clone(),
				resolved_email: record.health.resolved_email.clone(),
				last_success: record.health.last_success,
				calls_24h: record.stats.calls_in_window(),
			});
		}

		credentials.sort_by(|a, b| a.name.cmp(&b.name));

		PoolStatus {
			credentials_total: credentials.len(),
			credentials_available: available,
			credentials_cooling: cooling,
			credentials_disabled: disabled,
			credentials,
		}
	}

	/// Flush both tables now.
	pub async fn flush(&self) -> Result<()> {
		self.credentials.flush().await?;
		self.config_table.flush().await?;
		Ok(())
	}

	/// Stop background flushing and persist any dirty state.
	pub async fn stop(&self) -> Result<()> {
		self.credentials.stop().await?;
		self.config_table.stop().await?;
		Ok(())
	}

	async fn load_record(&self, name: &str) -> Result<Option<CredentialRecord>> {
		match self.credentials.get(name).await {
			Some(value) => Ok(Some(serde_json::from_value(value)?)),
			None => Ok(None),
		}
	}

	/// Like [`load_record`](Self::load_record) but treats a malformed blob
	/// as absent, for paths that iterate over many records.
	async fn load_record_lenient(&self, name: &str) -> Option<CredentialRecord> {
		let value = self.credentials.get(name).await?;
		match serde_json::from_value(value) {
			Ok(record) => Some(record),
			Err(e) => {
				warn!(name = %name, error = %e, "skipping malformed credential record");
				None
			}
		}
	}

	async fn store_record(&self, name: &str, record: &CredentialRecord) -> Result<()> {
		self
			.credentials
			.set(name, serde_json::to_value(record)?)
			.await;
		Ok(())
	}

	async fn load_order(&self) -> Vec<String> {
		self
			.config_table
			.get(ORDER_KEY)
			.await
			.and_then(|v| serde_json::from_value(v).ok())
			.unwrap_or_default()
	}

	async fn store_order(&self, order: &[String]) {
		self
			.config_table
			.set(ORDER_KEY, serde_json::json!(order))
			.await;
	}

	/// Rotation order with any unlisted credential names appended, in
	/// name order so the result is deterministic.
	async fn reconciled_order(&self) -> Vec<String> {
		let mut order = self.load_order().await;
		let listed: HashSet<&String> = order.iter().collect();

		let mut missing: Vec<String> = self
			.credentials
			.get_all()
			.await
			.into_keys()
			.filter(|name| !listed.contains(name))
			.collect();

		if !missing.is_empty() {
			missing.sort();
			order.extend(missing);
			self.store_order(&order).await;
		}
		order
	}
}

fn to_chrono(d: Duration) -> chrono::Duration {
	chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::hours(24))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::CredentialState;
	use rotor_server_store::testing::MemoryBackend;
	use serde_json::json;

	async fn pool_with(config: PoolConfig) -> CredentialPool {
		CredentialPool::with_backends(
			Arc::new(MemoryBackend::new()),
			Arc::new(MemoryBackend::new()),
			config,
			Duration::from_secs(3600),
		)
		.await
	}

	async fn test_pool() -> CredentialPool {
		pool_with(PoolConfig::default()).await
	}

	fn selected_name(selection: Selection) -> String {
		match selection {
			Selection::Credential(handle) => handle.name,
			Selection::Exhausted => panic!("expected a credential, pool exhausted"),
		}
	}

	#[test]
	fn test_fixed_cooldown_policy() {
		let policy = CooldownPolicy::Fixed(Duration::from_secs(300));
		assert_eq!(policy.duration_for(1), Duration::from_secs(300));
		assert_eq!(policy.duration_for(7), Duration::from_secs(300));
	}

	#[test]
	fn test_exponential_cooldown_policy_doubles_and_caps() {
		let policy = CooldownPolicy::Exponential {
			base: Duration::from_secs(60),
			max: Duration::from_secs(600),
		};
		assert_eq!(policy.duration_for(1), Duration::from_secs(60));
		assert_eq!(policy.duration_for(2), Duration::from_secs(120));
		assert_eq!(policy.duration_for(3), Duration::from_secs(240));
		assert_eq!(policy.duration_for(4), Duration::from_secs(480));
		assert_eq!(policy.duration_for(5), Duration::from_secs(600));
		assert_eq!(policy.duration_for(50), Duration::from_secs(600));
	}

	#[tokio::test]
	async fn test_empty_pool_is_exhausted() {
		let pool = test_pool().await;
		assert!(matches!(
			pool.select_usable().await.unwrap(),
			Selection::Exhausted
		));
	}

	#[tokio::test]
	async fn test_add_then_select_returns_secret() {
		let pool = test_pool().await;
		pool.add("cred-1", json!({"token": "abc"})).await.unwrap();

		match pool.select_usable().await.unwrap() {
			Selection::Credential(handle) => {
				assert_eq!(handle.name, "cred-1");
				assert_eq!(handle.secret, json!({"token": "abc"}));
			}
			Selection::Exhausted => panic!("pool should not be exhausted"),
		}
	}

	#[tokio::test]
	async fn test_round_robin_cycles() {
		let pool = test_pool().await;
		pool.add("a", json!(1)).await.unwrap();
		pool.add("b", json!(2)).await.unwrap();
		pool.add("c", json!(3)).await.unwrap();

		let mut seen = Vec::new();
		for _ in 0..6 {
			seen.push(selected_name(pool.select_usable().await.unwrap()));
		}
		assert_eq!(seen, vec!["a", "b", "c", "a", "b", "c"]);
	}

	#[tokio::test]
	async fn test_disabled_credential_is_skipped() {
		let pool = test_pool().await;
		pool.add("a", json!(1)).await.unwrap();
		pool.add("b", json!(2)).await.unwrap();
		pool.set_disabled("a", true).await.unwrap();

		for _ in 0..3 {
			assert_eq!(selected_name(pool.select_usable().await.unwrap()), "b");
		}

		pool.set_disabled("a", false).await.unwrap();
		let mut seen = Vec::new();
		for _ in 0..2 {
			seen.push(selected_name(pool.select_usable().await.unwrap()));
		}
		assert!(seen.contains(&"a".to_string()));
	}

	#[tokio::test]
	async fn test_set_disabled_unknown_name() {
		let pool = test_pool().await;
		let err = pool.set_disabled("ghost", true).await.unwrap_err();
		assert!(matches!(err, PoolError::NotFound(name) if name == "ghost"));
	}

	#[tokio::test]
	async fn test_rate_limit_starts_cooldown() {
		let pool = test_pool().await;
		pool.add("only", json!(1)).await.unwrap();

		pool
			.record_outcome("only", CallOutcome::failure(429))
			.await
			.unwrap();

		assert!(matches!(
			pool.select_usable().await.unwrap(),
			Selection::Exhausted
		));

		let status = pool.list_status().await;
		assert_eq!(status.credentials_cooling, 1);
		assert_eq!(status.credentials[0].state, CredentialState::CoolingDown);
		assert!(status.credentials[0].cooldown_remaining_secs.is_some());
	}

	#[tokio::test]
	async fn test_non_rate_limit_failure_stays_available() {
		let pool = test_pool().await;
		pool.add("only", json!(1)).await.unwrap();

		pool
			.record_outcome("only", CallOutcome::failure(500))
			.await
			.unwrap();

		assert_eq!(selected_name(pool.select_usable().await.unwrap()), "only");
		let status = pool.list_status().await;
		assert_eq!(status.credentials[0].error_codes, vec![500]);
	}

	#[tokio::test]
	async fn test_success_clears_errors_and_cooldown() {
		let pool = test_pool().await;
		pool.add("only", json!(1)).await.unwrap();

		pool
			.record_outcome("only", CallOutcome::failure(429))
			.await
			.unwrap();
		pool
			.record_outcome("only", CallOutcome::success(42))
			.await
			.unwrap();

		assert_eq!(selected_name(pool.select_usable().await.unwrap()), "only");
		let status = pool.list_status().await;
		assert_eq!(status.credentials_available, 1);
		assert!(status.credentials[0].error_codes.is_empty());
		assert_eq!(status.credentials[0].calls_24h, 2);
	}

	#[tokio::test]
	async fn test_expired_cooldown_cleared_on_selection() {
		let pool = pool_with(PoolConfig {
			cooldown: CooldownPolicy::Fixed(Duration::ZERO),
			..PoolConfig::default()
		})
		.await;
		pool.add("only", json!(1)).await.unwrap();

		pool
			.record_outcome("only", CallOutcome::failure(429))
			.await
			.unwrap();

		// Zero-length cooldown has already expired by selection time.
		assert_eq!(selected_name(pool.select_usable().await.unwrap()), "only");
		let status = pool.list_status().await;
		assert_eq!(status.credentials_available, 1);
	}

	#[tokio::test]
	async fn test_outcome_for_unknown_name_is_noop() {
		let pool = test_pool().await;
		pool
			.record_outcome("ghost", CallOutcome::failure(429))
			.await
			.unwrap();
		assert_eq!(pool.list_status().await.credentials_total, 0);
	}

	#[tokio::test]
	async fn test_concurrent_outcomes_apply_serializably() {
		let pool = Arc::new(test_pool().await);
		pool.add("shared", json!(1)).await.unwrap();

		let mut tasks = Vec::new();
		for _ in 0..8 {
			let pool = Arc::clone(&pool);
			tasks.push(tokio::spawn(async move {
				for _ in 0..4 {
					pool
						.record_outcome("shared", CallOutcome::failure(500))
						.await
						.unwrap();
				}
			}));
		}
		for task in tasks {
			task.await.unwrap();
		}

		// 32 interleaved failures settle exactly as 32 sequential ones: a
		// full error ring and every call counted.
		let status = pool.list_status().await;
		assert_eq!(status.credentials[0].calls_24h, 32);
		assert_eq!(status.credentials[0].error_codes, vec![500; 10]);
		assert_eq!(status.credentials_available, 1);
	}

	#[tokio::test]
	async fn test_concurrent_readds_never_lose_outcomes() {
		let pool = Arc::new(test_pool().await);
		pool.add("shared", json!({"v": 0})).await.unwrap();

		let writer = {
			let pool = Arc::clone(&pool);
			tokio::spawn(async move {
				for i in 1..=16 {
					pool.add("shared", json!({"v": i})).await.unwrap();
				}
			})
		};
		let reporter = {
			let pool = Arc::clone(&pool);
			tokio::spawn(async move {
				for _ in 0..16 {
					pool
						.record_outcome("shared", CallOutcome::success(5))
						.await
						.unwrap();
				}
			})
		};
		writer.await.unwrap();
		reporter.await.unwrap();

		// Re-adds replace only the secret, outcomes touch only health and
		// stats; under contention neither overwrites the other.
		let status = pool.list_status().await;
		assert_eq!(status.credentials_total, 1);
		assert_eq!(status.credentials[0].calls_24h, 16);
		match pool.select_usable().await.unwrap() {
			Selection::Credential(handle) => assert_eq!(handle.secret["v"], json!(16)),
			Selection::Exhausted => panic!("pool should not be exhausted"),
		}
	}

	#[tokio::test]
	async fn test_readd_preserves_health() {
		let pool = test_pool().await;
		pool.add("cred", json!({"v": 1})).await.unwrap();
		pool.set_disabled("cred", true).await.unwrap();

		pool.add("cred", json!({"v": 2})).await.unwrap();

		let status = pool.list_status().await;
		assert_eq!(status.credentials_disabled, 1);
		match pool.select_usable().await.unwrap() {
			Selection::Exhausted => {}
			Selection::Credential(_) => panic!("disabled credential was selected"),
		}

		// The secret itself was replaced.
		pool.set_disabled("cred", false).await.unwrap();
		match pool.select_usable().await.unwrap() {
			Selection::Credential(handle) => assert_eq!(handle.secret, json!({"v": 2})),
			Selection::Exhausted => panic!("pool should not be exhausted"),
		}
	}

	#[tokio::test]
	async fn test_remove_is_idempotent() {
		let pool = test_pool().await;
		pool.add("cred", json!(1)).await.unwrap();

		assert!(pool.remove("cred").await.unwrap());
		assert!(!pool.remove("cred").await.unwrap());
		assert!(pool.rotation_order().await.is_empty());
		assert!(matches!(
			pool.select_usable().await.unwrap(),
			Selection::Exhausted
		));
	}

	#[tokio::test]
	async fn test_rotation_order_respected() {
		let pool = test_pool().await;
		pool.add("a", json!(1)).await.unwrap();
		pool.add("b", json!(2)).await.unwrap();

		pool
			.set_rotation_order(vec!["b".to_string(), "a".to_string()])
			.await;

		assert_eq!(selected_name(pool.select_usable().await.unwrap()), "b");
		assert_eq!(selected_name(pool.select_usable().await.unwrap()), "a");
	}

	#[tokio::test]
	async fn test_order_reconciles_unlisted_names() {
		let pool = test_pool().await;
		pool.add("a", json!(1)).await.unwrap();
		pool.add("b", json!(2)).await.unwrap();

		// An order that lost a name still rotates over both.
		pool.set_rotation_order(vec!["b".to_string()]).await;

		let mut seen = HashSet::new();
		for _ in 0..2 {
			seen.insert(selected_name(pool.select_usable().await.unwrap()));
		}
		assert_eq!(seen.len(), 2);
		assert_eq!(pool.rotation_order().await, vec!["b", "a"]);
	}

	#[tokio::test]
	async fn test_stale_order_entry_skipped() {
		let pool = test_pool().await;
		pool.add("real", json!(1)).await.unwrap();
		pool
			.set_rotation_order(vec!["ghost".to_string(), "real".to_string()])
			.await;

		assert_eq!(selected_name(pool.select_usable().await.unwrap()), "real");
	}

	#[tokio::test]
	async fn test_set_resolved_email() {
		let pool = test_pool().await;
		pool.add("cred", json!(1)).await.unwrap();
		pool
			.set_resolved_email("cred", "user@example.com")
			.await
			.unwrap();

		let status = pool.list_status().await;
		assert_eq!(
			status.credentials[0].resolved_email.as_deref(),
			Some("user@example.com")
		);
	}

	#[tokio::test]
	async fn test_status_counts() {
		let pool = test_pool().await;
		pool.add("up", json!(1)).await.unwrap();
		pool.add("down", json!(2)).await.unwrap();
		pool.add("cooling", json!(3)).await.unwrap();

		pool.set_disabled("down", true).await.unwrap();
		pool
			.record_outcome("cooling", CallOutcome::failure(429))
			.await
			.unwrap();

		let status = pool.list_status().await;
		assert_eq!(status.credentials_total, 3);
		assert_eq!(status.credentials_available, 1);
		assert_eq!(status.credentials_cooling, 1);
		assert_eq!(status.credentials_disabled, 1);
	}

	#[tokio::test]
	async fn test_state_survives_reopen() {
		let cred_backend = Arc::new(MemoryBackend::new());
		let config_backend = Arc::new(MemoryBackend::new());

		let pool = CredentialPool::with_backends(
			Arc::clone(&cred_backend) as Arc<dyn TableBackend>,
			Arc::clone(&config_backend) as Arc<dyn TableBackend>,
			PoolConfig::default(),
			Duration::from_secs(3600),
		)
		.await;
		pool.add("a", json!({"token": "x"})).await.unwrap();
		pool.add("b", json!({"token": "y"})).await.unwrap();
		pool.set_disabled("b", true).await.unwrap();
		pool.stop().await.unwrap();

		let reopened = CredentialPool::with_backends(
			cred_backend,
			config_backend,
			PoolConfig::default(),
			Duration::from_secs(3600),
		)
		.await;

		assert_eq!(reopened.rotation_order().await, vec!["a", "b"]);
		let status = reopened.list_status().await;
		assert_eq!(status.credentials_total, 2);
		assert_eq!(status.credentials_disabled, 1);
		assert_eq!(selected_name(reopened.select_usable().await.unwrap()), "a");
	}

	#[tokio::test]
	async fn test_custom_rate_limit_codes() {
		let pool = pool_with(PoolConfig {
			rate_limit_codes: HashSet::from([429, 503]),
			..PoolConfig::default()
		})
		.await;
		pool.add("only", json!(1)).await.unwrap();

		pool
			.record_outcome("only", CallOutcome::failure(503))
			.await
			.unwrap();

		assert!(matches!(
			pool.select_usable().await.unwrap(),
			Selection::Exhausted
		));
	}
}
