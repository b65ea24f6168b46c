// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Write-back cache over one logical table.
//!
//! The cache mirrors the whole table in memory and serves every read from
//! that mirror. Mutations mark the table dirty and return immediately; a
//! background task flushes the full document to the backend on a fixed
//! interval. The durability guarantee is "persisted within one flush
//! interval", plus a final flush on clean shutdown.
//!
//! The flush path snapshots the map before any I/O begins, so readers and
//! writers never wait on the backend and never observe a half-written table.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::adapter::{TableBackend, TableData};
use crate::error::Result;

/// Default flush cadence, matching the storage layer's one-second debounce.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct CacheState {
	data: TableData,
	dirty: bool,
}

/// In-memory mirror of one logical table with debounced write-back.
pub struct DebouncedCache {
	name: String,
	backend: Arc<dyn TableBackend>,
	state: Arc<RwLock<CacheState>>,
	shutdown: watch::Sender<bool>,
	flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for DebouncedCache {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DebouncedCache")
			.field("name", &self.name)
			.finish()
	}
}

impl DebouncedCache {
	/// Load the table from the backend and start the background flush task.
	///
	/// A backend read failure yields an empty cache rather than an error:
	/// availability is chosen over cold-start durability, and the failure
	/// is logged at error level.
	pub async fn open(
		name: impl Into<String>,
		backend: Arc<dyn TableBackend>,
		flush_interval: Duration,
	) -> Self {
		let name = name.into();

		let data = match backend.load().await {
			Ok(data) => {
				debug!(table = %name, entries = data.len(), "cache loaded");
				data
			}
			Err(e) => {
				error!(table = %name, error = %e, "cache load failed, starting empty");
				TableData::new()
			}
		};

		let state = Arc::new(RwLock::new(CacheState { data, dirty: false }));
		let (shutdown, mut shutdown_rx) = watch::channel(false);

		let task = {
			let name = name.clone();
			let backend = Arc::clone(&backend);
			let state = Arc::clone(&state);
			tokio::spawn(async move {
				let mut ticker = tokio::time::interval(flush_interval);
				ticker.tick().await;
				loop {
					tokio::select! {
						_ = ticker.tick() => {
							if let Err(e) = flush_table(&name, backend.as_ref(), &state).await {
								warn!(table = %name, error = %e, "flush failed, retrying next tick");
							}
						}
						_ = shutdown_rx.changed() => break,
					}
				}
			})
		};

		Self {
			name,
			backend,
			state,
			shutdown,
			flush_task: Mutex::new(Some(task)),
		}
	}

	/// Read a value from memory. Never touches the backend.
	pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
		self.state.read().await.data.get(key).cloned()
	}

	/// Read a value, falling back to `default` when the key is absent.
	pub async fn get_or(&self, key: &str, default: serde_json::Value) -> serde_json::Value {
		self.get(key).await.unwrap_or(default)
	}

	/// Write a value to memory and mark the table dirty.
	pub async fn set(&self, key: impl Into<String>, value: serde_json::Value) {
		let mut state = self.state.write().await;
		state.data.insert(key.into(), value);
		state.dirty = true;
	}

	/// Remove a key from memory and mark the table dirty. Returns whether
	/// the key existed.
	pub async fn delete(&self, key: &str) -> bool {
		let mut state = self.state.write().await;
		let existed = state.data.remove(key).is_some();
		if existed {
			state.dirty = true;
		}
		existed
	}

	/// Snapshot copy of the full table. The copy does not reflect
	/// mutations made after this call returns.
	pub async fn get_all(&self) -> TableData {
		self.state.read().await.data.clone()
	}

	pub async fn len(&self) -> usize {
		self.state.read().await.data.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.state.read().await.data.is_empty()
	}

	/// Flush now if dirty. The background task does the same on its tick;
	/// this exists for callers that want durability before proceeding.
	pub async fn flush(&self) -> Result<()> {
		flush_table(&self.name, self.backend.as_ref(), &self.state).await
	}

	/// Stop the background task and perform one final flush.
	///
	/// After `stop` returns successfully, no dirty data remains in memory
	/// only.
	pub async fn stop(&self) -> Result<()> {
		let _ = self.shutdown.send(true);
		if let Some(task) = self.flush_task.lock().await.take() {
			let _ = task.await;
		}
		self.flush().await?;
		debug!(table = %self.name, "cache stopped");
		Ok(())
	}
}

/// Snapshot-then-write flush. The map lock is released before any backend
/// I/O starts; on failure the table is re-marked dirty so no mutation is
/// ever dropped.
async fn flush_table(
	name: &str,
	backend: &dyn TableBackend,
	state: &RwLock<CacheState>,
) -> Result<()> {
	let snapshot = {
		let mut state = state.write().await;
		if !state.dirty {
			return Ok(());
		}
		state.dirty = false;
		state.data.clone()
	};

	match backend.write(&snapshot).await {
		Ok(()) => {
			debug!(table = %name, entries = snapshot.len(), "table flushed");
			Ok(())
		}
		Err(e) => {
			state.write().await.dirty = true;
			Err(e)
		}
	}
}
