// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared test fixtures for the storage layer and its consumers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::adapter::{TableBackend, TableData};
use crate::error::{Result, StoreError};

/// In-memory backend with injectable failures.
///
/// Shared behind an `Arc`, it lets tests observe exactly what a cache
/// flushed and simulate a backend outage on either side of the contract.
#[derive(Debug, Default)]
pub struct MemoryBackend {
	data: Mutex<TableData>,
	fail_loads: AtomicBool,
	fail_writes: AtomicBool,
	write_count: AtomicUsize,
}

impl MemoryBackend {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_contents(data: TableData) -> Self {
		Self {
			data: Mutex::new(data),
			..Self::default()
		}
	}

	/// Make every subsequent `load` fail.
	pub fn set_fail_loads(&self, fail: bool) {
		self.fail_loads.store(fail, Ordering::SeqCst);
	}

	/// Make every subsequent `write` fail.
	pub fn set_fail_writes(&self, fail: bool) {
		self.fail_writes.store(fail, Ordering::SeqCst);
	}

	/// Number of successful writes observed.
	pub fn write_count(&self) -> usize {
		self.write_count.load(Ordering::SeqCst)
	}

	/// Snapshot of the currently persisted contents.
	pub fn contents(&self) -> TableData {
		self.data.lock().unwrap().clone()
	}
}

#[async_trait::async_trait]
impl TableBackend for MemoryBackend {
	async fn load(&self) -> Result<TableData> {
		if self.fail_loads.load(Ordering::SeqCst) {
			return Err(StoreError::Internal("simulated load failure".to_string()));
		}
		Ok(self.data.lock().unwrap().clone())
	}

	async fn write(&self, data: &TableData) -> Result<()> {
		if self.fail_writes.load(Ordering::SeqCst) {
			return Err(StoreError::Internal("simulated write failure".to_string()));
		}
		*self.data.lock().unwrap() = data.clone();
		self.write_count.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}
