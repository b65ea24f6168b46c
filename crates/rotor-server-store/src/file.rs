// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local-filesystem adapter: one JSON document per logical table.
//!
//! Writes go to a sibling temp file and are renamed into place, so a crash
//! mid-write can never leave a half-written document behind.

use std::path::PathBuf;

use crate::adapter::{Table, TableBackend, TableData};
use crate::error::Result;

/// Directory-backed store holding one JSON document per logical table.
#[derive(Debug, Clone)]
pub struct FileStore {
	dir: PathBuf,
}

impl FileStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	/// Backend view over one logical table.
	pub fn backend(&self, table: Table) -> FileBackend {
		FileBackend {
			path: self.dir.join(format!("{}.json", table.file_stem())),
		}
	}
}

/// One logical table stored as a single JSON file.
#[derive(Debug, Clone)]
pub struct FileBackend {
	path: PathBuf,
}

#[async_trait::async_trait]
impl TableBackend for FileBackend {
	async fn load(&self) -> Result<TableData> {
		match tokio::fs::read_to_string(&self.path).await {
			Ok(contents) => Ok(serde_json::from_str(&contents)?),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(TableData::new()),
			Err(e) => Err(e.into()),
		}
	}

	async fn write(&self, data: &TableData) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}

		let json = serde_json::to_string_pretty(data)?;
		let tmp = self.path.with_extension("json.tmp");
		tokio::fs::write(&tmp, json).await?;
		tokio::fs::rename(&tmp, &self.path).await?;

		Ok(())
	}
}
