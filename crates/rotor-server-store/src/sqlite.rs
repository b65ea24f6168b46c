// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Embedded SQLite adapter.
//!
//! Single `unified_storage` table, one row per logical table, the whole
//! table serialized as one JSON document in the `data` column.

use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};

use crate::adapter::{Table, TableBackend, TableData};
use crate::error::{Result, StoreError};

/// Handle to an open SQLite database holding both logical tables.
#[derive(Debug, Clone)]
pub struct SqliteStore {
	pool: SqlitePool,
}

impl SqliteStore {
	/// Open (creating if missing) the database at `database_url`, e.g.
	/// `sqlite:./rotor.db`, with WAL mode and common settings.
	#[tracing::instrument(skip(database_url))]
	pub async fn connect(database_url: &str) -> Result<Self> {
		let options = SqliteConnectOptions::from_str(database_url)
			.map_err(|e| StoreError::Internal(format!("Invalid database URL: {e}")))?
			.journal_mode(SqliteJournalMode::Wal)
			.synchronous(SqliteSynchronous::Normal)
			.create_if_missing(true);

		let pool = SqlitePool::connect_with(options).await?;

		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS unified_storage (
				key TEXT PRIMARY KEY,
				data TEXT NOT NULL,
				updated_at TEXT NOT NULL
			)
			"#,
		)
		.execute(&pool)
		.await?;

		tracing::debug!("sqlite store opened");
		Ok(Self { pool })
	}

	/// Backend view over one logical table.
	pub fn backend(&self, table: Table) -> SqliteBackend {
		SqliteBackend {
			pool: self.pool.clone(),
			row_key: table.row_key(),
		}
	}
}

/// One logical table inside a [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct SqliteBackend {
	pool: SqlitePool,
	row_key: &'static str,
}

#[async_trait::async_trait]
impl TableBackend for SqliteBackend {
	async fn load(&self) -> Result<TableData> {
		let row: Option<String> =
			sqlx::query_scalar("SELECT data FROM unified_storage WHERE key = ?1")
				.bind(self.row_key)
				.fetch_optional(&self.pool)
				.await?;

		match row {
			Some(json) => Ok(serde_json::from_str(&json)?),
			None => Ok(TableData::new()),
		}
	}

	async fn write(&self, data: &TableData) -> Result<()> {
		let json = serde_json::to_string(data)?;

		sqlx::query(
			r#"
			INSERT INTO unified_storage (key, data, updated_at)
			VALUES (?1, ?2, ?3)
			ON CONFLICT(key) DO UPDATE SET
				data = excluded.data,
				updated_at = excluded.updated_at
			"#,
		)
		.bind(self.row_key)
		.bind(json)
		.bind(Utc::now().to_rfc3339())
		.execute(&self.pool)
		.await?;

		Ok(())
	}
}
