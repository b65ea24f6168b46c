// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The backend contract every durable adapter implements.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// The full contents of one logical table.
pub type TableData = HashMap<String, serde_json::Value>;

/// The two logical tables rotor persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
	/// Named credential records: secret blob + health + stats per name.
	Credentials,
	/// Arbitrary small key/value settings, including the rotation order.
	Config,
}

impl Table {
	/// Row key under which the whole table document is stored in a
	/// relational backend.
	pub fn row_key(&self) -> &'static str {
		match self {
			Table::Credentials => "all_credentials",
			Table::Config => "config_data",
		}
	}

	/// File stem used by the file backend.
	pub fn file_stem(&self) -> &'static str {
		match self {
			Table::Credentials => "credentials",
			Table::Config => "config",
		}
	}
}

/// One whole logical table, loadable and writable atomically.
///
/// Adapters are free to represent the table as a single row, document, or
/// file; the cache only ever reads or replaces the table as a unit, and all
/// implementations must be indistinguishable from its perspective.
#[async_trait]
pub trait TableBackend: Send + Sync {
	/// Read the entire table. A table that has never been written is an
	/// empty map, not an error.
	async fn load(&self) -> Result<TableData>;

	/// Replace the entire table in one atomic operation.
	async fn write(&self, data: &TableData) -> Result<()>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_row_keys_are_distinct() {
		assert_ne!(Table::Credentials.row_key(), Table::Config.row_key());
		assert_ne!(Table::Credentials.file_stem(), Table::Config.file_stem());
	}
}
