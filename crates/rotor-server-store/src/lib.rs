// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable storage layer for rotor.
//!
//! Persistent state lives in two logical tables — `credentials` and
//! `config` — each stored as a single serialized JSON document in whichever
//! backend is configured. Three interchangeable adapters implement the
//! [`TableBackend`] trait:
//!
//! - [`SqliteStore`]: embedded single-file database (WAL mode)
//! - [`PostgresStore`]: networked relational database
//! - [`FileStore`]: one JSON document per table on local disk
//!
//! The hot path never talks to a backend directly. [`DebouncedCache`]
//! mirrors a whole logical table in memory, serves every read from that
//! mirror, and coalesces bursts of writes into periodic whole-table flushes.
//!
//! Backend selection is an explicit [`StoreConfig`] decided at startup;
//! there is deliberately no connection-string sniffing.

mod adapter;
mod cache;
mod config;
mod error;
mod file;
mod postgres;
mod sqlite;
pub mod testing;

pub use adapter::{Table, TableBackend, TableData};
pub use cache::{DebouncedCache, DEFAULT_FLUSH_INTERVAL};
pub use config::{DurableStore, StoreConfig};
pub use error::{Result, StoreError};
pub use file::FileStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
