//! Promptbook database layer.
//!
//! Provides SQLite connection management, schema migrations and the durable
//! key-value store used for credentials and sync bookkeeping.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use promptbook::database::{Database, KeyValueStore};
//!
//! let db = Arc::new(Database::open_in_memory().expect("failed to open in-memory database"));
//! let kv = KeyValueStore::new(db);
//! kv.set("promptbook.remote_connected", "true").expect("write failed");
//! ```

pub mod connection;
pub mod kv_store;
pub mod migrations;

pub use connection::Database;
pub use kv_store::KeyValueStore;
