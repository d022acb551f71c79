//! Database module: models, schema and queries for persistent storage.
//!
//! Layout:
//! - `models.rs`: Rust structs mirroring DB rows and conversions
//! - `schema.rs`: SQL DDL for initializing the database (SQLite-first)
//! - `sqlite.rs`: the shared pool handle; `creators.rs`, `connections.rs` and
//!   `content.rs` hold its queries per table

pub mod connections;
pub mod content;
pub mod creators;
pub mod models;
pub mod schema;
pub mod sqlite;

pub use creators::LeaderboardFilter;
pub use models::{
    Content, ContentMetrics, ContentType, Creator, DbConnection, MetricsSnapshot, NewConnection,
    NewContent, ValidationStatus,
};
pub use schema::SQLITE_INIT;
pub use sqlite::{BoardStorage, SqlitePool, connect};
