//! PostgreSQL-backed snapshot store.

pub mod pg_snapshot_store;

/// Migrations for the `snapshots` table.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");
