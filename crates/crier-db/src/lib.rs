//! Database layer for the crier bot.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. The speech queue table that makes queued
//! requests survive restarts is created through versioned migrations managed
//! here.
//!
//! # Design decisions
//!
//! - **SQLite with WAL mode**: the bot is a single process; no external
//!   database server is warranted. WAL allows concurrent readers with a
//!   single writer, which matches the per-channel access pattern.
//! - **`r2d2` connection pool**: bounded connection reuse without manual
//!   lifetime management; sessions borrow a connection only for the duration
//!   of a status write.
//! - **Embedded migrations**: SQL files are compiled into the binary via
//!   `include_str!` so the schema ships with the code that depends on it.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbSettings, PoolError};
