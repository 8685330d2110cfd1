//! Database utilities for connections and schema migrations.
//!
//! - [`connection::connect_sqlite`] opens a tuned SQLite connection (WAL,
//!   foreign_keys=ON, 5000ms busy_timeout).
//! - [`migrate::run_sqlite`] applies the embedded Diesel migrations that
//!   realize the store contract (tables, partial unique indexes, seed rows).

pub mod connection;
pub mod migrate;
