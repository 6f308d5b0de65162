//! SQLite persistence store.
//!
//! The store owns every durable row (jobs, media, events, queue entries,
//! users, sessions). Writes go through a single-connection writer pool;
//! reads run on a separate pool against the WAL file, so readers never
//! block behind the writer.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::Store;
