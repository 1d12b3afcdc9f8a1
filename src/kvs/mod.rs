//! Key-Value Store Module
//!
//! One shard of the sharded, versioned store.
//!
//! ## Core Concepts
//! - **Rows**: a string key plus a column → bytes map, encoded with a self-describing codec.
//! - **Versions**: every successful cell write bumps the row's version by one; history is retained
//!   so any past version stays readable.
//! - **Conditional writes**: check-and-write is atomic per row.
//! - **Persistence**: `pt-` tables are backed by an append-only snapshot log.
//! - **Access**: the `Kvs` trait is implemented by `LocalKvs` (in-process) and `KvsClient` (HTTP).

pub mod api;
pub mod client;
pub mod handlers;
pub mod protocol;
pub mod replication;
pub mod row;
pub mod store;

pub use api::{Kvs, LocalKvs, RowIter};
pub use client::KvsClient;
pub use row::Row;
pub use store::{Datastore, PutOutcome};

#[cfg(test)]
mod tests;
