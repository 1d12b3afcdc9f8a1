//! Flame Cluster Library
//!
//! A sharded, versioned key-value store and the dataflow operators that run
//! on top of it. The two worker binaries (`flame_cluster` for storage,
//! `flame_worker` for operators) are thin wrappers around these modules.
//!
//! ## Architecture Modules
//!
//! - **`kvs`**: one storage shard. Tables of rows with per-row version
//!   history, conditional writes, ordered range scans, `pt-` persistence,
//!   the storage HTTP surface, and the `Kvs` trait with local and HTTP
//!   implementations.
//! - **`flame`**: the operator executor. Scans a partition, applies a
//!   registered closure, writes the results back through `Kvs`.
//! - **`worker`**: bootstrap shared by both binaries (configuration, worker
//!   identity, coordinator heartbeat, request logging).
//! - **`error`**: error types and their HTTP status mapping.

pub mod error;
pub mod flame;
pub mod kvs;
pub mod worker;
