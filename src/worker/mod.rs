//! Worker Bootstrap
//!
//! Pieces shared by both worker binaries: argument parsing, the persistent
//! worker id, the coordinator heartbeat and request logging.

pub mod config;
pub mod heartbeat;
pub mod http;
pub mod identity;

pub use config::WorkerConfig;
