//! Flame Operator Module
//!
//! Runs one dataflow operator over one partition of a table per request.
//!
//! ## Submodules
//! - **`types`**: the operator catalog, pairs and output-key hashing.
//! - **`lambda`**: closure signatures and the typed `Operator` they bind into.
//! - **`registry`**: name → closure lookup for the closures a worker provides.
//! - **`package`**: the per-job code package naming the closures a job may use.
//! - **`executor`**: the scan → closure → write loop behind every operator.
//! - **`handlers`** / **`protocol`**: the HTTP surface.
//! - **`builtins`**: closures shipped with the stock worker binary.

pub mod builtins;
pub mod executor;
pub mod handlers;
pub mod lambda;
pub mod package;
pub mod protocol;
pub mod registry;
pub mod types;

pub use executor::{OperatorExecutor, PartitionTask};
pub use lambda::{Lambda, LambdaKind, LambdaRef, Operator};
pub use package::{CodePackage, PackageStore};
pub use registry::ClosureRegistry;
pub use types::{COLUMN_NAME, Operation, Pair};
