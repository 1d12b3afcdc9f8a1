//! Network Protocol Definitions
//!
//! Operator requests are `POST`ed as JSON to the operator's path (see
//! `Operation::path`). Every field is optional on the wire so that missing
//! parameters are reported as validation failures rather than decode errors.

use super::lambda::LambdaRef;
use serde::{Deserialize, Serialize};

pub const ENDPOINT_USE_PACKAGE: &str = "/usePackage";

pub const RESPONSE_OK: &str = "OK";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationRequest {
    /// `ip:port` of the storage coordinator.
    pub coordinator: Option<String>,
    pub input_table: Option<String>,
    pub output_table: Option<String>,
    /// `None` scans from the first key.
    pub from_key: Option<String>,
    /// `None` scans to the last key.
    pub to_key_exclusive: Option<String>,
    pub lambda: Option<LambdaRef>,
    /// Zero element of `fold` and `foldByKey`.
    pub zero: Option<String>,
}
