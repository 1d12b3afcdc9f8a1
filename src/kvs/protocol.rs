//! Storage Network Protocol
//!
//! Route patterns, query parameter names and JSON DTOs of the storage
//! request surface. Cell values and rows travel as raw bytes; only listings
//! and pages are JSON.

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Lists tables with their row counts.
pub const ENDPOINT_TABLES: &str = "/";
/// Paginated view of a table.
pub const ENDPOINT_VIEW: &str = "/view/:table";
/// Row stream of a table, optionally bounded by `startRow`/`endRowExclusive`.
pub const ENDPOINT_TABLE_DATA: &str = "/data/:table";
/// Whole-row read (GET) and upsert (PUT).
pub const ENDPOINT_ROW: &str = "/data/:table/:row";
/// Cell read (GET) and write (PUT).
pub const ENDPOINT_CELL: &str = "/data/:table/:row/:column";
pub const ENDPOINT_DELETE: &str = "/delete/:table";
pub const ENDPOINT_RENAME: &str = "/rename/:table";
pub const ENDPOINT_COUNT: &str = "/count/:table";

/// Response header carrying the row version written or read.
pub const VERSION_HEADER: &str = "Version";

/// Rows per page in `/view`.
pub const PAGE_SIZE: usize = 10;

// --- Query parameters ---

#[derive(Debug, Default, Deserialize)]
pub struct CellWriteParams {
    /// Conditional write: column to compare.
    pub ifcolumn: Option<String>,
    /// Conditional write: expected current value of `ifcolumn`.
    pub equals: Option<String>,
    /// Append to the existing value using this delimiter.
    pub append: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CellReadParams {
    pub version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamParams {
    pub start_row: Option<String>,
    pub end_row_exclusive: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewParams {
    pub from_row: Option<String>,
}

// --- Data Transfer Objects ---

#[derive(Debug, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TablesResponse {
    pub tables: Vec<TableSummary>,
}

/// One row of a `/view` page with values rendered as text.
#[derive(Debug, Serialize, Deserialize)]
pub struct RowView {
    pub key: String,
    pub columns: Vec<(String, String)>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PageResponse {
    pub table: String,
    pub rows: Vec<RowView>,
    /// Key to pass as `fromRow` for the next page.
    pub next: Option<String>,
}
