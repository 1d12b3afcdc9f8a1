use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Extension, Path, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use std::convert::Infallible;
use std::sync::Arc;

use super::protocol::*;
use super::row::{Row, write_stream_record};
use super::store::{Datastore, PutOutcome};
use crate::error::KvsError;

/// Storage request surface of one shard.
pub fn router(store: Arc<Datastore>) -> Router {
    Router::new()
        .route(ENDPOINT_TABLES, get(handle_list_tables))
        .route(ENDPOINT_VIEW, get(handle_view_table))
        .route(ENDPOINT_TABLE_DATA, get(handle_stream_rows))
        .route(ENDPOINT_ROW, get(handle_get_row).put(handle_put_row))
        .route(ENDPOINT_CELL, get(handle_get_cell).put(handle_put_cell))
        .route(ENDPOINT_DELETE, put(handle_delete_table))
        .route(ENDPOINT_RENAME, put(handle_rename_table))
        .route(ENDPOINT_COUNT, get(handle_count))
        .layer(Extension(store))
}

fn error_response(e: KvsError) -> Response {
    let status = e.status();
    if status.is_server_error() {
        tracing::error!("Storage request failed: {}", e);
    } else {
        tracing::debug!("Storage request rejected ({}): {}", status, e);
    }
    (status, e.to_string()).into_response()
}

fn versioned(status: StatusCode, version: u64, body: impl IntoResponse) -> Response {
    (status, [(VERSION_HEADER, version.to_string())], body).into_response()
}

pub async fn handle_list_tables(Extension(store): Extension<Arc<Datastore>>) -> Json<TablesResponse> {
    let tables = store
        .tables()
        .into_iter()
        .map(|(name, rows)| TableSummary { name, rows })
        .collect();
    Json(TablesResponse { tables })
}

pub async fn handle_view_table(
    Extension(store): Extension<Arc<Datastore>>,
    Path(table): Path<String>,
    Query(params): Query<ViewParams>,
) -> Response {
    match store.page(&table, params.from_row.as_deref(), PAGE_SIZE) {
        Ok((rows, next)) => {
            let rows = rows
                .iter()
                .map(|row| RowView {
                    key: row.key().to_string(),
                    columns: row.values().map(|(c, v)| (c.to_string(), v)).collect(),
                })
                .collect();
            Json(PageResponse { table, rows, next }).into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn handle_stream_rows(
    Extension(store): Extension<Arc<Datastore>>,
    Path(table): Path<String>,
    Query(params): Query<StreamParams>,
) -> Response {
    let scan = match store.scan(
        &table,
        params.start_row.as_deref(),
        params.end_row_exclusive.as_deref(),
    ) {
        Ok(scan) => scan,
        Err(e) => return error_response(e),
    };

    let records = scan
        .map(|row| {
            let mut record = Vec::new();
            write_stream_record(&row, &mut record);
            Ok::<_, Infallible>(record)
        })
        .chain(std::iter::once(Ok(vec![b'\n'])));

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain")],
        Body::from_stream(futures::stream::iter(records)),
    )
        .into_response()
}

pub async fn handle_get_row(
    Extension(store): Extension<Arc<Datastore>>,
    Path((table, row)): Path<(String, String)>,
) -> Response {
    match store.get_row(&table, &row, None) {
        Ok((snapshot, version)) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE.as_str(), "application/octet-stream".to_string()),
                (VERSION_HEADER, version.to_string()),
            ],
            snapshot.to_bytes(),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_put_row(
    Extension(store): Extension<Arc<Datastore>>,
    Path((table, row)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let decoded = match Row::from_bytes(&body) {
        Ok(decoded) => decoded,
        Err(e) => return error_response(KvsError::BadRequest(e.to_string())),
    };
    if decoded.key() != row {
        return error_response(KvsError::BadRequest(format!(
            "row key '{}' does not match path '{}'",
            decoded.key(),
            row
        )));
    }

    match store.put_row(&table, &decoded) {
        Ok(version) => versioned(StatusCode::OK, version, "OK"),
        Err(e) => error_response(e),
    }
}

pub async fn handle_put_cell(
    Extension(store): Extension<Arc<Datastore>>,
    Path((table, row, column)): Path<(String, String, String)>,
    Query(params): Query<CellWriteParams>,
    body: Bytes,
) -> Response {
    let outcome = match (&params.ifcolumn, &params.equals, &params.append) {
        (Some(if_column), Some(expected), _) => store.conditional_put(
            &table,
            &row,
            &column,
            &body,
            if_column,
            expected.as_bytes(),
        ),
        (_, _, Some(delimiter)) => store
            .append(&table, &row, &column, &body, delimiter)
            .map(PutOutcome::Written),
        _ => store
            .put(&table, &row, &column, &body)
            .map(PutOutcome::Written),
    };

    match outcome {
        Ok(PutOutcome::Written(version)) => versioned(StatusCode::OK, version, "OK"),
        Ok(PutOutcome::PreconditionFailed) => {
            tracing::debug!("Precondition failed for {}/{}/{}", table, row, column);
            (StatusCode::PRECONDITION_FAILED, "FAIL").into_response()
        }
        Err(e) => error_response(e),
    }
}

pub async fn handle_get_cell(
    Extension(store): Extension<Arc<Datastore>>,
    Path((table, row, column)): Path<(String, String, String)>,
    Query(params): Query<CellReadParams>,
) -> Response {
    let version = match params.version.as_deref().map(str::parse::<u64>) {
        None => None,
        Some(Ok(v)) => Some(v),
        Some(Err(e)) => {
            tracing::error!("Failed to parse version: {}", e);
            return error_response(KvsError::BadRequest(format!("invalid version: {}", e)));
        }
    };

    match store.get(&table, &row, &column, version) {
        Ok((value, read_version)) => versioned(StatusCode::OK, read_version, value),
        Err(e) => error_response(e),
    }
}

pub async fn handle_delete_table(
    Extension(store): Extension<Arc<Datastore>>,
    Path(table): Path<String>,
) -> Response {
    match store.delete(&table) {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_rename_table(
    Extension(store): Extension<Arc<Datastore>>,
    Path(table): Path<String>,
    new_name: String,
) -> Response {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return error_response(KvsError::BadRequest("missing new table name".to_string()));
    }

    match store.rename(&table, new_name) {
        Ok(()) => (StatusCode::OK, "OK").into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn handle_count(
    Extension(store): Extension<Arc<Datastore>>,
    Path(table): Path<String>,
) -> Response {
    match store.count(&table) {
        Ok(count) => (StatusCode::OK, count.to_string()).into_response(),
        Err(e) => error_response(e),
    }
}
