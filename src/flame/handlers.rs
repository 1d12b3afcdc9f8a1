use axum::{
    Json, Router,
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use std::sync::Arc;

use super::executor::{OperatorExecutor, PartitionTask};
use super::lambda::{LambdaRef, Operator};
use super::package::PackageStore;
use super::protocol::*;
use super::registry::ClosureRegistry;
use super::types::Operation;
use crate::error::{FlameError, FlameResult};
use crate::kvs::KvsClient;

/// Shared state of a Flame worker.
pub struct FlameState {
    pub registry: Arc<ClosureRegistry>,
    pub packages: Arc<PackageStore>,
    /// Connection pool reused by every storage client the worker creates.
    pub http_client: reqwest::Client,
}

impl FlameState {
    pub fn new(registry: Arc<ClosureRegistry>, packages: Arc<PackageStore>) -> Self {
        Self {
            registry,
            packages,
            http_client: reqwest::Client::new(),
        }
    }
}

/// Operator request surface: one route per operation plus the package upload.
pub fn router(state: Arc<FlameState>) -> Router {
    let mut router = Router::new().route(ENDPOINT_USE_PACKAGE, post(handle_use_package));

    for operation in Operation::ALL {
        router = router.route(
            operation.path(),
            post(
                move |Extension(state): Extension<Arc<FlameState>>,
                      Json(req): Json<OperationRequest>| async move {
                    handle_operation(operation, state, req).await
                },
            ),
        );
    }

    router.layer(Extension(state))
}

fn error_response(operation: Option<Operation>, e: FlameError) -> Response {
    let status = e.status();
    if status.is_server_error() {
        tracing::error!("{:?} failed: {}", operation, e);
    } else {
        tracing::debug!("{:?} rejected ({}): {}", operation, status, e);
    }
    (status, e.to_string()).into_response()
}

fn required(field: Option<String>, name: &str) -> FlameResult<String> {
    field
        .filter(|v| !v.is_empty())
        .ok_or_else(|| FlameError::BadRequest(format!("missing {}", name)))
}

/// Validates a request and binds its closure. Touches no table data.
pub async fn prepare(
    state: &FlameState,
    operation: Operation,
    req: OperationRequest,
) -> FlameResult<(String, PartitionTask, Operator)> {
    let coordinator = required(req.coordinator, "coordinator")?;
    let input_table = required(req.input_table, "input table")?;
    let output_table = required(req.output_table, "output table")?;

    let lambda = match &req.lambda {
        Some(reference @ LambdaRef::Named { .. }) => {
            let package = state.packages.current().await?;
            Some(state.registry.materialize(reference, &package.closures)?)
        }
        Some(reference) => Some(state.registry.materialize(reference, &[])?),
        None => None,
    };

    let operator = Operator::bind(operation, lambda, req.zero)?;
    let task = PartitionTask {
        input_table,
        output_table,
        from_key: req.from_key,
        to_key_exclusive: req.to_key_exclusive,
    };
    Ok((coordinator, task, operator))
}

pub async fn handle_operation(
    operation: Operation,
    state: Arc<FlameState>,
    req: OperationRequest,
) -> Response {
    let (coordinator, task, operator) = match prepare(&state, operation, req).await {
        Ok(prepared) => prepared,
        Err(e) => return error_response(Some(operation), e),
    };

    let kvs = KvsClient::with_http_client(&coordinator, state.http_client.clone());
    let executor = OperatorExecutor::new(kvs);

    match executor.run(&task, &operator).await {
        Ok(result) => {
            tracing::info!(
                "{:?} done: {} -> {}",
                operation,
                task.input_table,
                task.output_table
            );
            match operation {
                Operation::Fold => (StatusCode::OK, result.unwrap_or_default()).into_response(),
                _ => (StatusCode::OK, RESPONSE_OK).into_response(),
            }
        }
        Err(e) => error_response(Some(operation), e),
    }
}

pub async fn handle_use_package(
    Extension(state): Extension<Arc<FlameState>>,
    body: Bytes,
) -> Response {
    match state.packages.install(&body).await {
        Ok(package) => {
            let missing: Vec<&String> = package
                .closures
                .iter()
                .filter(|name| !state.registry.has_closure(name))
                .collect();
            if !missing.is_empty() {
                tracing::warn!(
                    "Package '{}' names closures this worker does not provide: {:?}",
                    package.job,
                    missing
                );
            }
            (StatusCode::OK, RESPONSE_OK).into_response()
        }
        Err(e) => error_response(None, e),
    }
}
