use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Logs every request on entry and completion.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();
    tracing::debug!("--> {} {}", method, uri);

    let response = next.run(req).await;

    tracing::debug!(
        "<-- {} {} {} ({} ms)",
        method,
        uri,
        response.status(),
        started.elapsed().as_millis()
    );
    response
}
