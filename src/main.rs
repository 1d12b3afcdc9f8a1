use axum::middleware;
use flame_cluster::kvs::Datastore;
use flame_cluster::kvs::handlers::router;
use flame_cluster::worker::heartbeat::spawn_heartbeat;
use flame_cluster::worker::http::log_requests;
use flame_cluster::worker::{WorkerConfig, identity};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_args(true);

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    let Some(dir) = config.dir.clone() else {
        anyhow::bail!("--dir is required");
    };

    // 1. Identity:
    let id = identity::load_or_create(&dir)?;
    tracing::info!("Starting KVS worker {} on port {}", id, config.port);

    // 2. Storage engine (replays pt- tables):
    let store = Arc::new(Datastore::open(&dir)?);
    tracing::info!(
        "Storage directory {} ({} persistent tables)",
        dir.display(),
        store.tables().len()
    );

    // 3. Heartbeat:
    let _heartbeat = spawn_heartbeat(
        reqwest::Client::new(),
        config.coordinator.clone(),
        id,
        config.port,
        config.heartbeat,
    );

    // 4. HTTP server:
    let app = router(store).layer(middleware::from_fn(log_requests));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
