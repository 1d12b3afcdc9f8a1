use axum::middleware;
use flame_cluster::flame::builtins::register_builtins;
use flame_cluster::flame::handlers::{FlameState, router};
use flame_cluster::flame::{ClosureRegistry, PackageStore};
use flame_cluster::worker::WorkerConfig;
use flame_cluster::worker::heartbeat::spawn_heartbeat;
use flame_cluster::worker::http::log_requests;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerConfig::from_args(false);

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    // Flame workers are identified by their port.
    let id = config.port.to_string();
    tracing::info!("Starting Flame worker on port {}", config.port);

    // 1. Closures and the package cache:
    let registry = ClosureRegistry::new();
    register_builtins(&registry);
    tracing::info!("Closures available: {:?}", registry.list_closures());

    let package_dir = config.dir.clone().unwrap_or_else(|| Path::new(".").to_path_buf());
    let packages = Arc::new(PackageStore::for_port(&package_dir, config.port));
    let state = Arc::new(FlameState::new(registry, packages));

    // 2. Heartbeat:
    let _heartbeat = spawn_heartbeat(
        state.http_client.clone(),
        config.coordinator.clone(),
        id,
        config.port,
        config.heartbeat,
    );

    // 3. HTTP server:
    let app = router(state).layer(middleware::from_fn(log_requests));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
