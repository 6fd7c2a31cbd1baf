use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use applique_bridge::tools::applique::build_registry;
use applique_bridge::{router, AppState, BackendClient, BridgeConfig, McpEngine, SessionRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = BridgeConfig::new();
    let backend = Arc::new(BackendClient::new(&config.backend_base_url));
    let registry = Arc::new(build_registry(backend));
    let engine = Arc::new(McpEngine::new(
        registry,
        config.server_name.clone(),
        config.server_version.clone(),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let state = Arc::new(AppState {
        engine,
        sessions: Arc::new(SessionRegistry::new()),
        config,
    });

    info!("MCP SSE bridge listening on {addr}");
    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .await?;

    Ok(())
}
