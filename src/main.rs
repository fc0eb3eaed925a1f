use axum::Router;
use dotenv::dotenv;
use noteboard::config::Config;
use noteboard::gateway::axum::AxumGateway;
use noteboard::upload::FsBlobStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("noteboard=info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(addr = %config.bind_addr, moderated = config.moderated_intake, "starting noteboard");

    let blobs = Arc::new(FsBlobStore::new(
        config.upload_dir.clone(),
        config.max_upload_bytes,
    ));
    let gateway = AxumGateway::new(blobs, config.moderated_intake);
    let app = gateway.attach_router("/ws", Router::new());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await
}
