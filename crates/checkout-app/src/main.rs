use checkout_core::config::Config;
use checkout_sandbox::http::{SandboxServer, SandboxServerConfig};
use checkout_sandbox::InMemoryCommerce;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for SERVER_PORT / CALL_TIMEOUT_MS when present.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
        .init();

    let config = Config::from_env()?;
    tracing::debug!(?config, "configuration loaded");

    let server = SandboxServer::new(
        InMemoryCommerce::new(),
        SandboxServerConfig {
            port: config.server_port.clone(),
        },
    );
    server.run().await
}
