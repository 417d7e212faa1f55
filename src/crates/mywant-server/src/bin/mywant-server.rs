//! `mywant-server` binary: the standalone HTTP control plane process.

use mywant_server::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(rust_log).init();

    let config = ServerConfig::from_env()?;
    mywant_server::serve(config).await?;
    Ok(())
}
