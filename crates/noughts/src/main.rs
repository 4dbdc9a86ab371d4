use noughts::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), NoughtsError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        idle_timeout = ?config.idle_timeout,
        unclaimed_ttl = ?config.unclaimed_ttl,
        "starting noughts server"
    );

    let server = NoughtsServer::builder().config(config).build().await?;
    server.run().await
}
