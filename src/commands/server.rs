//! Start the coordination server.
use anyhow::Result;
use axum_server::Handle;
use roast_server::{CoordinatorServer, ServerConfig};
use std::{net::SocketAddr, path::PathBuf, str::FromStr};

/// Run the web server.
pub async fn run(
    session_ttl: Option<u64>,
    challenge_ttl: Option<u64>,
    bind: String,
    config: PathBuf,
) -> Result<()> {
    let mut config = ServerConfig::load(&config).await?;

    if let Some(session_ttl) = session_ttl {
        config.session_ttl = session_ttl;
    }

    if let Some(challenge_ttl) = challenge_ttl {
        config.challenge_ttl = challenge_ttl;
    }

    let handle = Handle::new();
    let addr = SocketAddr::from_str(&bind)?;
    let server = CoordinatorServer::new(config);
    server.start(addr, handle).await?;
    Ok(())
}
