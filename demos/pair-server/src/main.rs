//! Standalone matchmaking server.
//!
//! Configured from `PAIRFORGE_*` environment variables; log verbosity
//! follows `RUST_LOG`. Try it with two terminals running `nc 127.0.0.1 8080`
//! and an empty line to finish each handshake.

use pairforge::logging;
use pairforge::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init("info")?;

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        transport = ?config.transport,
        capacity = config.room_capacity,
        "starting pair server"
    );

    let builder = PairforgeServerBuilder::from_config(config.clone());
    match config.transport {
        TransportKind::Tcp => builder.build().await?.run().await?,
        TransportKind::WebSocket => builder.build_websocket().await?.run().await?,
    }
    Ok(())
}
