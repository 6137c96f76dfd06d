//! `PairforgeServer` builder and server loop.
//!
//! This is the entry point for running a Pairforge matchmaking server. It
//! ties the layers together: transport → session → registry → room
//! endpoints.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use pairforge_protocol::{JsonCodec, PlayerId};
use pairforge_room::{IdAllocator, MatchmakingRegistry, RoomConfig};
use pairforge_transport::{TcpLineTransport, Transport, WebSocketTransport};

#[cfg(feature = "assets")]
use crate::assets::AssetServer;
use crate::PairforgeError;
use crate::config::{AssetsConfig, ServerConfig};
use crate::endpoint::RoomEndpoints;
use crate::service::{LobbyGreeter, RequestHandler, RoomGreeter};
use crate::session::{HandshakeLimits, handle_connection};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) registry: Arc<MatchmakingRegistry>,
    pub(crate) player_ids: IdAllocator<PlayerId>,
    pub(crate) endpoints: RoomEndpoints,
    pub(crate) lobby: Arc<dyn RequestHandler>,
    pub(crate) codec: JsonCodec,
    pub(crate) handshake: HandshakeLimits,
}

/// Builder for configuring and starting a Pairforge server.
///
/// # Example
///
/// ```rust,no_run
/// use pairforge::prelude::*;
///
/// # async fn run() -> Result<(), PairforgeError> {
/// let server = PairforgeServer::builder()
///     .bind("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct PairforgeServerBuilder {
    config: ServerConfig,
    lobby: Arc<dyn RequestHandler>,
    room: Arc<dyn RequestHandler>,
}

impl PairforgeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Creates a builder starting from a loaded configuration.
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            config,
            lobby: Arc::new(LobbyGreeter),
            room: Arc::new(RoomGreeter),
        }
    }

    /// Sets the address of the matchmaking listener.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the IP the per-room endpoints bind to.
    pub fn room_host(mut self, host: IpAddr) -> Self {
        self.config.room_host = host;
        self
    }

    pub fn room_capacity(mut self, capacity: usize) -> Self {
        self.config.room_capacity = capacity;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn max_handshake_lines(mut self, lines: usize) -> Self {
        self.config.max_handshake_lines = lines;
        self
    }

    /// Enables the static asset server.
    pub fn assets(mut self, assets: AssetsConfig) -> Self {
        self.config.assets = Some(assets);
        self
    }

    /// Replaces the handler answering lines on the matchmaking connection.
    pub fn lobby_handler(mut self, handler: impl RequestHandler) -> Self {
        self.lobby = Arc::new(handler);
        self
    }

    /// Replaces the handler answering lines on room endpoints.
    pub fn room_handler(mut self, handler: impl RequestHandler) -> Self {
        self.room = Arc::new(handler);
        self
    }

    /// Builds a server speaking newline-delimited TCP.
    pub async fn build(self) -> Result<PairforgeServer<TcpLineTransport>, PairforgeError> {
        self.config.validate()?;
        let transport = TcpLineTransport::bind(&self.config.bind_addr).await?;
        self.finish(transport).await
    }

    /// Builds a server speaking WebSocket, one frame per line.
    pub async fn build_websocket(
        self,
    ) -> Result<PairforgeServer<WebSocketTransport>, PairforgeError> {
        self.config.validate()?;
        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        self.finish(transport).await
    }

    async fn finish<T: Transport>(
        self,
        transport: T,
    ) -> Result<PairforgeServer<T>, PairforgeError> {
        #[cfg(feature = "assets")]
        let assets = match &self.config.assets {
            Some(cfg) => Some(AssetServer::bind(&cfg.bind_addr, &cfg.dir).await?),
            None => None,
        };
        #[cfg(not(feature = "assets"))]
        if self.config.assets.is_some() {
            tracing::warn!("asset server configured but the `assets` feature is disabled");
        }

        let codec = JsonCodec;
        let registry = Arc::new(MatchmakingRegistry::new(RoomConfig {
            capacity: self.config.room_capacity,
        }));
        let state = Arc::new(ServerState {
            registry,
            player_ids: IdAllocator::new(),
            endpoints: RoomEndpoints::new(self.config.room_host, self.room, codec),
            lobby: self.lobby,
            codec,
            handshake: HandshakeLimits {
                timeout: self.config.handshake_timeout,
                max_lines: self.config.max_handshake_lines,
            },
        });

        Ok(PairforgeServer {
            transport,
            state,
            #[cfg(feature = "assets")]
            assets,
        })
    }
}

impl Default for PairforgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Pairforge server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct PairforgeServer<T: Transport> {
    transport: T,
    state: Arc<ServerState>,
    #[cfg(feature = "assets")]
    assets: Option<AssetServer>,
}

impl PairforgeServer<TcpLineTransport> {
    /// Creates a new builder.
    pub fn builder() -> PairforgeServerBuilder {
        PairforgeServerBuilder::new()
    }
}

impl<T: Transport> PairforgeServer<T> {
    /// Returns the local address of the matchmaking listener.
    pub fn local_addr(&self) -> Result<SocketAddr, PairforgeError> {
        Ok(self.transport.local_addr()?)
    }

    /// Returns the asset server's address, if it is enabled.
    #[cfg(feature = "assets")]
    pub fn assets_addr(&self) -> Option<SocketAddr> {
        self.assets.as_ref().and_then(|a| a.local_addr().ok())
    }

    /// The registry every connection registers with.
    pub fn registry(&self) -> Arc<MatchmakingRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the server accept loop.
    ///
    /// Spawns the asset server if configured, then accepts matchmaking
    /// connections and spawns a session task for each. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), PairforgeError> {
        #[cfg(feature = "assets")]
        if let Some(assets) = self.assets.take() {
            tokio::spawn(async move {
                if let Err(e) = assets.run().await {
                    tracing::error!(error = %e, "asset server stopped");
                }
            });
        }

        if let Ok(addr) = self.transport.local_addr() {
            tracing::info!(%addr, "Pairforge server running");
        }

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
