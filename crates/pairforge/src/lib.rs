//! # Pairforge
//!
//! Two-player matchmaking server.
//!
//! Clients connect, send a short handshake, and are placed into the first
//! room with a free slot (a new room is opened when none has one). Each
//! room gets its own endpoint, and a room is deleted as soon as its last
//! member disconnects.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pairforge::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), PairforgeError> {
//!     let server = PairforgeServer::builder()
//!         .bind("127.0.0.1:8080")
//!         .build()
//!         .await?;
//!     server.run().await
//! }
//! ```
//!
//! A client session over TCP looks like this:
//!
//! ```text
//! > hello
//! >
//! < {"type":"Matched","player_id":0,"room_id":0,"room_addr":"127.0.0.1:40211","created":true,"capacity":2}
//! > ping
//! < {"type":"Reply","body":"hello P-0, you are in room R-0 (1/2)"}
//! ```

#[cfg(feature = "assets")]
pub mod assets;
pub mod config;
mod endpoint;
mod error;
pub mod logging;
mod server;
pub mod service;
mod session;

pub use error::PairforgeError;
pub use server::{PairforgeServer, PairforgeServerBuilder};

/// Common imports for building a Pairforge server.
pub mod prelude {
    pub use crate::PairforgeError;
    pub use crate::config::{AssetsConfig, ConfigError, ServerConfig, TransportKind};
    pub use crate::server::{PairforgeServer, PairforgeServerBuilder};
    pub use crate::service::{
        Endpoint, LobbyGreeter, Request, RequestHandler, Response, RoomGreeter,
    };
    pub use pairforge_protocol::{PlayerId, RoomId, ServerMessage};
    pub use pairforge_room::{MatchmakingRegistry, RoomInfo};
}
