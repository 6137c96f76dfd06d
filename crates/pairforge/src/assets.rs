//! Static file server for the browser client.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::PairforgeError;

/// Serves a directory of static files over HTTP.
pub struct AssetServer {
    listener: TcpListener,
    dir: PathBuf,
}

impl AssetServer {
    /// Binds the HTTP listener. Files are not read until requested.
    pub async fn bind(addr: &str, dir: impl AsRef<Path>) -> Result<Self, PairforgeError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(PairforgeError::Assets)?;
        Ok(Self {
            listener,
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, PairforgeError> {
        self.listener.local_addr().map_err(PairforgeError::Assets)
    }

    fn router(&self) -> Router {
        Router::new().fallback_service(ServeDir::new(&self.dir))
    }

    /// Serves requests until the listener fails.
    pub async fn run(self) -> Result<(), PairforgeError> {
        let router = self.router();
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, dir = %self.dir.display(), "asset server listening");
        }
        axum::serve(self.listener, router)
            .await
            .map_err(PairforgeError::Assets)
    }
}
