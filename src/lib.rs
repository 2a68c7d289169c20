//! chatrelay - chat relay daemon
//!
//! Relays user chat messages to an LLM completion API, turns image requests
//! into generated images hosted on a file-transfer server, and keeps a
//! per-user conversation history as context.

pub mod api;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod images;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use api::AppState;
use completion::CompletionClient;
use conversation::{MemoryStore, UserLocks};
use images::{FtpUploader, ImageClient, ImageUploader};

pub use config::Config;

/// The chatrelay server instance
pub struct Server {
    config: Config,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a server that uploads images over FTP
    pub fn new(config: Config) -> Result<Self> {
        let uploader = Arc::new(FtpUploader::new(&config));
        Self::with_uploader(config, uploader)
    }

    /// Create a server with a custom image destination
    pub fn with_uploader(config: Config, uploader: Arc<dyn ImageUploader>) -> Result<Self> {
        let state = AppState {
            conversations: Arc::new(MemoryStore::new(config.system_prompt.clone())),
            locks: Arc::new(UserLocks::new()),
            completion: Arc::new(CompletionClient::new(&config)?),
            images: Arc::new(ImageClient::new(&config, uploader)?),
        };
        Ok(Self::with_state(config, state))
    }

    /// Create a server around prebuilt application state
    pub fn with_state(config: Config, state: AppState) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            state,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Get the shared application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router
    fn router(&self) -> Router {
        api::router(self.state.clone(), &self.config.allowed_origins)
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("chatrelay listening on {}", local_addr);

        if !self.state.completion.is_configured() {
            info!("Completion API key not set; chat requests will fail");
        }
        if !self.state.images.is_configured() {
            info!("Image API key not set; image requests will fail");
        }

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("chatrelay shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
