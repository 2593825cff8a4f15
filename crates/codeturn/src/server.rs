//! `CodeturnServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → room manager → room
//! actors. Each accepted connection gets its own handler task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use codeturn_eval::Evaluator;
use codeturn_protocol::{Codec, JsonCodec};
use codeturn_room::{LevelCatalog, RoomManager};
use codeturn_transport::{Transport, WebSocketTransport};
use tokio::sync::Mutex;

use crate::CodeturnError;
use crate::config::ServerConfig;
use crate::handler::handle_connection;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<E: Evaluator, C: Codec> {
    pub(crate) rooms: Mutex<RoomManager<E>>,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Codeturn server.
///
/// # Example
///
/// ```rust,ignore
/// use codeturn::prelude::*;
///
/// let config = ServerConfig::load()?;
/// let evaluator = PythonEvaluator::new(config.eval.eval_config());
/// let server = CodeturnServer::builder()
///     .config(config)
///     .build(evaluator)
///     .await?;
/// server.run().await
/// ```
pub struct CodeturnServerBuilder {
    config: ServerConfig,
    catalog: Option<LevelCatalog>,
}

impl CodeturnServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            catalog: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.listen_addr = addr.to_string();
        self
    }

    /// Uses an already loaded catalog instead of reading `levels_path`.
    pub fn catalog(mut self, catalog: LevelCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Loads the level catalog (unless one was supplied), binds the
    /// listener, and returns a server ready to [`run`](CodeturnServer::run).
    ///
    /// # Errors
    /// A missing or malformed catalog, or a failed bind.
    pub async fn build<E: Evaluator>(
        self,
        evaluator: E,
    ) -> Result<CodeturnServer<E, JsonCodec>, CodeturnError> {
        let config = self.config;
        let catalog = match self.catalog {
            Some(catalog) => catalog,
            None => LevelCatalog::load(&config.levels_path)?,
        };
        tracing::info!(levels = catalog.len(), "level catalog ready");

        let transport = WebSocketTransport::bind(&config.listen_addr)
            .await?
            .with_max_frame_bytes(config.max_frame_bytes);

        let mut rooms = RoomManager::new(
            config.room.clone(),
            Arc::new(catalog),
            Arc::new(evaluator),
            config.eval.score_rules(),
        )
        .with_max_rooms(config.max_rooms)
        .with_empty_room_grace(config.empty_room_grace());
        if let Some(name) = config.default_room() {
            rooms = rooms.with_default_room(name);
        }

        let state = Arc::new(ServerState {
            rooms: Mutex::new(rooms),
            codec: JsonCodec,
            idle_timeout: config.idle_timeout(),
        });

        Ok(CodeturnServer { transport, state })
    }
}

impl Default for CodeturnServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Codeturn server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct CodeturnServer<E: Evaluator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<E, C>>,
}

impl CodeturnServer<codeturn_eval::PythonEvaluator, JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> CodeturnServerBuilder {
        CodeturnServerBuilder::new()
    }
}

impl<E: Evaluator, C: Codec> CodeturnServer<E, C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), CodeturnError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` resolves, then stops every
    /// room. Players still connected are sent a close frame.
    pub async fn run_until(
        mut self,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), CodeturnError> {
        tracing::info!(addr = ?self.local_addr().ok(), "codeturn server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("shutting down");
        self.state.rooms.lock().await.shutdown_all().await;
        Ok(())
    }
}
