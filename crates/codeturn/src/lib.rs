//! # Codeturn
//!
//! Server for a real-time, turn-based collaborative coding game. Players
//! share one code buffer, take timed turns editing it, and submit it to be
//! run against a hidden test case from the current level.
//!
//! This crate wires the layers together: a WebSocket transport, the JSON
//! wire protocol, named rooms each driven by a session actor, and the
//! Python evaluator.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codeturn::prelude::*;
//!
//! # async fn start() -> Result<(), CodeturnError> {
//! let config = ServerConfig::load()?;
//! let evaluator = PythonEvaluator::new(config.eval.eval_config());
//! let server = CodeturnServer::builder()
//!     .config(config)
//!     .build(evaluator)
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::CodeturnError;
pub use server::{CodeturnServer, CodeturnServerBuilder};

/// The types most servers need.
pub mod prelude {
    pub use crate::{CodeturnError, CodeturnServer, CodeturnServerBuilder, ServerConfig};
    pub use codeturn_eval::{Evaluator, PythonEvaluator, Submission, Verdict};
    pub use codeturn_protocol::{ClientEvent, PlayerId, ServerEvent};
    pub use codeturn_room::{LevelCatalog, RoomConfig};
}
