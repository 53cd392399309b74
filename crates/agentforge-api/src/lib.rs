//! AgentForge API
//!
//! HTTP surface over [`agentforge_core`]: the four stateless actions plus
//! session-scoped forging, chat and scope testing. The `agentforge` binary
//! serves this router and also exposes the actions from the command line.
//!
//! ## Example
//!
//! ```rust,no_run
//! use agentforge_api::handler::{create_router, AppState};
//! use agentforge_core::ForgeConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ForgeConfig::load(None)?;
//!     let state = Arc::new(AppState::from_config(&config)?);
//!
//!     let listener = tokio::net::TcpListener::bind(config.server.bind_address()).await?;
//!     axum::serve(listener, create_router(state)).await?;
//!     Ok(())
//! }
//! ```

pub mod handler;

pub use handler::{create_router, ApiError, AppState, SessionStore};
