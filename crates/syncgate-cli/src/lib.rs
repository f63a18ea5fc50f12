//! # Syncgate Gateway
//!
//! HTTP gateway that lets client applications sync user data against an
//! S3-compatible store without ever holding storage credentials.
//!
//! This crate provides:
//! - **Storage API**: stat, list, delete and presigned upload/download URLs
//! - **Authentication**: shared secret or signed claims (JWT)
//! - **Rate Limiting**: Per-tenant request throttling
//! - **Change Feed**: server-sent events for changes under a prefix
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   HTTP Clients                      │
//! │        (desktop sync clients, curl, etc.)           │
//! └─────────────────────────┬───────────────────────────┘
//!                           │  JSON / SSE
//! ┌─────────────────────────▼───────────────────────────┐
//! │                  Syncgate Gateway                   │
//! ├─────────────────────────────────────────────────────┤
//! │  Auth Middleware │ Rate Limiter │ Request Id / Log  │
//! ├─────────────────────────────────────────────────────┤
//! │               Storage API Handlers                  │
//! ├─────────────────────────────────────────────────────┤
//! │                  syncgate-core                      │
//! │      (prefix isolation, objects, change feed)       │
//! ├─────────────────────────────────────────────────────┤
//! │                  syncgate-store                     │
//! │            (S3, in-memory, timeouts)                │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Presigned URLs move object bytes directly between the client and
//! storage; the gateway only handles metadata.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use auth::{AuthError, CredentialResolver};
pub use config::GatewayConfig;
pub use error::{ApiError, ErrorKind};
pub use server::{run_server, run_server_with_shutdown, serve};
pub use state::AppState;
