//! # huddle-server
//!
//! Real-time study-group chat over WebSocket.
//!
//! - [`auth`]: JWT credential verifier (token from the `token` query parameter)
//! - [`websocket::broker`]: per-group fan-out registry
//! - [`websocket::session`]: admission and persist-then-broadcast state machine
//! - [`websocket::handler`]: axum upgrade and socket pump
//! - [`routes`]: history replay, health, and metrics endpoints
//! - [`server::HuddleServer`]: router assembly, listener, graceful shutdown

#![deny(unsafe_code)]

pub mod auth;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use auth::{CredentialVerifier, JwtVerifier, issue_token};
pub use errors::{ApiError, ServerError};
pub use server::{AppState, HuddleServer};
pub use websocket::broker::Broker;
pub use websocket::session::{ChatContext, ChatSession};
