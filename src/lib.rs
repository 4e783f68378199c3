//! Library crate for gameon-back, exposing modules for binaries and integration tests.

/// Runtime configuration loaded from JSON.
pub mod config;
/// Storage models and backends.
pub mod dao;
/// Wire types for the REST, WebSocket and SSE surfaces.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum routers and handlers.
pub mod routes;
/// Business logic behind the routes.
pub mod services;
/// In-process state: store handle, sessions, gates and live hubs.
pub mod state;
