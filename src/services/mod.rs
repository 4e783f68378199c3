/// Moderation operations: accounts, games and dashboard counters.
pub mod admin_service;
/// Accounts, password hashing and session-backed authentication.
pub mod auth_service;
/// Per-game chat over REST and WebSocket.
pub mod chat_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Game scheduling, roster and lifecycle operations.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Notification inbox and live feed.
pub mod notification_service;
/// Reports filed by users and their moderation.
pub mod report_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Profile management and account deletion.
pub mod user_service;
