/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
/// Persistence backends for users, games, reports, notifications and messages.
pub mod store;
