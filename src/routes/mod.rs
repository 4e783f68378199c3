use axum::Router;

use crate::state::SharedState;

/// Moderation routes under `/admin`.
pub mod admin;
/// Account routes and the bearer extractor.
pub mod auth;
/// Chat history, posting and the WebSocket.
pub mod chat;
/// Swagger UI and the OpenAPI document.
pub mod docs;
/// Game hosting routes.
pub mod games;
/// Health check route.
pub mod health;
/// Notification inbox and SSE stream.
pub mod notifications;
/// Report filing routes.
pub mod reports;
/// Profile routes.
pub mod users;

/// Compose all route trees, wiring in shared state and documentation routes.
///
/// Handlers that need a caller take a `CurrentUser` argument, which rejects
/// requests without a valid bearer token. The admin subtree additionally
/// requires the admin role.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(auth::router())
        .merge(users::router())
        .merge(games::router())
        .merge(chat::router())
        .merge(reports::router())
        .merge(notifications::router())
        .merge(admin::router(state.clone()));

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
