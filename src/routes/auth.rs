use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    routing::{get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        auth::{AuthResponse, LoginRequest, SignupRequest},
        user::ProfileResponse,
    },
    error::AppError,
    services::auth_service::{self, CurrentUser},
    state::SharedState,
};

/// Extract the token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<SharedState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(current) = parts.extensions.get::<CurrentUser>() {
            return Ok(current.clone());
        }
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            AppError::Unauthorized("missing `Authorization: Bearer` header".into())
        })?;
        let current = auth_service::authenticate(state, token).await?;
        parts.extensions.insert(current.clone());
        Ok(current)
    }
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "auth",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 409, description = "Email already registered")
    )
)]
/// Create an account and return a session.
pub async fn signup(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<SignupRequest>>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let response = auth_service::signup(&state, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account banned")
    )
)]
/// Exchange credentials for a session token.
pub async fn login(
    State(state): State<SharedState>,
    Valid(Json(request)): Valid<Json<LoginRequest>>,
) -> Result<Json<AuthResponse>, AppError> {
    Ok(Json(auth_service::login(&state, request).await?))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    security(("bearer" = [])),
    responses((status = 204, description = "Session revoked"))
)]
/// Revoke the session used by this request.
pub async fn logout(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> StatusCode {
    auth_service::logout(&state, &current);
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer" = [])),
    responses((status = 200, description = "Current profile", body = ProfileResponse))
)]
/// Return the caller's own profile.
pub async fn me(
    State(state): State<SharedState>,
    current: CurrentUser,
) -> Result<Json<ProfileResponse>, AppError> {
    Ok(Json(auth_service::me(&state, &current).await?))
}

/// Configure the authentication routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  xyz "));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
