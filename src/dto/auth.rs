use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::{
    user::ProfileResponse,
    validation::{validate_not_blank, validate_password},
};

/// Account creation payload.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SignupRequest {
    /// Login email; stored lowercased.
    #[validate(email)]
    pub email: String,
    /// At least eight characters.
    #[validate(custom(function = validate_password))]
    pub password: String,
    /// Name shown to other players.
    #[validate(length(min = 1, max = 60), custom(function = validate_not_blank))]
    pub display_name: String,
}

/// Credentials exchanged for a session.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    /// Account email, case-insensitive.
    #[validate(email)]
    pub email: String,
    /// Account password.
    #[validate(length(min = 1))]
    pub password: String,
}

/// Session issued after signup or login.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    /// Opaque bearer token to send as `Authorization: Bearer <token>`.
    pub token: String,
    /// RFC 3339 expiry of the token.
    pub expires_at: String,
    /// Profile of the signed-in account.
    pub user: ProfileResponse,
}
