use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{UserEntity, UserRole},
    dto::{format_system_time, validation::validate_not_blank},
};

/// Full profile returned to its owner and to administrators.
#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    /// User id.
    pub id: Uuid,
    /// Login email.
    pub email: String,
    /// Name shown to other players.
    pub display_name: String,
    /// Free-form profile text.
    pub bio: Option<String>,
    /// Sports listed on the profile.
    pub favorite_sports: Vec<String>,
    /// Account role.
    pub role: UserRole,
    /// Whether the account is banned.
    pub is_banned: bool,
    /// Ban reason, only present while banned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban_reason: Option<String>,
    /// Completed games attended.
    pub games_played: u32,
    /// Mean rating received.
    pub average_rating: Option<f64>,
    /// Number of ratings received.
    pub rating_count: u32,
    /// RFC 3339 signup time.
    pub created_at: String,
    /// RFC 3339 time of the last change.
    pub updated_at: String,
}

impl From<&UserEntity> for ProfileResponse {
    fn from(user: &UserEntity) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            bio: user.bio.clone(),
            favorite_sports: user.favorite_sports.clone(),
            role: user.role,
            is_banned: user.is_banned,
            ban_reason: user.ban_reason.clone(),
            games_played: user.games_played,
            average_rating: user.average_rating,
            rating_count: user.rating_count,
            created_at: format_system_time(user.created_at),
            updated_at: format_system_time(user.updated_at),
        }
    }
}

/// Profile visible to other players; never carries the email or credentials.
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicProfile {
    /// User id.
    pub id: Uuid,
    /// Name shown to other players.
    pub display_name: String,
    /// Free-form profile text.
    pub bio: Option<String>,
    /// Sports listed on the profile.
    pub favorite_sports: Vec<String>,
    /// Completed games attended.
    pub games_played: u32,
    /// Mean rating received.
    pub average_rating: Option<f64>,
    /// Number of ratings received.
    pub rating_count: u32,
    /// RFC 3339 signup time.
    pub created_at: String,
}

impl From<&UserEntity> for PublicProfile {
    fn from(user: &UserEntity) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            bio: user.bio.clone(),
            favorite_sports: user.favorite_sports.clone(),
            games_played: user.games_played,
            average_rating: user.average_rating,
            rating_count: user.rating_count,
            created_at: format_system_time(user.created_at),
        }
    }
}

/// Partial profile update; omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    /// New display name.
    #[validate(length(min = 1, max = 60), custom(function = validate_not_blank))]
    pub display_name: Option<String>,
    /// New profile text.
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    /// Replacement list of sports.
    #[validate(length(max = 20))]
    pub favorite_sports: Option<Vec<String>>,
}
