//! DTO definitions used by the admin REST API and documentation layer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{dao::models::UserRole, dto::validation::validate_not_blank};

/// Ban payload; the reason is shown to the banned user.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct BanUserRequest {
    /// Reason recorded on the account.
    #[validate(length(min = 1, max = 500), custom(function = validate_not_blank))]
    pub reason: String,
}

/// Role change payload.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    /// Role to grant.
    pub role: UserRole,
}

/// Game counts per lifecycle status.
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct GameStatusCounts {
    /// Games not started yet.
    pub upcoming: usize,
    /// Games under way.
    pub ongoing: usize,
    /// Finished games.
    pub completed: usize,
    /// Called-off games.
    pub cancelled: usize,
}

/// Platform-wide counters shown on the moderation dashboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// Registered accounts.
    pub users: usize,
    /// Accounts currently banned.
    pub banned_users: usize,
    /// Accounts with the admin role.
    pub admins: usize,
    /// Games ever hosted.
    pub games: usize,
    /// Game counts per status.
    pub games_by_status: GameStatusCounts,
    /// Reports waiting for a moderator.
    pub pending_reports: usize,
    /// Reports ever filed.
    pub total_reports: usize,
}
