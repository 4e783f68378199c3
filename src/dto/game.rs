use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameEntity, GameStatus, LocationEntity, SkillLevel},
    dto::{format_system_time, validation::validate_not_blank},
    state::roster::JoinOutcome,
};

/// Where a game takes place. Coordinates are supplied by the client as-is.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LocationDto {
    /// Street address shown to players.
    #[validate(length(min = 1, max = 200), custom(function = validate_not_blank))]
    pub address: String,
    /// Optional latitude in degrees.
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    /// Optional longitude in degrees.
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

impl From<LocationDto> for LocationEntity {
    fn from(dto: LocationDto) -> Self {
        Self {
            address: dto.address.trim().to_string(),
            latitude: dto.latitude,
            longitude: dto.longitude,
        }
    }
}

impl From<&LocationEntity> for LocationDto {
    fn from(entity: &LocationEntity) -> Self {
        Self {
            address: entity.address.clone(),
            latitude: entity.latitude,
            longitude: entity.longitude,
        }
    }
}

/// Payload used to host a new game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    /// Short headline shown in listings.
    #[validate(length(min = 1, max = 120), custom(function = validate_not_blank))]
    pub title: String,
    /// Sport being played, matched case-insensitively by filters.
    #[validate(length(min = 1, max = 60), custom(function = validate_not_blank))]
    pub sport: String,
    /// Optional details from the host.
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Where the game takes place.
    #[validate(nested)]
    pub location: LocationDto,
    /// RFC 3339 kick-off time; must be in the future.
    pub starts_at: String,
    /// Capacity including the host.
    #[validate(range(min = 2, max = 100))]
    pub max_players: u32,
    /// Advertised level; defaults to `any`.
    #[serde(default)]
    pub skill_level: SkillLevel,
    /// Route joins through host approval.
    #[serde(default)]
    pub requires_approval: bool,
}

/// Host edit of an upcoming game; omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateGameRequest {
    /// New headline.
    #[validate(length(min = 1, max = 120), custom(function = validate_not_blank))]
    pub title: Option<String>,
    /// New sport.
    #[validate(length(min = 1, max = 60), custom(function = validate_not_blank))]
    pub sport: Option<String>,
    /// New details.
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// New location.
    #[validate(nested)]
    pub location: Option<LocationDto>,
    /// New RFC 3339 kick-off time; must be in the future.
    pub starts_at: Option<String>,
    /// New capacity; cannot drop below the current roster.
    #[validate(range(min = 2, max = 100))]
    pub max_players: Option<u32>,
    /// New advertised level.
    pub skill_level: Option<SkillLevel>,
    /// Switch host approval on or off.
    pub requires_approval: Option<bool>,
}

/// Filters accepted by the game listing.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GameListQuery {
    /// Sport name, case-insensitive.
    pub sport: Option<String>,
    /// Lifecycle status.
    pub status: Option<GameStatus>,
    /// Advertised level.
    pub skill_level: Option<SkillLevel>,
    /// Case-insensitive substring matched against the title and address.
    pub q: Option<String>,
    /// Games hosted by this user.
    pub host_id: Option<Uuid>,
}

impl GameListQuery {
    /// Whether `game` passes every supplied filter.
    pub fn matches(&self, game: &GameEntity) -> bool {
        if self
            .sport
            .as_deref()
            .is_some_and(|sport| !game.sport.eq_ignore_ascii_case(sport.trim()))
        {
            return false;
        }
        if self.status.is_some_and(|status| status != game.status) {
            return false;
        }
        if self
            .skill_level
            .is_some_and(|level| level != game.skill_level)
        {
            return false;
        }
        if self.host_id.is_some_and(|host| host != game.host_id) {
            return false;
        }
        if let Some(needle) = self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = needle.to_lowercase();
            let hit = game.title.to_lowercase().contains(&needle)
                || game.location.address.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Pending join request as shown to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinRequestSummary {
    /// Requesting player.
    pub user_id: Uuid,
    /// RFC 3339 request time.
    pub requested_at: String,
}

/// Attendance record as shown to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceSummary {
    /// Participant.
    pub user_id: Uuid,
    /// Whether they showed up.
    pub attended: bool,
    /// RFC 3339 time the host recorded it.
    pub marked_at: String,
}

/// Public projection of a game.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameSummary {
    /// Game id.
    pub id: Uuid,
    /// Headline.
    pub title: String,
    /// Sport.
    pub sport: String,
    /// Host's details.
    pub description: Option<String>,
    /// Location.
    pub location: LocationDto,
    /// RFC 3339 kick-off time.
    pub starts_at: String,
    /// Capacity including the host.
    pub max_players: u32,
    /// Participants counted against `max_players`, host included.
    pub player_count: usize,
    /// Advertised level.
    pub skill_level: SkillLevel,
    /// Whether joins need host approval.
    pub requires_approval: bool,
    /// Current host.
    pub host_id: Uuid,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Players registered besides the host.
    pub registered_players: Vec<Uuid>,
    /// Pending join requests.
    pub join_requests: Vec<JoinRequestSummary>,
    /// Blue team line-up.
    pub team_blue: Vec<Uuid>,
    /// Red team line-up.
    pub team_red: Vec<Uuid>,
    /// Attendance recorded so far.
    pub attendance: Vec<AttendanceSummary>,
    /// Number of ratings submitted.
    pub rating_count: usize,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last change.
    pub updated_at: String,
}

impl From<&GameEntity> for GameSummary {
    fn from(game: &GameEntity) -> Self {
        Self {
            id: game.id,
            title: game.title.clone(),
            sport: game.sport.clone(),
            description: game.description.clone(),
            location: LocationDto::from(&game.location),
            starts_at: format_system_time(game.starts_at),
            max_players: game.max_players,
            player_count: game.participant_count(),
            skill_level: game.skill_level,
            requires_approval: game.requires_approval,
            host_id: game.host_id,
            status: game.status,
            registered_players: game.registered_players.clone(),
            join_requests: game
                .join_requests
                .iter()
                .map(|request| JoinRequestSummary {
                    user_id: request.user_id,
                    requested_at: format_system_time(request.requested_at),
                })
                .collect(),
            team_blue: game.team_blue.clone(),
            team_red: game.team_red.clone(),
            attendance: game
                .attendance
                .iter()
                .map(|record| AttendanceSummary {
                    user_id: record.user_id,
                    attended: record.attended,
                    marked_at: format_system_time(record.marked_at),
                })
                .collect(),
            rating_count: game.ratings.len(),
            created_at: format_system_time(game.created_at),
            updated_at: format_system_time(game.updated_at),
        }
    }
}

/// Whether a join registered the caller or queued a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JoinStatus {
    /// The caller is now on the roster.
    Registered,
    /// The host has to approve the caller.
    Requested,
}

impl From<JoinOutcome> for JoinStatus {
    fn from(outcome: JoinOutcome) -> Self {
        match outcome {
            JoinOutcome::Registered => JoinStatus::Registered,
            JoinOutcome::Requested => JoinStatus::Requested,
        }
    }
}

/// Result of a join attempt.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    /// How the join was handled.
    pub status: JoinStatus,
    /// Game after the join.
    pub game: GameSummary,
}

/// New host picked by the current host.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferHostRequest {
    /// Registered player taking over.
    pub new_host_id: Uuid,
}

/// Complete team line-ups; each member must take part in the game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct TeamsRequest {
    /// Blue team members.
    #[serde(default)]
    #[validate(length(max = 100))]
    pub team_blue: Vec<Uuid>,
    /// Red team members.
    #[serde(default)]
    #[validate(length(max = 100))]
    pub team_red: Vec<Uuid>,
}

/// Attendance mark for one participant.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AttendanceRequest {
    /// Participant being marked.
    pub user_id: Uuid,
    /// Whether they showed up.
    pub attended: bool,
}

/// Post-game rating of another participant.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct RatingRequest {
    /// Participant being rated.
    pub user_id: Uuid,
    /// Score from 1 to 5.
    #[validate(range(min = 1, max = 5))]
    pub score: u8,
}
