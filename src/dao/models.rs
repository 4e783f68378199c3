use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Role granted to an account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    /// Regular player.
    User,
    /// Moderator with access to `/admin`.
    Admin,
}

/// Account persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserEntity {
    /// Primary key of the user.
    pub id: Uuid,
    /// Lowercased login email, unique across users.
    pub email: String,
    /// Name shown to other players.
    pub display_name: String,
    /// Free-form profile text.
    pub bio: Option<String>,
    /// Sports listed on the profile.
    pub favorite_sports: Vec<String>,
    /// Account role.
    pub role: UserRole,
    /// Banned accounts cannot authenticate.
    pub is_banned: bool,
    /// Reason given by the admin who applied the ban.
    pub ban_reason: Option<String>,
    /// Completed games the user attended.
    pub games_played: u32,
    /// Mean of every rating received, `None` until the first rating.
    pub average_rating: Option<f64>,
    /// Number of ratings folded into [`Self::average_rating`].
    pub rating_count: u32,
    /// Argon2id PHC string; embeds its own salt and parameters.
    pub password_hash: String,
    /// Signup time.
    pub created_at: SystemTime,
    /// Time of the last change.
    pub updated_at: SystemTime,
}

/// Lifecycle status of a hosted game.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Scheduled and open for sign-ups.
    Upcoming,
    /// Kicked off; attendance can be recorded.
    Ongoing,
    /// Every participant's attendance is recorded.
    Completed,
    /// Called off by the host or a moderator.
    Cancelled,
}

impl GameStatus {
    /// Whether the game can no longer change.
    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Cancelled)
    }
}

/// Skill level advertised by the host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SkillLevel {
    #[default]
    /// Open to every level.
    Any,
    /// New to the sport.
    Beginner,
    /// Plays regularly.
    Intermediate,
    /// Competitive players.
    Advanced,
}

/// Where a game takes place. Coordinates are supplied by the client as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationEntity {
    /// Free-form street address.
    pub address: String,
    /// Optional WGS84 latitude.
    pub latitude: Option<f64>,
    /// Optional WGS84 longitude.
    pub longitude: Option<f64>,
}

/// Pending request to join a game that requires host approval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JoinRequestEntity {
    /// Player asking to join.
    pub user_id: Uuid,
    /// When the request was made.
    pub requested_at: SystemTime,
}

/// Attendance record written by the host once the game is under way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttendanceEntity {
    /// Participant the record is about.
    pub user_id: Uuid,
    /// Whether they showed up.
    pub attended: bool,
    /// When the host recorded it.
    pub marked_at: SystemTime,
}

/// Post-game rating of one participant by another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RatingEntity {
    /// Participant giving the score.
    pub rater_id: Uuid,
    /// Participant receiving the score.
    pub target_id: Uuid,
    /// Score between 1 and 5.
    pub score: u8,
}

/// Hosted pickup game and its embedded rosters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Short headline.
    pub title: String,
    /// Sport being played.
    pub sport: String,
    /// Optional details from the host.
    pub description: Option<String>,
    /// Where the game takes place.
    pub location: LocationEntity,
    /// Scheduled kick-off.
    pub starts_at: SystemTime,
    /// Maximum number of participants, host included.
    pub max_players: u32,
    /// Advertised level.
    pub skill_level: SkillLevel,
    /// When set, joins go through [`Self::join_requests`] instead of registering directly.
    pub requires_approval: bool,
    /// Current host, always a participant.
    pub host_id: Uuid,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Players registered besides the host.
    pub registered_players: Vec<Uuid>,
    /// Requests waiting for the host.
    pub join_requests: Vec<JoinRequestEntity>,
    /// Blue team line-up.
    pub team_blue: Vec<Uuid>,
    /// Red team line-up.
    pub team_red: Vec<Uuid>,
    /// Attendance recorded by the host.
    pub attendance: Vec<AttendanceEntity>,
    /// Post-game ratings.
    pub ratings: Vec<RatingEntity>,
    /// Creation time.
    pub created_at: SystemTime,
    /// Time of the last change.
    pub updated_at: SystemTime,
}

/// Kind of entity a report points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReportTargetKind {
    /// A hosted game.
    Game,
    /// A user account.
    User,
}

/// Reported entity reference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ReportTarget {
    /// Whether the target is a user or a game.
    pub kind: ReportTargetKind,
    /// Id of the reported entity.
    pub id: Uuid,
}

/// Moderation status of a report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Waiting for a moderator.
    Pending,
    /// Handled, possibly with an action.
    Resolved,
    /// Closed without action.
    Dismissed,
}

/// Category picked by the reporter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    /// Abusive behaviour towards other players.
    Harassment,
    /// Unsolicited advertising or flooding.
    Spam,
    /// Offensive content.
    Inappropriate,
    /// Did not show up to a game.
    NoShow,
    /// Unfair play.
    Cheating,
    /// Anything else.
    Other,
}

/// Complaint filed against a game or a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportEntity {
    /// Primary key of the report.
    pub id: Uuid,
    /// User who filed the report.
    pub reporter_id: Uuid,
    /// Reported entity.
    pub target: ReportTarget,
    /// Category chosen by the reporter.
    pub reason: ReportReason,
    /// Reporter's explanation.
    pub description: String,
    /// Moderation status.
    pub status: ReportStatus,
    /// Note left by the moderator.
    pub resolution_note: Option<String>,
    /// Moderator who closed the report.
    pub resolved_by: Option<Uuid>,
    /// When the report was filed.
    pub created_at: SystemTime,
    /// When the report was closed.
    pub resolved_at: Option<SystemTime>,
}

/// Event that produced a notification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Someone asked to join the recipient's game.
    JoinRequested,
    /// Someone joined the recipient's game.
    PlayerJoined,
    /// The recipient's join request was approved.
    RequestApproved,
    /// The recipient's join request was declined.
    RequestRejected,
    /// A player left the recipient's game.
    PlayerLeft,
    /// The recipient was removed from a game.
    Kicked,
    /// The recipient now hosts a game.
    HostTransferred,
    /// A game the recipient was in was cancelled.
    GameCancelled,
    /// A game the recipient was in completed.
    GameCompleted,
    /// The recipient's account was banned.
    Banned,
    /// The recipient's ban was lifted.
    Unbanned,
    /// A report the recipient filed was resolved.
    ReportResolved,
    /// A report the recipient filed was dismissed.
    ReportDismissed,
}

/// Message delivered to a single user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationEntity {
    /// Primary key of the notification.
    pub id: Uuid,
    /// Recipient.
    pub user_id: Uuid,
    /// What happened.
    pub kind: NotificationKind,
    /// Human readable text.
    pub message: String,
    /// Game the notification is about, if any.
    pub game_id: Option<Uuid>,
    /// Whether the recipient has read it.
    pub read: bool,
    /// Creation time.
    pub created_at: SystemTime,
}

/// Chat line posted in a game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageEntity {
    /// Primary key of the message.
    pub id: Uuid,
    /// Game whose chat holds the message.
    pub game_id: Uuid,
    /// Author.
    pub sender_id: Uuid,
    /// Display name of the sender at the time of posting.
    pub sender_name: String,
    /// Trimmed message body.
    pub text: String,
    /// Posting time.
    pub created_at: SystemTime,
}
