//! BSON document shapes. Identifiers are stored as their hyphenated string form and
//! timestamps as native BSON dates so indexes and sorts behave as expected.

use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use uuid::Uuid;

use crate::dao::models::{
    AttendanceEntity, GameEntity, GameStatus, JoinRequestEntity, LocationEntity,
    MessageEntity, NotificationEntity, NotificationKind, RatingEntity, ReportEntity,
    ReportReason, ReportStatus, ReportTarget, ReportTargetKind, SkillLevel, UserEntity, UserRole,
};

/// Filter matching the document whose `_id` is `id`.
pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Stored shape of a user.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoUserDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    email: String,
    display_name: String,
    bio: Option<String>,
    #[serde(default)]
    favorite_sports: Vec<String>,
    role: UserRole,
    #[serde(default)]
    is_banned: bool,
    ban_reason: Option<String>,
    #[serde(default)]
    games_played: u32,
    average_rating: Option<f64>,
    #[serde(default)]
    rating_count: u32,
    password_hash: String,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<UserEntity> for MongoUserDocument {
    fn from(value: UserEntity) -> Self {
        Self {
            id: value.id,
            email: value.email,
            display_name: value.display_name,
            bio: value.bio,
            favorite_sports: value.favorite_sports,
            role: value.role,
            is_banned: value.is_banned,
            ban_reason: value.ban_reason,
            games_played: value.games_played,
            average_rating: value.average_rating,
            rating_count: value.rating_count,
            password_hash: value.password_hash,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoUserDocument> for UserEntity {
    fn from(value: MongoUserDocument) -> Self {
        Self {
            id: value.id,
            email: value.email,
            display_name: value.display_name,
            bio: value.bio,
            favorite_sports: value.favorite_sports,
            role: value.role,
            is_banned: value.is_banned,
            ban_reason: value.ban_reason,
            games_played: value.games_played,
            average_rating: value.average_rating,
            rating_count: value.rating_count,
            password_hash: value.password_hash,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoJoinRequest {
    #[serde_as(as = "DisplayFromStr")]
    user_id: Uuid,
    requested_at: DateTime,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoAttendance {
    #[serde_as(as = "DisplayFromStr")]
    user_id: Uuid,
    attended: bool,
    marked_at: DateTime,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoRating {
    #[serde_as(as = "DisplayFromStr")]
    rater_id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    target_id: Uuid,
    score: u8,
}

/// Stored shape of a game with its embedded rosters.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    title: String,
    sport: String,
    description: Option<String>,
    location: LocationEntity,
    starts_at: DateTime,
    max_players: u32,
    skill_level: SkillLevel,
    #[serde(default)]
    requires_approval: bool,
    #[serde_as(as = "DisplayFromStr")]
    host_id: Uuid,
    status: GameStatus,
    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(default)]
    registered_players: Vec<Uuid>,
    #[serde(default)]
    join_requests: Vec<MongoJoinRequest>,
    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(default)]
    team_blue: Vec<Uuid>,
    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(default)]
    team_red: Vec<Uuid>,
    #[serde(default)]
    attendance: Vec<MongoAttendance>,
    #[serde(default)]
    ratings: Vec<MongoRating>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            title: value.title,
            sport: value.sport,
            description: value.description,
            location: value.location,
            starts_at: DateTime::from_system_time(value.starts_at),
            max_players: value.max_players,
            skill_level: value.skill_level,
            requires_approval: value.requires_approval,
            host_id: value.host_id,
            status: value.status,
            registered_players: value.registered_players,
            join_requests: value
                .join_requests
                .into_iter()
                .map(|request| MongoJoinRequest {
                    user_id: request.user_id,
                    requested_at: DateTime::from_system_time(request.requested_at),
                })
                .collect(),
            team_blue: value.team_blue,
            team_red: value.team_red,
            attendance: value
                .attendance
                .into_iter()
                .map(|record| MongoAttendance {
                    user_id: record.user_id,
                    attended: record.attended,
                    marked_at: DateTime::from_system_time(record.marked_at),
                })
                .collect(),
            ratings: value
                .ratings
                .into_iter()
                .map(|rating| MongoRating {
                    rater_id: rating.rater_id,
                    target_id: rating.target_id,
                    score: rating.score,
                })
                .collect(),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            id: value.id,
            title: value.title,
            sport: value.sport,
            description: value.description,
            location: value.location,
            starts_at: value.starts_at.to_system_time(),
            max_players: value.max_players,
            skill_level: value.skill_level,
            requires_approval: value.requires_approval,
            host_id: value.host_id,
            status: value.status,
            registered_players: value.registered_players,
            join_requests: value
                .join_requests
                .into_iter()
                .map(|request| JoinRequestEntity {
                    user_id: request.user_id,
                    requested_at: request.requested_at.to_system_time(),
                })
                .collect(),
            team_blue: value.team_blue,
            team_red: value.team_red,
            attendance: value
                .attendance
                .into_iter()
                .map(|record| AttendanceEntity {
                    user_id: record.user_id,
                    attended: record.attended,
                    marked_at: record.marked_at.to_system_time(),
                })
                .collect(),
            ratings: value
                .ratings
                .into_iter()
                .map(|rating| RatingEntity {
                    rater_id: rating.rater_id,
                    target_id: rating.target_id,
                    score: rating.score,
                })
                .collect(),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

/// Stored shape of a report.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoReportDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    reporter_id: Uuid,
    target_kind: ReportTargetKind,
    #[serde_as(as = "DisplayFromStr")]
    target_id: Uuid,
    reason: ReportReason,
    description: String,
    status: ReportStatus,
    resolution_note: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    resolved_by: Option<Uuid>,
    created_at: DateTime,
    resolved_at: Option<DateTime>,
}

impl From<ReportEntity> for MongoReportDocument {
    fn from(value: ReportEntity) -> Self {
        Self {
            id: value.id,
            reporter_id: value.reporter_id,
            target_kind: value.target.kind,
            target_id: value.target.id,
            reason: value.reason,
            description: value.description,
            status: value.status,
            resolution_note: value.resolution_note,
            resolved_by: value.resolved_by,
            created_at: DateTime::from_system_time(value.created_at),
            resolved_at: value.resolved_at.map(DateTime::from_system_time),
        }
    }
}

impl From<MongoReportDocument> for ReportEntity {
    fn from(value: MongoReportDocument) -> Self {
        Self {
            id: value.id,
            reporter_id: value.reporter_id,
            target: ReportTarget {
                kind: value.target_kind,
                id: value.target_id,
            },
            reason: value.reason,
            description: value.description,
            status: value.status,
            resolution_note: value.resolution_note,
            resolved_by: value.resolved_by,
            created_at: value.created_at.to_system_time(),
            resolved_at: value.resolved_at.map(|at| at.to_system_time()),
        }
    }
}

/// Stored shape of a notification.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoNotificationDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    user_id: Uuid,
    kind: NotificationKind,
    message: String,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    game_id: Option<Uuid>,
    #[serde(default)]
    read: bool,
    created_at: DateTime,
}

impl From<NotificationEntity> for MongoNotificationDocument {
    fn from(value: NotificationEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            kind: value.kind,
            message: value.message,
            game_id: value.game_id,
            read: value.read,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoNotificationDocument> for NotificationEntity {
    fn from(value: MongoNotificationDocument) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            kind: value.kind,
            message: value.message,
            game_id: value.game_id,
            read: value.read,
            created_at: value.created_at.to_system_time(),
        }
    }
}

/// Stored shape of a chat message.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessageDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    game_id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    sender_id: Uuid,
    sender_name: String,
    text: String,
    created_at: DateTime,
}

impl From<MessageEntity> for MongoMessageDocument {
    fn from(value: MessageEntity) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            sender_id: value.sender_id,
            sender_name: value.sender_name,
            text: value.text,
            created_at: DateTime::from_system_time(value.created_at),
        }
    }
}

impl From<MongoMessageDocument> for MessageEntity {
    fn from(value: MongoMessageDocument) -> Self {
        Self {
            id: value.id,
            game_id: value.game_id,
            sender_id: value.sender_id,
            sender_name: value.sender_name,
            text: value.text,
            created_at: value.created_at.to_system_time(),
        }
    }
}
