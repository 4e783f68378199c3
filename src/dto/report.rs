use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{ReportEntity, ReportReason, ReportStatus, ReportTargetKind},
    dto::format_system_time,
};

/// Report payload filed by a user.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateReportRequest {
    /// Whether a user or a game is reported.
    pub target_type: ReportTargetKind,
    /// Id of the reported entity.
    pub target_id: Uuid,
    /// Category of the complaint.
    pub reason: ReportReason,
    /// Optional explanation.
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: String,
}

/// Report as shown to its reporter.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReportSummary {
    /// Report id.
    pub id: Uuid,
    /// User who filed it.
    pub reporter_id: Uuid,
    /// Kind of reported entity.
    pub target_type: ReportTargetKind,
    /// Id of the reported entity.
    pub target_id: Uuid,
    /// Category of the complaint.
    pub reason: ReportReason,
    /// Reporter's explanation.
    pub description: String,
    /// Moderation status.
    pub status: ReportStatus,
    /// Note left by the moderator.
    pub resolution_note: Option<String>,
    /// Moderator who closed it.
    pub resolved_by: Option<Uuid>,
    /// RFC 3339 filing time.
    pub created_at: String,
    /// RFC 3339 closing time.
    pub resolved_at: Option<String>,
}

impl From<&ReportEntity> for ReportSummary {
    fn from(report: &ReportEntity) -> Self {
        Self {
            id: report.id,
            reporter_id: report.reporter_id,
            target_type: report.target.kind,
            target_id: report.target.id,
            reason: report.reason,
            description: report.description.clone(),
            status: report.status,
            resolution_note: report.resolution_note.clone(),
            resolved_by: report.resolved_by,
            created_at: format_system_time(report.created_at),
            resolved_at: report.resolved_at.map(format_system_time),
        }
    }
}

/// Urgency derived from the number of pending reports on the same target.
///
/// Declared from most to least urgent so the derived ordering sorts high first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportPriority {
    /// Pending count at or above the high threshold.
    High,
    /// Pending count at or above the medium threshold.
    Medium,
    /// Anything below.
    Low,
}

/// Report as listed for moderators.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminReportSummary {
    /// Underlying report.
    #[serde(flatten)]
    pub report: ReportSummary,
    /// Urgency of the target.
    pub priority: ReportPriority,
    /// Pending reports currently filed against the same target.
    pub pending_count: usize,
}

/// Filters accepted by the moderation queue.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportListQuery {
    /// Only reports in this status; every report when omitted.
    pub status: Option<ReportStatus>,
}

/// Moderation side effect applied when resolving a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionAction {
    /// Ban the reported user. Only valid for user targets.
    BanUser,
    /// Cancel the reported game. Only valid for game targets.
    CancelGame,
}

/// Resolution payload.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct ResolveReportRequest {
    /// Note shown to the reporter.
    #[validate(length(max = 2000))]
    pub note: Option<String>,
    /// Optional side effect on the target.
    pub action: Option<ResolutionAction>,
}

/// Dismissal payload.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
pub struct DismissReportRequest {
    /// Note shown to the reporter.
    #[validate(length(max = 2000))]
    pub note: Option<String>,
}
