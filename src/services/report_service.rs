//! Abuse reports: filing, moderator triage with read-time priority, and
//! resolution side effects.

use std::time::SystemTime;

use indexmap::IndexMap;
use tracing::info;
use uuid::Uuid;

use crate::{
    config::ReportConfig,
    dao::models::{
        NotificationKind, ReportEntity, ReportStatus, ReportTarget, ReportTargetKind,
    },
    dto::report::{
        AdminReportSummary, CreateReportRequest, DismissReportRequest, ReportListQuery,
        ReportPriority, ReportSummary, ResolutionAction, ResolveReportRequest,
    },
    error::ServiceError,
    services::{admin_service, auth_service::CurrentUser, game_service, notification_service},
    state::SharedState,
};

/// Map a pending-report count to its priority bucket.
pub fn priority_for(pending: usize, thresholds: ReportConfig) -> ReportPriority {
    if pending >= thresholds.high_priority_threshold {
        ReportPriority::High
    } else if pending >= thresholds.medium_priority_threshold {
        ReportPriority::Medium
    } else {
        ReportPriority::Low
    }
}

/// Count pending reports per target, in first-seen order.
pub fn pending_counts(reports: &[ReportEntity]) -> IndexMap<ReportTarget, usize> {
    let mut counts = IndexMap::new();
    for report in reports {
        if report.status == ReportStatus::Pending {
            *counts.entry(report.target).or_insert(0) += 1;
        }
    }
    counts
}

/// File a report, refusing a second pending report by the same reporter on the same target.
pub async fn create_report(
    state: &SharedState,
    current: &CurrentUser,
    request: CreateReportRequest,
) -> Result<ReportSummary, ServiceError> {
    let store = state.require_store().await?;
    let target = ReportTarget {
        kind: request.target_type,
        id: request.target_id,
    };

    match target.kind {
        ReportTargetKind::User => {
            if target.id == current.id {
                return Err(ServiceError::InvalidInput("you cannot report yourself".into()));
            }
            if store.find_user(target.id).await?.is_none() {
                return Err(ServiceError::NotFound(format!("user `{}` not found", target.id)));
            }
        }
        ReportTargetKind::Game => {
            game_service::load_game(&store, target.id).await?;
        }
    }

    let duplicate = store.list_reports().await?.into_iter().any(|report| {
        report.reporter_id == current.id
            && report.target == target
            && report.status == ReportStatus::Pending
    });
    if duplicate {
        return Err(ServiceError::Conflict(
            "you already have a pending report on this target".into(),
        ));
    }

    let report = ReportEntity {
        id: Uuid::new_v4(),
        reporter_id: current.id,
        target,
        reason: request.reason,
        description: request.description.trim().to_string(),
        status: ReportStatus::Pending,
        resolution_note: None,
        resolved_by: None,
        created_at: SystemTime::now(),
        resolved_at: None,
    };
    store.save_report(report.clone()).await?;
    info!(report_id = %report.id, target = ?report.target, reason = ?report.reason, "report filed");
    Ok(ReportSummary::from(&report))
}

/// Reports filed by the caller, newest first.
pub async fn my_reports(
    state: &SharedState,
    current: &CurrentUser,
) -> Result<Vec<ReportSummary>, ServiceError> {
    let store = state.require_store().await?;
    let mut reports: Vec<_> = store
        .list_reports()
        .await?
        .into_iter()
        .filter(|report| report.reporter_id == current.id)
        .collect();
    reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(reports.iter().map(ReportSummary::from).collect())
}

/// Moderator listing, most urgent first and oldest first within a priority.
pub async fn list_for_admin(
    state: &SharedState,
    query: &ReportListQuery,
) -> Result<Vec<AdminReportSummary>, ServiceError> {
    let store = state.require_store().await?;
    let reports = store.list_reports().await?;
    let counts = pending_counts(&reports);
    let thresholds = state.config().reports();

    let mut listed: Vec<(ReportEntity, usize, ReportPriority)> = reports
        .into_iter()
        .filter(|report| query.status.is_none_or(|status| status == report.status))
        .map(|report| {
            let pending = counts.get(&report.target).copied().unwrap_or(0);
            (report, pending, priority_for(pending, thresholds))
        })
        .collect();
    listed.sort_by(|(a, _, pa), (b, _, pb)| pa.cmp(pb).then(a.created_at.cmp(&b.created_at)));

    Ok(listed
        .into_iter()
        .map(|(report, pending_count, priority)| AdminReportSummary {
            report: ReportSummary::from(&report),
            priority,
            pending_count,
        })
        .collect())
}

async fn load_pending(state: &SharedState, id: Uuid) -> Result<ReportEntity, ServiceError> {
    let store = state.require_store().await?;
    let report = store
        .find_report(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("report `{id}` not found")))?;
    if report.status != ReportStatus::Pending {
        return Err(ServiceError::InvalidState(format!(
            "report `{id}` is already {:?}",
            report.status
        )));
    }
    Ok(report)
}

fn clean_note(note: Option<String>) -> Option<String> {
    note.map(|note| note.trim().to_string())
        .filter(|note| !note.is_empty())
}

/// Close a report as actionable, optionally banning the user or cancelling the game.
pub async fn resolve_report(
    state: &SharedState,
    admin: &CurrentUser,
    id: Uuid,
    request: ResolveReportRequest,
) -> Result<AdminReportSummary, ServiceError> {
    let mut report = load_pending(state, id).await?;
    let note = clean_note(request.note);

    match (request.action, report.target.kind) {
        (None, _) => {}
        (Some(ResolutionAction::BanUser), ReportTargetKind::User) => {
            let reason = note
                .clone()
                .unwrap_or_else(|| format!("banned after report {id}"));
            admin_service::ban_user(state, admin, report.target.id, reason).await?;
        }
        (Some(ResolutionAction::CancelGame), ReportTargetKind::Game) => {
            game_service::force_cancel(state, report.target.id, None).await?;
        }
        (Some(action), kind) => {
            return Err(ServiceError::InvalidInput(format!(
                "action {action:?} does not apply to a {kind:?} report"
            )));
        }
    }

    report.status = ReportStatus::Resolved;
    report.resolution_note = note;
    report.resolved_by = Some(admin.id);
    report.resolved_at = Some(SystemTime::now());
    finish(state, report, NotificationKind::ReportResolved).await
}

/// Dismiss a pending report and notify the reporter.
pub async fn dismiss_report(
    state: &SharedState,
    admin: &CurrentUser,
    id: Uuid,
    request: DismissReportRequest,
) -> Result<AdminReportSummary, ServiceError> {
    let mut report = load_pending(state, id).await?;
    report.status = ReportStatus::Dismissed;
    report.resolution_note = clean_note(request.note);
    report.resolved_by = Some(admin.id);
    report.resolved_at = Some(SystemTime::now());
    finish(state, report, NotificationKind::ReportDismissed).await
}

async fn finish(
    state: &SharedState,
    report: ReportEntity,
    kind: NotificationKind,
) -> Result<AdminReportSummary, ServiceError> {
    let store = state.require_store().await?;
    store.save_report(report.clone()).await?;
    info!(report_id = %report.id, status = ?report.status, "report closed");

    let verdict = match report.status {
        ReportStatus::Resolved => "resolved",
        _ => "dismissed",
    };
    let message = match &report.resolution_note {
        Some(note) => format!("Your report was {verdict}: {note}"),
        None => format!("Your report was {verdict}"),
    };
    let game_id = (report.target.kind == ReportTargetKind::Game).then_some(report.target.id);
    notification_service::notify(state, report.reporter_id, kind, message, game_id).await;

    let reports = store.list_reports().await?;
    let pending_count = pending_counts(&reports)
        .get(&report.target)
        .copied()
        .unwrap_or(0);
    Ok(AdminReportSummary {
        report: ReportSummary::from(&report),
        priority: priority_for(pending_count, state.config().reports()),
        pending_count,
    })
}
