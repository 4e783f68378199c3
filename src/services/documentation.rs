use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the GameOn backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::auth::signup,
        crate::routes::auth::login,
        crate::routes::auth::logout,
        crate::routes::auth::me,
        crate::routes::users::get_profile,
        crate::routes::users::update_me,
        crate::routes::users::delete_me,
        crate::routes::users::my_games,
        crate::routes::games::create_game,
        crate::routes::games::list_games,
        crate::routes::games::get_game,
        crate::routes::games::update_game,
        crate::routes::games::join_game,
        crate::routes::games::approve_request,
        crate::routes::games::reject_request,
        crate::routes::games::leave_game,
        crate::routes::games::kick_player,
        crate::routes::games::transfer_host,
        crate::routes::games::set_teams,
        crate::routes::games::start_game,
        crate::routes::games::record_attendance,
        crate::routes::games::cancel_game,
        crate::routes::games::rate_player,
        crate::routes::chat::history,
        crate::routes::chat::post_message,
        crate::routes::chat::chat_socket,
        crate::routes::reports::create_report,
        crate::routes::reports::my_reports,
        crate::routes::notifications::list_notifications,
        crate::routes::notifications::unread_count,
        crate::routes::notifications::mark_read,
        crate::routes::notifications::mark_all_read,
        crate::routes::notifications::delete_notification,
        crate::routes::notifications::notification_stream,
        crate::routes::admin::list_users,
        crate::routes::admin::ban_user,
        crate::routes::admin::unban_user,
        crate::routes::admin::set_role,
        crate::routes::admin::list_games,
        crate::routes::admin::cancel_game,
        crate::routes::admin::list_reports,
        crate::routes::admin::resolve_report,
        crate::routes::admin::dismiss_report,
        crate::routes::admin::delete_message,
        crate::routes::admin::stats,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::CountResponse,
            crate::dto::auth::SignupRequest,
            crate::dto::auth::LoginRequest,
            crate::dto::auth::AuthResponse,
            crate::dto::user::ProfileResponse,
            crate::dto::user::PublicProfile,
            crate::dto::user::UpdateProfileRequest,
            crate::dto::game::LocationDto,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::UpdateGameRequest,
            crate::dto::game::GameSummary,
            crate::dto::game::JoinRequestSummary,
            crate::dto::game::AttendanceSummary,
            crate::dto::game::JoinStatus,
            crate::dto::game::JoinResponse,
            crate::dto::game::TransferHostRequest,
            crate::dto::game::TeamsRequest,
            crate::dto::game::AttendanceRequest,
            crate::dto::game::RatingRequest,
            crate::dto::chat::MessageSummary,
            crate::dto::chat::SendMessageRequest,
            crate::dto::chat::ChatInboundMessage,
            crate::dto::chat::ChatOutboundMessage,
            crate::dto::report::CreateReportRequest,
            crate::dto::report::ReportSummary,
            crate::dto::report::ReportPriority,
            crate::dto::report::AdminReportSummary,
            crate::dto::report::ResolutionAction,
            crate::dto::report::ResolveReportRequest,
            crate::dto::report::DismissReportRequest,
            crate::dto::notification::NotificationSummary,
            crate::dto::notification::UnreadCountResponse,
            crate::dto::admin::BanUserRequest,
            crate::dto::admin::UpdateRoleRequest,
            crate::dto::admin::GameStatusCounts,
            crate::dto::admin::StatsResponse,
            crate::dao::models::UserRole,
            crate::dao::models::GameStatus,
            crate::dao::models::SkillLevel,
            crate::dao::models::ReportTargetKind,
            crate::dao::models::ReportStatus,
            crate::dao::models::ReportReason,
            crate::dao::models::NotificationKind,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Account creation and sessions"),
        (name = "users", description = "Profiles and self-service account management"),
        (name = "games", description = "Game scheduling, rosters and lifecycle"),
        (name = "chat", description = "Per-game chat over REST and WebSocket"),
        (name = "reports", description = "Filing reports against users or games"),
        (name = "notifications", description = "Notification inbox and live stream"),
        (name = "admin", description = "Moderation and dashboard operations"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by authenticated operations.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}
