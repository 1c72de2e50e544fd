pub mod auth;
pub mod groups;
pub mod health;
pub mod notifications;
pub mod professors;
pub mod rooms;
pub mod schedules;
pub mod subjects;
pub mod users;

use axum::Router;
use serde::Serialize;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::AppState;

/// Reply for a successful delete of a reference entity or account.
#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedResponse {
    pub message: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(crate::gateway::server::router())
        .merge(auth::router())
        .merge(schedules::router())
        .merge(notifications::router())
        .merge(groups::router())
        .merge(subjects::router())
        .merge(professors::router())
        .merge(rooms::router())
        .merge(users::router())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health,
        // Live updates
        crate::gateway::server::ws_upgrade,
        // Auth
        auth::check_email,
        auth::send_verification_code,
        auth::verify_code_and_set_password,
        auth::login,
        auth::me,
        // Timetable
        schedules::list_schedules,
        schedules::list_group_schedules,
        schedules::get_schedule,
        schedules::create_schedule,
        schedules::update_schedule,
        schedules::delete_schedule,
        schedules::refresh_all,
        // Notifications
        notifications::notify_batch,
        // Groups
        groups::list_groups,
        groups::get_group,
        groups::create_group,
        groups::update_group,
        groups::delete_group,
        // Subjects
        subjects::list_subjects,
        subjects::get_subject,
        subjects::create_subject,
        subjects::update_subject,
        subjects::delete_subject,
        // Professors
        professors::list_professors,
        professors::get_professor,
        professors::create_professor,
        professors::update_professor,
        professors::delete_professor,
        // Rooms
        rooms::list_rooms,
        rooms::get_room,
        rooms::create_room,
        rooms::update_room,
        rooms::delete_room,
        // Users
        users::list_users,
        users::create_user,
        users::update_user,
        users::delete_user,
    ),
    components(
        schemas(
            // Error types
            crate::error::ApiErrorBody,
            crate::error::ApiErrorDetail,
            crate::error::FieldError,
            // Models
            crate::models::group::Group,
            crate::models::subject::Subject,
            crate::models::professor::Professor,
            crate::models::room::Room,
            crate::models::schedule::SessionType,
            crate::models::schedule::SessionStatus,
            crate::models::schedule::ScheduleResponse,
            crate::models::user::UserRole,
            crate::models::user::UserResponse,
            crate::notify::fanout::NotificationReport,
            // Route request/response types
            DeletedResponse,
            health::HealthResponse,
            auth::EmailRequest,
            auth::CheckEmailResponse,
            auth::SetPasswordRequest,
            auth::LoginRequest,
            auth::TokenResponse,
            auth::MessageResponse,
            schedules::CreateScheduleRequest,
            schedules::UpdateScheduleRequest,
            schedules::DeleteScheduleResponse,
            schedules::RefreshAllResponse,
            notifications::BatchNotificationRequest,
            notifications::BatchNotificationResponse,
            groups::CreateGroupRequest,
            groups::UpdateGroupRequest,
            subjects::CreateSubjectRequest,
            subjects::UpdateSubjectRequest,
            professors::CreateProfessorRequest,
            professors::UpdateProfessorRequest,
            rooms::CreateRoomRequest,
            rooms::UpdateRoomRequest,
            users::CreateUserRequest,
            users::UpdateUserRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check"),
        (name = "Live updates", description = "WebSocket timetable feed"),
        (name = "Auth", description = "Login and account activation"),
        (name = "Schedule", description = "Timetable entries"),
        (name = "Notifications", description = "Email notifications"),
        (name = "Groups", description = "Student groups"),
        (name = "Subjects", description = "Subjects"),
        (name = "Professors", description = "Professors"),
        (name = "Rooms", description = "Rooms"),
        (name = "Users", description = "Account management"),
    )
)]
pub struct ApiDoc;
