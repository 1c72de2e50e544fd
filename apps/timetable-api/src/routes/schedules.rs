//! Timetable endpoints.
//!
//! Every successful write publishes a `schedule_update` event to live
//! subscribers. Publishing happens after the write is committed and runs in
//! the background, so it can neither delay nor fail the response.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::auth::middleware::AdminUser;
use crate::db::schema::{groups, schedules};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::gateway::events::{to_event, Mutation};
use crate::models::schedule::{
    self, NewSchedule, Schedule, ScheduleResponse, SessionStatus, SessionType, UpdateSchedule,
};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/schedule", get(list_schedules).post(create_schedule))
        .route("/schedule/refresh-all", post(refresh_all))
        .route("/schedule/id/{id}", get(get_schedule))
        // One path segment is either a group code (GET) or a schedule id.
        .route(
            "/schedule/{key}",
            get(list_group_schedules)
                .put(update_schedule)
                .delete(delete_schedule),
        )
}

fn reference_error() -> ApiError {
    ApiError::bad_request("Referenced group, subject, professor or room does not exist")
}

fn validate_slot(day: Option<&str>, hour: Option<&str>) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if day.is_some_and(|d| d.trim().is_empty()) {
        errors.push(FieldError {
            field: "day".to_string(),
            message: "Day must not be empty".to_string(),
        });
    }
    if hour.is_some_and(|h| h.trim().is_empty()) {
        errors.push(FieldError {
            field: "hour".to_string(),
            message: "Hour must not be empty".to_string(),
        });
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation(errors))
    }
}

// ---------------------------------------------------------------------------
// GET /schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScheduleFilter {
    pub academic_year: Option<i32>,
    pub semester: Option<String>,
    pub cycle_type: Option<String>,
}

/// `GET /schedule`: All timetable entries, optionally filtered.
#[utoipa::path(
    get,
    path = "/schedule",
    tag = "Schedule",
    params(ScheduleFilter),
    responses(
        (status = 200, description = "Timetable entries", body = Vec<ScheduleResponse>),
    ),
)]
pub async fn list_schedules(
    State(state): State<AppState>,
    Query(filter): Query<ScheduleFilter>,
) -> Result<Json<Vec<ScheduleResponse>>, ApiError> {
    let mut conn = state.db.get().await?;

    let mut query: schedules::BoxedQuery<'_, Pg> = schedules::table.into_boxed();
    if let Some(year) = filter.academic_year {
        query = query.filter(schedules::academic_year.eq(year));
    }
    if let Some(semester) = filter.semester {
        query = query.filter(schedules::semester.eq(semester));
    }
    if let Some(cycle_type) = filter.cycle_type {
        query = query.filter(schedules::cycle_type.eq(cycle_type));
    }

    let rows: Vec<Schedule> = query
        .order((schedules::day.asc(), schedules::hour.asc(), schedules::id.asc()))
        .select(Schedule::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(schedule::resolve_all(&mut conn, rows).await?))
}

// ---------------------------------------------------------------------------
// GET /schedule/{group_code}
// ---------------------------------------------------------------------------

/// `GET /schedule/{group_code}`: Entries of one group. Unknown groups yield `[]`.
#[utoipa::path(
    get,
    path = "/schedule/{group_code}",
    tag = "Schedule",
    params(("group_code" = String, Path, description = "Group code")),
    responses(
        (status = 200, description = "Timetable entries of the group", body = Vec<ScheduleResponse>),
    ),
)]
pub async fn list_group_schedules(
    State(state): State<AppState>,
    Path(group_code): Path<String>,
) -> Result<Json<Vec<ScheduleResponse>>, ApiError> {
    let mut conn = state.db.get().await?;

    let rows: Vec<Schedule> = schedules::table
        .inner_join(groups::table)
        .filter(groups::code.eq(&group_code))
        .order((schedules::day.asc(), schedules::hour.asc(), schedules::id.asc()))
        .select(Schedule::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(schedule::resolve_all(&mut conn, rows).await?))
}

// ---------------------------------------------------------------------------
// GET /schedule/id/{id}
// ---------------------------------------------------------------------------

/// `GET /schedule/id/{id}`: One timetable entry.
#[utoipa::path(
    get,
    path = "/schedule/id/{id}",
    tag = "Schedule",
    params(("id" = i32, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Timetable entry", body = ScheduleResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn get_schedule(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    let mut conn = state.db.get().await?;
    schedule::find_resolved(&mut conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Schedule not found"))
}

// ---------------------------------------------------------------------------
// POST /schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateScheduleRequest {
    pub group_id: i32,
    pub subject_id: i32,
    pub professor_id: i32,
    pub room_id: i32,
    pub day: String,
    pub hour: String,
    #[serde(default)]
    pub session_type: SessionType,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub odd_week_subject_id: Option<i32>,
    #[serde(default)]
    pub odd_week_professor_id: Option<i32>,
    #[serde(default)]
    pub odd_week_room_id: Option<i32>,
    #[serde(default)]
    pub academic_year: Option<i32>,
    #[serde(default)]
    pub semester: Option<String>,
    #[serde(default)]
    pub cycle_type: Option<String>,
}

/// `POST /schedule`: Add a timetable entry.
#[utoipa::path(
    post,
    path = "/schedule",
    tag = "Schedule",
    security(("bearer" = [])),
    request_body = CreateScheduleRequest,
    responses(
        (status = 201, description = "Entry created", body = ScheduleResponse),
        (status = 400, description = "Validation error or unknown reference", body = ApiErrorBody),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
        (status = 403, description = "Not an administrator", body = ApiErrorBody),
    ),
)]
pub async fn create_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<CreateScheduleRequest>,
) -> Result<(StatusCode, Json<ScheduleResponse>), ApiError> {
    validate_slot(Some(&body.day), Some(&body.hour))?;

    let mut conn = state.db.get().await?;
    let created = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let row: Schedule = diesel::insert_into(schedules::table)
                    .values(NewSchedule {
                        group_id: body.group_id,
                        subject_id: body.subject_id,
                        professor_id: body.professor_id,
                        room_id: body.room_id,
                        day: body.day.trim(),
                        hour: body.hour.trim(),
                        session_type: body.session_type,
                        status: body.status,
                        notes: body.notes.as_deref(),
                        odd_week_subject_id: body.odd_week_subject_id,
                        odd_week_professor_id: body.odd_week_professor_id,
                        odd_week_room_id: body.odd_week_room_id,
                        academic_year: body.academic_year,
                        semester: body.semester.as_deref(),
                        cycle_type: body.cycle_type.as_deref(),
                    })
                    .returning(Schedule::as_returning())
                    .get_result(conn)
                    .await
                    .map_err(|e| ApiError::on_constraint(e, reference_error, reference_error))?;

                schedule::resolve_all(conn, vec![row])
                    .await?
                    .pop()
                    .ok_or_else(|| ApiError::internal("Created schedule could not be resolved"))
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(schedule_id = created.id, group = %created.group.code, "schedule created");
    state
        .broadcaster
        .publish(to_event(Mutation::Created(created.clone())));

    Ok((StatusCode::CREATED, Json(created)))
}

// ---------------------------------------------------------------------------
// PUT /schedule/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateScheduleRequest {
    pub group_id: Option<i32>,
    pub subject_id: Option<i32>,
    pub professor_id: Option<i32>,
    pub room_id: Option<i32>,
    pub day: Option<String>,
    pub hour: Option<String>,
    pub session_type: Option<SessionType>,
    pub status: Option<SessionStatus>,
    pub notes: Option<String>,
    pub odd_week_subject_id: Option<i32>,
    pub odd_week_professor_id: Option<i32>,
    pub odd_week_room_id: Option<i32>,
    pub academic_year: Option<i32>,
    pub semester: Option<String>,
    pub cycle_type: Option<String>,
}

/// `PUT /schedule/{id}`: Change an entry. Bumps its version.
#[utoipa::path(
    put,
    path = "/schedule/{id}",
    tag = "Schedule",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Schedule ID")),
    request_body = UpdateScheduleRequest,
    responses(
        (status = 200, description = "Entry updated", body = ScheduleResponse),
        (status = 400, description = "Validation error or unknown reference", body = ApiErrorBody),
        (status = 403, description = "Not an administrator", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn update_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
    Json(body): Json<UpdateScheduleRequest>,
) -> Result<Json<ScheduleResponse>, ApiError> {
    validate_slot(body.day.as_deref(), body.hour.as_deref())?;

    let changes = UpdateSchedule {
        group_id: body.group_id,
        subject_id: body.subject_id,
        professor_id: body.professor_id,
        room_id: body.room_id,
        day: body.day.map(|d| d.trim().to_string()),
        hour: body.hour.map(|h| h.trim().to_string()),
        session_type: body.session_type,
        status: body.status,
        notes: body.notes,
        odd_week_subject_id: body.odd_week_subject_id,
        odd_week_professor_id: body.odd_week_professor_id,
        odd_week_room_id: body.odd_week_room_id,
        academic_year: body.academic_year,
        semester: body.semester,
        cycle_type: body.cycle_type,
    };

    let mut conn = state.db.get().await?;
    let updated = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let bump = schedules::version.eq(schedules::version + 1);
                let row: Option<Schedule> = if changes.is_empty() {
                    diesel::update(schedules::table.find(id))
                        .set(bump)
                        .returning(Schedule::as_returning())
                        .get_result(conn)
                        .await
                        .optional()?
                } else {
                    diesel::update(schedules::table.find(id))
                        .set((&changes, bump))
                        .returning(Schedule::as_returning())
                        .get_result(conn)
                        .await
                        .optional()
                        .map_err(|e| {
                            ApiError::on_constraint(e, reference_error, reference_error)
                        })?
                };

                let row = row.ok_or_else(|| ApiError::not_found("Schedule not found"))?;
                schedule::resolve_all(conn, vec![row])
                    .await?
                    .pop()
                    .ok_or_else(|| ApiError::internal("Updated schedule could not be resolved"))
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(schedule_id = id, version = updated.version, "schedule updated");
    state
        .broadcaster
        .publish(to_event(Mutation::Updated(updated.clone())));

    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// DELETE /schedule/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteScheduleResponse {
    pub message: String,
}

/// `DELETE /schedule/{id}`: Remove an entry.
#[utoipa::path(
    delete,
    path = "/schedule/{id}",
    tag = "Schedule",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Entry deleted", body = DeleteScheduleResponse),
        (status = 403, description = "Not an administrator", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_schedule(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<DeleteScheduleResponse>, ApiError> {
    let mut conn = state.db.get().await?;

    // The snapshot must be taken while the references still resolve.
    let snapshot = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let snapshot = schedule::find_resolved(conn, id).await?;
                let deleted = diesel::delete(schedules::table.find(id))
                    .execute(conn)
                    .await?;
                if deleted == 0 {
                    return Err(ApiError::not_found("Schedule not found"));
                }
                Ok(snapshot)
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(schedule_id = id, "schedule deleted");
    match snapshot {
        Some(snapshot) => state
            .broadcaster
            .publish(to_event(Mutation::Deleted(snapshot))),
        None => tracing::warn!(schedule_id = id, "deleted schedule had dangling references, no event sent"),
    }

    Ok(Json(DeleteScheduleResponse {
        message: format!("Schedule {id} deleted"),
    }))
}

// ---------------------------------------------------------------------------
// POST /schedule/refresh-all
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshAllResponse {
    pub message: String,
    pub schedules_count: usize,
}

/// `POST /schedule/refresh-all`: Push the whole timetable to every subscriber.
#[utoipa::path(
    post,
    path = "/schedule/refresh-all",
    tag = "Schedule",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Resync published", body = RefreshAllResponse),
        (status = 403, description = "Not an administrator", body = ApiErrorBody),
    ),
)]
pub async fn refresh_all(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<RefreshAllResponse>, ApiError> {
    let mut conn = state.db.get().await?;
    let rows: Vec<Schedule> = schedules::table
        .order((schedules::day.asc(), schedules::hour.asc(), schedules::id.asc()))
        .select(Schedule::as_select())
        .load(&mut conn)
        .await?;
    let all = schedule::resolve_all(&mut conn, rows).await?;

    let schedules_count = all.len();
    let subscribers = state.broadcaster.registry().count();
    state.broadcaster.publish(to_event(Mutation::Resynced(all)));

    tracing::info!(schedules_count, subscribers, "timetable resync published");
    Ok(Json(RefreshAllResponse {
        message: format!("Refresh sent to {subscribers} clients"),
        schedules_count,
    }))
}
