//! Student group endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AdminUser;
use crate::db::schema::groups;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::group::{Group, NewGroup, UpdateGroup};
use crate::routes::DeletedResponse;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/groups", get(list_groups).post(create_group))
        .route(
            "/groups/{id}",
            get(get_group).put(update_group).delete(delete_group),
        )
}

fn duplicate_code() -> ApiError {
    ApiError::conflict("A group with this code already exists")
}

fn still_referenced() -> ApiError {
    ApiError::conflict("Group is still used by timetable entries")
}

fn validate_code(code: Option<&str>) -> Result<(), ApiError> {
    if code.is_some_and(|c| c.trim().is_empty()) {
        return Err(ApiError::validation(vec![FieldError {
            field: "code".to_string(),
            message: "Group code is required".to_string(),
        }]));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GET /groups
// ---------------------------------------------------------------------------

/// `GET /groups`: All groups ordered by code.
#[utoipa::path(
    get,
    path = "/groups",
    tag = "Groups",
    responses((status = 200, description = "Groups", body = Vec<Group>)),
)]
pub async fn list_groups(State(state): State<AppState>) -> Result<Json<Vec<Group>>, ApiError> {
    let mut conn = state.db.get().await?;
    let rows = groups::table
        .order(groups::code.asc())
        .select(Group::as_select())
        .load(&mut conn)
        .await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /groups/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/groups/{id}",
    tag = "Groups",
    params(("id" = i32, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group", body = Group),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn get_group(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Group>, ApiError> {
    let mut conn = state.db.get().await?;
    groups::table
        .find(id)
        .select(Group::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Group not found"))
}

// ---------------------------------------------------------------------------
// POST /groups
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGroupRequest {
    pub code: String,
    pub year: Option<i32>,
    pub faculty: Option<String>,
    pub specialization: Option<String>,
}

#[utoipa::path(
    post,
    path = "/groups",
    tag = "Groups",
    security(("bearer" = [])),
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created", body = Group),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 409, description = "Duplicate code", body = ApiErrorBody),
    ),
)]
pub async fn create_group(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), ApiError> {
    validate_code(Some(&body.code))?;

    let mut conn = state.db.get().await?;
    let group: Group = diesel::insert_into(groups::table)
        .values(NewGroup {
            code: body.code.trim(),
            year: body.year,
            faculty: body.faculty.as_deref(),
            specialization: body.specialization.as_deref(),
        })
        .returning(Group::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| ApiError::on_constraint(e, duplicate_code, still_referenced))?;

    tracing::info!(group_id = group.id, code = %group.code, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

// ---------------------------------------------------------------------------
// PUT /groups/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateGroupRequest {
    pub code: Option<String>,
    pub year: Option<i32>,
    pub faculty: Option<String>,
    pub specialization: Option<String>,
}

#[utoipa::path(
    put,
    path = "/groups/{id}",
    tag = "Groups",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Group ID")),
    request_body = UpdateGroupRequest,
    responses(
        (status = 200, description = "Group updated", body = Group),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Duplicate code", body = ApiErrorBody),
    ),
)]
pub async fn update_group(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
    Json(body): Json<UpdateGroupRequest>,
) -> Result<Json<Group>, ApiError> {
    validate_code(body.code.as_deref())?;

    let changes = UpdateGroup {
        code: body.code.map(|c| c.trim().to_string()),
        year: body.year,
        faculty: body.faculty,
        specialization: body.specialization,
    };

    if changes.is_empty() {
        return get_group(State(state), Path(id)).await;
    }

    let mut conn = state.db.get().await?;
    diesel::update(groups::table.find(id))
        .set(&changes)
        .returning(Group::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(|e| ApiError::on_constraint(e, duplicate_code, still_referenced))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Group not found"))
}

// ---------------------------------------------------------------------------
// DELETE /groups/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/groups/{id}",
    tag = "Groups",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Group ID")),
    responses(
        (status = 200, description = "Group deleted", body = DeletedResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Group still has timetable entries", body = ApiErrorBody),
    ),
)]
pub async fn delete_group(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let mut conn = state.db.get().await?;
    let deleted = diesel::delete(groups::table.find(id))
        .execute(&mut conn)
        .await
        .map_err(|e| ApiError::on_constraint(e, duplicate_code, still_referenced))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Group not found"));
    }

    tracing::info!(group_id = id, "group deleted");
    Ok(Json(DeletedResponse {
        message: format!("Group {id} deleted"),
    }))
}
