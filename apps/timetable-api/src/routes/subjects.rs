//! Subject (course) endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AdminUser;
use crate::db::schema::subjects;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::subject::{NewSubject, Subject, UpdateSubject};
use crate::routes::DeletedResponse;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subjects", get(list_subjects).post(create_subject))
        .route(
            "/subjects/{id}",
            get(get_subject)
                .put(update_subject)
                .delete(delete_subject),
        )
}

fn duplicate_code() -> ApiError {
    ApiError::conflict("A subject with this code already exists")
}

fn still_referenced() -> ApiError {
    ApiError::conflict("Subject is still used by timetable entries")
}

fn validate(name: Option<&str>, code: Option<&str>) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if name.is_some_and(|n| n.trim().is_empty()) {
        errors.push(FieldError {
            field: "name".to_string(),
            message: "Subject name is required".to_string(),
        });
    }
    if code.is_some_and(|c| c.trim().is_empty()) {
        errors.push(FieldError {
            field: "code".to_string(),
            message: "Subject code is required".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GET /subjects
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/subjects",
    tag = "Subjects",
    responses((status = 200, description = "Subjects", body = Vec<Subject>)),
)]
pub async fn list_subjects(
    State(state): State<AppState>,
) -> Result<Json<Vec<Subject>>, ApiError> {
    let mut conn = state.db.get().await?;
    let rows = subjects::table
        .order(subjects::name.asc())
        .select(Subject::as_select())
        .load(&mut conn)
        .await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /subjects/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/subjects/{id}",
    tag = "Subjects",
    params(("id" = i32, Path, description = "Subject ID")),
    responses(
        (status = 200, description = "Subject", body = Subject),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn get_subject(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Subject>, ApiError> {
    let mut conn = state.db.get().await?;
    subjects::table
        .find(id)
        .select(Subject::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Subject not found"))
}

// ---------------------------------------------------------------------------
// POST /subjects
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSubjectRequest {
    pub name: String,
    pub code: String,
    pub semester: Option<String>,
}

#[utoipa::path(
    post,
    path = "/subjects",
    tag = "Subjects",
    security(("bearer" = [])),
    request_body = CreateSubjectRequest,
    responses(
        (status = 201, description = "Subject created", body = Subject),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 409, description = "Duplicate code", body = ApiErrorBody),
    ),
)]
pub async fn create_subject(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<CreateSubjectRequest>,
) -> Result<(StatusCode, Json<Subject>), ApiError> {
    validate(Some(&body.name), Some(&body.code))?;

    let mut conn = state.db.get().await?;
    let subject: Subject = diesel::insert_into(subjects::table)
        .values(NewSubject {
            name: body.name.trim(),
            code: body.code.trim(),
            semester: body.semester.as_deref(),
        })
        .returning(Subject::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| ApiError::on_constraint(e, duplicate_code, still_referenced))?;

    tracing::info!(subject_id = subject.id, code = %subject.code, "subject created");
    Ok((StatusCode::CREATED, Json(subject)))
}

// ---------------------------------------------------------------------------
// PUT /subjects/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateSubjectRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    pub semester: Option<String>,
}

#[utoipa::path(
    put,
    path = "/subjects/{id}",
    tag = "Subjects",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Subject ID")),
    request_body = UpdateSubjectRequest,
    responses(
        (status = 200, description = "Subject updated", body = Subject),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Duplicate code", body = ApiErrorBody),
    ),
)]
pub async fn update_subject(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
    Json(body): Json<UpdateSubjectRequest>,
) -> Result<Json<Subject>, ApiError> {
    validate(body.name.as_deref(), body.code.as_deref())?;

    let changes = UpdateSubject {
        name: body.name.map(|n| n.trim().to_string()),
        code: body.code.map(|c| c.trim().to_string()),
        semester: body.semester,
    };
    if changes.is_empty() {
        return get_subject(State(state), Path(id)).await;
    }

    let mut conn = state.db.get().await?;
    diesel::update(subjects::table.find(id))
        .set(&changes)
        .returning(Subject::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(|e| ApiError::on_constraint(e, duplicate_code, still_referenced))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Subject not found"))
}

// ---------------------------------------------------------------------------
// DELETE /subjects/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/subjects/{id}",
    tag = "Subjects",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Subject ID")),
    responses(
        (status = 200, description = "Subject deleted", body = DeletedResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Subject still scheduled", body = ApiErrorBody),
    ),
)]
pub async fn delete_subject(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let mut conn = state.db.get().await?;
    let deleted = diesel::delete(subjects::table.find(id))
        .execute(&mut conn)
        .await
        .map_err(|e| ApiError::on_constraint(e, duplicate_code, still_referenced))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Subject not found"));
    }

    tracing::info!(subject_id = id, "subject deleted");
    Ok(Json(DeletedResponse {
        message: format!("Subject {id} deleted"),
    }))
}
