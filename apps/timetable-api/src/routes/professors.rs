//! Professor endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AdminUser;
use crate::db::schema::professors;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::professor::{NewProfessor, Professor, UpdateProfessor};
use crate::routes::DeletedResponse;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/professors", get(list_professors).post(create_professor))
        .route(
            "/professors/{id}",
            get(get_professor)
                .put(update_professor)
                .delete(delete_professor),
        )
}

fn duplicate_email() -> ApiError {
    ApiError::conflict("A professor with this email already exists")
}

fn still_referenced() -> ApiError {
    ApiError::conflict("Professor is still assigned to timetable entries")
}

fn validate_name(full_name: Option<&str>) -> Result<(), ApiError> {
    if full_name.is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::validation(vec![FieldError {
            field: "full_name".to_string(),
            message: "Full name is required".to_string(),
        }]));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GET /professors
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/professors",
    tag = "Professors",
    responses((status = 200, description = "Professors", body = Vec<Professor>)),
)]
pub async fn list_professors(
    State(state): State<AppState>,
) -> Result<Json<Vec<Professor>>, ApiError> {
    let mut conn = state.db.get().await?;
    let rows = professors::table
        .order(professors::full_name.asc())
        .select(Professor::as_select())
        .load(&mut conn)
        .await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /professors/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/professors/{id}",
    tag = "Professors",
    params(("id" = i32, Path, description = "Professor ID")),
    responses(
        (status = 200, description = "Professor", body = Professor),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn get_professor(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Professor>, ApiError> {
    let mut conn = state.db.get().await?;
    professors::table
        .find(id)
        .select(Professor::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Professor not found"))
}

// ---------------------------------------------------------------------------
// POST /professors
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateProfessorRequest {
    pub full_name: String,
    pub department: Option<String>,
    pub email: Option<String>,
}

#[utoipa::path(
    post,
    path = "/professors",
    tag = "Professors",
    security(("bearer" = [])),
    request_body = CreateProfessorRequest,
    responses(
        (status = 201, description = "Professor created", body = Professor),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 409, description = "Duplicate email", body = ApiErrorBody),
    ),
)]
pub async fn create_professor(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<CreateProfessorRequest>,
) -> Result<(StatusCode, Json<Professor>), ApiError> {
    validate_name(Some(&body.full_name))?;
    let email = body.email.map(|e| e.trim().to_lowercase());

    let mut conn = state.db.get().await?;
    let professor: Professor = diesel::insert_into(professors::table)
        .values(NewProfessor {
            full_name: body.full_name.trim(),
            department: body.department.as_deref(),
            email: email.as_deref(),
        })
        .returning(Professor::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| ApiError::on_constraint(e, duplicate_email, still_referenced))?;

    tracing::info!(professor_id = professor.id, "professor created");
    Ok((StatusCode::CREATED, Json(professor)))
}

// ---------------------------------------------------------------------------
// PUT /professors/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProfessorRequest {
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
}

#[utoipa::path(
    put,
    path = "/professors/{id}",
    tag = "Professors",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Professor ID")),
    request_body = UpdateProfessorRequest,
    responses(
        (status = 200, description = "Professor updated", body = Professor),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Duplicate email", body = ApiErrorBody),
    ),
)]
pub async fn update_professor(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
    Json(body): Json<UpdateProfessorRequest>,
) -> Result<Json<Professor>, ApiError> {
    validate_name(body.full_name.as_deref())?;

    let changes = UpdateProfessor {
        full_name: body.full_name.map(|n| n.trim().to_string()),
        department: body.department,
        email: body.email.map(|e| e.trim().to_lowercase()),
    };
    if changes.is_empty() {
        return get_professor(State(state), Path(id)).await;
    }

    let mut conn = state.db.get().await?;
    diesel::update(professors::table.find(id))
        .set(&changes)
        .returning(Professor::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(|e| ApiError::on_constraint(e, duplicate_email, still_referenced))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Professor not found"))
}

// ---------------------------------------------------------------------------
// DELETE /professors/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/professors/{id}",
    tag = "Professors",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Professor ID")),
    responses(
        (status = 200, description = "Professor deleted", body = DeletedResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Professor still scheduled", body = ApiErrorBody),
    ),
)]
pub async fn delete_professor(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let mut conn = state.db.get().await?;
    let deleted = diesel::delete(professors::table.find(id))
        .execute(&mut conn)
        .await
        .map_err(|e| ApiError::on_constraint(e, duplicate_email, still_referenced))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Professor not found"));
    }

    tracing::info!(professor_id = id, "professor deleted");
    Ok(Json(DeletedResponse {
        message: format!("Professor {id} deleted"),
    }))
}
