//! Room endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AdminUser;
use crate::db::schema::rooms;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::room::{NewRoom, Room, UpdateRoom};
use crate::routes::DeletedResponse;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route(
            "/rooms/{id}",
            get(get_room).put(update_room).delete(delete_room),
        )
}

fn duplicate_code() -> ApiError {
    ApiError::conflict("A room with this code already exists")
}

fn still_referenced() -> ApiError {
    ApiError::conflict("Room is still used by timetable entries")
}

fn validate(code: Option<&str>, capacity: Option<i32>) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if code.is_some_and(|c| c.trim().is_empty()) {
        errors.push(FieldError {
            field: "code".to_string(),
            message: "Room code is required".to_string(),
        });
    }
    if capacity.is_some_and(|c| c < 0) {
        errors.push(FieldError {
            field: "capacity".to_string(),
            message: "Capacity cannot be negative".to_string(),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GET /rooms
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/rooms",
    tag = "Rooms",
    responses((status = 200, description = "Rooms", body = Vec<Room>)),
)]
pub async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<Room>>, ApiError> {
    let mut conn = state.db.get().await?;
    let rows = rooms::table
        .order(rooms::code.asc())
        .select(Room::as_select())
        .load(&mut conn)
        .await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /rooms/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "Rooms",
    params(("id" = i32, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room", body = Room),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn get_room(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Room>, ApiError> {
    let mut conn = state.db.get().await?;
    rooms::table
        .find(id)
        .select(Room::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Room not found"))
}

// ---------------------------------------------------------------------------
// POST /rooms
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    pub code: String,
    pub building: Option<String>,
    pub capacity: Option<i32>,
}

#[utoipa::path(
    post,
    path = "/rooms",
    tag = "Rooms",
    security(("bearer" = [])),
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = Room),
        (status = 400, description = "Validation error", body = ApiErrorBody),
        (status = 409, description = "Duplicate code", body = ApiErrorBody),
    ),
)]
pub async fn create_room(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<Room>), ApiError> {
    validate(Some(&body.code), body.capacity)?;

    let mut conn = state.db.get().await?;
    let room: Room = diesel::insert_into(rooms::table)
        .values(NewRoom {
            code: body.code.trim(),
            building: body.building.as_deref(),
            capacity: body.capacity,
        })
        .returning(Room::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| ApiError::on_constraint(e, duplicate_code, still_referenced))?;

    tracing::info!(room_id = room.id, code = %room.code, "room created");
    Ok((StatusCode::CREATED, Json(room)))
}

// ---------------------------------------------------------------------------
// PUT /rooms/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoomRequest {
    pub code: Option<String>,
    pub building: Option<String>,
    pub capacity: Option<i32>,
}

#[utoipa::path(
    put,
    path = "/rooms/{id}",
    tag = "Rooms",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Room ID")),
    request_body = UpdateRoomRequest,
    responses(
        (status = 200, description = "Room updated", body = Room),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Duplicate code", body = ApiErrorBody),
    ),
)]
pub async fn update_room(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
    Json(body): Json<UpdateRoomRequest>,
) -> Result<Json<Room>, ApiError> {
    validate(body.code.as_deref(), body.capacity)?;

    let changes = UpdateRoom {
        code: body.code.map(|c| c.trim().to_string()),
        building: body.building,
        capacity: body.capacity,
    };
    if changes.is_empty() {
        return get_room(State(state), Path(id)).await;
    }

    let mut conn = state.db.get().await?;
    diesel::update(rooms::table.find(id))
        .set(&changes)
        .returning(Room::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(|e| ApiError::on_constraint(e, duplicate_code, still_referenced))?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Room not found"))
}

// ---------------------------------------------------------------------------
// DELETE /rooms/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/rooms/{id}",
    tag = "Rooms",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room deleted", body = DeletedResponse),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Room still scheduled", body = ApiErrorBody),
    ),
)]
pub async fn delete_room(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let mut conn = state.db.get().await?;
    let deleted = diesel::delete(rooms::table.find(id))
        .execute(&mut conn)
        .await
        .map_err(|e| ApiError::on_constraint(e, duplicate_code, still_referenced))?;

    if deleted == 0 {
        return Err(ApiError::not_found("Room not found"));
    }

    tracing::info!(room_id = id, "room deleted");
    Ok(Json(DeletedResponse {
        message: format!("Room {id} deleted"),
    }))
}
