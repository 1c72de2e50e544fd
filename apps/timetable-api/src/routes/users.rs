//! Account management for administrators.
//!
//! Accounts created without a password stay inactive until their owner sets
//! one through the verification code flow.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use scoped_futures::ScopedFutureExt;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::middleware::AdminUser;
use crate::auth::password::{hash_password, MIN_PASSWORD_LEN};
use crate::db::schema::{groups, user_groups, users};
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::user::{
    self, normalize_username, NewUser, UpdateUser, User, UserResponse, UserRole,
};
use crate::routes::DeletedResponse;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", put(update_user).delete(delete_user))
}

fn duplicate_username() -> ApiError {
    ApiError::conflict("Username already exists")
}

fn unknown_group() -> ApiError {
    ApiError::bad_request("Group does not exist")
}

fn validate(username: Option<&str>, password: Option<&str>) -> Result<(), ApiError> {
    let mut errors = Vec::new();
    if let Some(username) = username {
        let username = username.trim();
        if username.is_empty() || !username.contains('@') {
            errors.push(FieldError {
                field: "username".to_string(),
                message: "Username must be an email address".to_string(),
            });
        }
    }
    if password.is_some_and(|p| p.chars().count() < MIN_PASSWORD_LEN) {
        errors.push(FieldError {
            field: "password".to_string(),
            message: format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        });
    }
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }
    Ok(())
}

/// Replace a user's group membership. `None` removes it.
async fn set_user_group(
    conn: &mut AsyncPgConnection,
    user_id: i32,
    group_id: Option<i32>,
) -> Result<(), ApiError> {
    diesel::delete(user_groups::table.find(user_id))
        .execute(conn)
        .await?;

    if let Some(group_id) = group_id {
        diesel::insert_into(user_groups::table)
            .values((
                user_groups::user_id.eq(user_id),
                user_groups::group_id.eq(group_id),
            ))
            .execute(conn)
            .await
            .map_err(|e| ApiError::on_constraint(e, unknown_group, unknown_group))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GET /users
// ---------------------------------------------------------------------------

/// `GET /users`: Every account with its group.
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Accounts", body = Vec<UserResponse>),
        (status = 403, description = "Not an administrator", body = ApiErrorBody),
    ),
)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let mut conn = state.db.get().await?;

    let rows: Vec<User> = users::table
        .order(users::username.asc())
        .select(User::as_select())
        .load(&mut conn)
        .await?;

    let mut memberships: HashMap<i32, (i32, String)> = user_groups::table
        .inner_join(groups::table)
        .select((user_groups::user_id, groups::id, groups::code))
        .load::<(i32, i32, String)>(&mut conn)
        .await?
        .into_iter()
        .map(|(user_id, group_id, code)| (user_id, (group_id, code)))
        .collect();

    let body = rows
        .into_iter()
        .map(|u| {
            let group = memberships.remove(&u.id);
            UserResponse::new(u, group)
        })
        .collect();

    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// POST /users
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    /// Institutional email address.
    pub username: String,
    /// Leave empty to let the owner set it via the verification code flow.
    pub password: Option<String>,
    pub role: UserRole,
    /// Only applied to students.
    pub group_id: Option<i32>,
}

#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    security(("bearer" = [])),
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Validation error or unknown group", body = ApiErrorBody),
        (status = 403, description = "Not an administrator", body = ApiErrorBody),
        (status = 409, description = "Username taken", body = ApiErrorBody),
    ),
)]
pub async fn create_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let password = body.password.filter(|p| !p.is_empty());
    validate(Some(&body.username), password.as_deref())?;

    let username = normalize_username(&body.username);
    let password_hash = password.as_deref().map(hash_password).transpose()?;
    let group_id = body.group_id.filter(|_| body.role == UserRole::Student);
    let role = body.role;

    let mut conn = state.db.get().await?;
    let created = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let created: User = diesel::insert_into(users::table)
                    .values(NewUser {
                        username: &username,
                        password_hash: password_hash.as_deref(),
                        role,
                        is_active: password_hash.is_some(),
                    })
                    .returning(User::as_returning())
                    .get_result(conn)
                    .await
                    .map_err(|e| ApiError::on_constraint(e, duplicate_username, unknown_group))?;

                set_user_group(conn, created.id, group_id).await?;
                let group = user::find_group(conn, created.id).await?;
                Ok(UserResponse::new(created, group))
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(user_id = created.id, role = %created.role, "user created");
    Ok((StatusCode::CREATED, Json(created)))
}

// ---------------------------------------------------------------------------
// PUT /users/{id}
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub role: Option<UserRole>,
    pub group_id: Option<i32>,
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = UserResponse),
        (status = 400, description = "Validation error or unknown group", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
        (status = 409, description = "Username taken", body = ApiErrorBody),
    ),
)]
pub async fn update_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i32>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let password = body.password.filter(|p| !p.is_empty());
    validate(body.username.as_deref(), password.as_deref())?;

    let password_hash = password.as_deref().map(hash_password).transpose()?;
    let changes = UpdateUser {
        username: body.username.as_deref().map(normalize_username),
        is_active: password_hash.as_ref().map(|_| true),
        password_hash,
        role: body.role,
    };
    let role_change = body.role;
    let group_id = body.group_id;

    let mut conn = state.db.get().await?;
    let updated = conn
        .transaction::<_, ApiError, _>(|conn| {
            async move {
                let row: Option<User> = if changes.is_empty() {
                    users::table
                        .find(id)
                        .select(User::as_select())
                        .first(conn)
                        .await
                        .optional()?
                } else {
                    diesel::update(users::table.find(id))
                        .set(&changes)
                        .returning(User::as_returning())
                        .get_result(conn)
                        .await
                        .optional()
                        .map_err(|e| {
                            ApiError::on_constraint(e, duplicate_username, unknown_group)
                        })?
                };
                let current = row.ok_or_else(|| ApiError::not_found("User not found"))?;

                // Only students keep a group.
                if current.role != UserRole::Student {
                    set_user_group(conn, id, None).await?;
                } else if group_id.is_some() {
                    set_user_group(conn, id, group_id).await?;
                }

                let group = user::find_group(conn, id).await?;
                Ok(UserResponse::new(current, group))
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(user_id = id, role_changed = role_change.is_some(), "user updated");
    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// DELETE /users/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    security(("bearer" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account deleted", body = DeletedResponse),
        (status = 400, description = "Cannot delete yourself", body = ApiErrorBody),
        (status = 404, description = "Not found", body = ApiErrorBody),
    ),
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i32>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if admin.user_id == id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let mut conn = state.db.get().await?;
    let deleted = diesel::delete(users::table.find(id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(user_id = id, "user deleted");
    Ok(Json(DeletedResponse {
        message: format!("User {id} deleted"),
    }))
}
