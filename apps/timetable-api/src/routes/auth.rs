//! Login and first-time password setup.
//!
//! Accounts are created by an administrator without a password. The owner
//! proves control of the email address with a one-time code and picks a
//! password, after which the normal login applies.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AuthUser;
use crate::auth::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::auth::tokens::{self, AccessTokenData};
use crate::auth::verification;
use crate::db::schema::users;
use crate::error::{ApiError, ApiErrorBody, FieldError};
use crate::models::user::{self, User, UserResponse, UserRole};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/check-email", post(check_email))
        .route("/auth/send-verification-code", post(send_verification_code))
        .route(
            "/auth/verify-code-and-set-password",
            post(verify_code_and_set_password),
        )
        .route("/auth/login", post(login))
        .route("/auth/me", get(me))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub role: UserRole,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

async fn issue_token(state: &AppState, user: &User) -> Result<TokenResponse, ApiError> {
    let access_token = tokens::issue_access_token(
        state.kv.as_ref(),
        &AccessTokenData {
            user_id: user.id,
            role: user.role,
        },
    )
    .await?;

    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        role: user.role,
    })
}

// ---------------------------------------------------------------------------
// POST /auth/check-email
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckEmailResponse {
    pub exists: bool,
    pub has_password: bool,
    pub message: String,
}

/// `POST /auth/check-email`: Whether an account exists and has a password.
#[utoipa::path(
    post,
    path = "/auth/check-email",
    tag = "Auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Account status", body = CheckEmailResponse),
    ),
)]
pub async fn check_email(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<CheckEmailResponse>, ApiError> {
    let mut conn = state.db.get().await?;
    let found = user::find_by_username(&mut conn, &body.email).await?;

    let resp = match found {
        None => CheckEmailResponse {
            exists: false,
            has_password: false,
            message: "Email not found. Ask an administrator to create your account.".to_string(),
        },
        Some(u) if u.has_password() => CheckEmailResponse {
            exists: true,
            has_password: true,
            message: "Account exists and has a password.".to_string(),
        },
        Some(_) => CheckEmailResponse {
            exists: true,
            has_password: false,
            message: "Account exists but has no password yet. You can set one now.".to_string(),
        },
    };

    Ok(Json(resp))
}

// ---------------------------------------------------------------------------
// POST /auth/send-verification-code
// ---------------------------------------------------------------------------

/// Look up an account that is still waiting for its first password.
async fn pending_account(state: &AppState, email: &str) -> Result<User, ApiError> {
    let mut conn = state.db.get().await?;
    let user = user::find_by_username(&mut conn, email)
        .await?
        .ok_or_else(|| ApiError::not_found("Email not found"))?;

    if user.has_password() {
        return Err(ApiError::bad_request(
            "Password already set. Use the normal login.",
        ));
    }
    Ok(user)
}

/// `POST /auth/send-verification-code`: Email a one-time code.
#[utoipa::path(
    post,
    path = "/auth/send-verification-code",
    tag = "Auth",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 400, description = "Password already set", body = ApiErrorBody),
        (status = 404, description = "Unknown email", body = ApiErrorBody),
        (status = 500, description = "Email could not be sent", body = ApiErrorBody),
    ),
)]
pub async fn send_verification_code(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = pending_account(&state, &body.email).await?;
    let code = verification::issue_code(state.kv.as_ref(), user.id).await?;

    state
        .mailer
        .send_verification_code(&user.username, &code)
        .await
        .map_err(|e| {
            tracing::error!(user_id = user.id, error = %e, "verification email failed");
            ApiError::internal("Failed to send verification code")
        })?;

    tracing::info!(user_id = user.id, "verification code sent");
    Ok(Json(MessageResponse {
        message: "Verification code sent. Check your email.".to_string(),
    }))
}

// ---------------------------------------------------------------------------
// POST /auth/verify-code-and-set-password
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    pub email: String,
    pub code: String,
    pub password: String,
}

/// `POST /auth/verify-code-and-set-password`: Redeem a code and log in.
#[utoipa::path(
    post,
    path = "/auth/verify-code-and-set-password",
    tag = "Auth",
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Password set, logged in", body = TokenResponse),
        (status = 400, description = "Invalid, expired or exhausted code", body = ApiErrorBody),
        (status = 404, description = "Unknown email", body = ApiErrorBody),
    ),
)]
pub async fn verify_code_and_set_password(
    State(state): State<AppState>,
    Json(body): Json<SetPasswordRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if body.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(vec![FieldError {
            field: "password".to_string(),
            message: format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        }]));
    }

    let user = pending_account(&state, &body.email).await?;
    verification::check_code(state.kv.as_ref(), user.id, body.code.trim()).await?;

    let hash = hash_password(&body.password)?;
    let mut conn = state.db.get().await?;
    let user: User = diesel::update(users::table.find(user.id))
        .set((
            users::password_hash.eq(Some(hash)),
            users::is_active.eq(true),
        ))
        .returning(User::as_returning())
        .get_result(&mut conn)
        .await?;

    tracing::info!(user_id = user.id, "password set via verification code");
    Ok(Json(issue_token(&state, &user).await?))
}

// ---------------------------------------------------------------------------
// POST /auth/login
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /auth/login`: Exchange email and password for an access token.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 400, description = "No password set yet", body = ApiErrorBody),
        (status = 401, description = "Invalid credentials", body = ApiErrorBody),
    ),
)]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let mut conn = state.db.get().await?;
    let user = user::find_by_username(&mut conn, &body.email)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let Some(hash) = user.password_hash.as_deref().filter(|_| user.has_password()) else {
        return Err(ApiError::bad_request(
            "No password set. Use the verification code flow first.",
        ));
    };
    verify_password(&body.password, hash)?;

    Ok(Json(issue_token(&state, &user).await?))
}

// ---------------------------------------------------------------------------
// GET /auth/me
// ---------------------------------------------------------------------------

/// `GET /auth/me`: The authenticated user.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiErrorBody),
    ),
)]
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let mut conn = state.db.get().await?;
    let found: User = users::table
        .find(auth.user_id)
        .select(User::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let group = user::find_group(&mut conn, found.id).await?;

    Ok(Json(UserResponse::new(found, group)))
}
