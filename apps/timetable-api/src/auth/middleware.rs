//! Bearer token extractors.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::tokens;
use crate::models::user::UserRole;
use crate::AppState;

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub role: UserRole,
}

/// An authenticated user whose role is `admin`.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

/// Rejection returned when the bearer token is missing, invalid or lacks
/// the required role.
pub struct AuthError {
    status: StatusCode,
    message: &'static str,
}

impl AuthError {
    fn unauthorized(message: &'static str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message,
        }
    }

    fn forbidden(message: &'static str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let code = if self.status == StatusCode::FORBIDDEN {
            "FORBIDDEN"
        } else {
            "UNAUTHORIZED"
        };
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": self.message
            }
        });
        (self.status, Json(body)).into_response()
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AuthError::unauthorized("Missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::unauthorized("Invalid Authorization header format"))?;

        let data = tokens::lookup_access_token(state.kv.as_ref(), token)
            .await
            .map_err(|_| AuthError::unauthorized("Token lookup failed"))?
            .ok_or(AuthError::unauthorized("Invalid or expired token"))?;

        Ok(AuthUser {
            user_id: data.user_id,
            role: data.role,
        })
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Admin {
            return Err(AuthError::forbidden("Administrator access required"));
        }
        Ok(AdminUser(user))
    }
}
