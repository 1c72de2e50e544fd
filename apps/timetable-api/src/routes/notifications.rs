//! Email notifications after a batch of timetable edits.

use std::collections::HashSet;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::middleware::AdminUser;
use crate::error::{ApiError, ApiErrorBody};
use crate::notify::fanout::NotificationReport;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/schedule/notifications/batch", post(notify_batch))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchNotificationRequest {
    /// Groups touched by the edits. Duplicates are ignored.
    pub modified_group_ids: Vec<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BatchNotificationResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: NotificationReport,
}

// ---------------------------------------------------------------------------
// POST /schedule/notifications/batch
// ---------------------------------------------------------------------------

/// Email every student of the modified groups. Runs to completion before
/// replying, so large batches take a while.
#[utoipa::path(
    post,
    path = "/schedule/notifications/batch",
    tag = "Notifications",
    security(("bearer" = [])),
    request_body = BatchNotificationRequest,
    responses(
        (status = 200, description = "Batch processed", body = BatchNotificationResponse),
        (status = 403, description = "Not an administrator", body = ApiErrorBody),
        (status = 500, description = "Group directory unavailable", body = ApiErrorBody),
    ),
)]
pub async fn notify_batch(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(body): Json<BatchNotificationRequest>,
) -> Result<Json<BatchNotificationResponse>, ApiError> {
    let group_ids: HashSet<i32> = body.modified_group_ids.into_iter().collect();

    if group_ids.is_empty() {
        return Ok(Json(BatchNotificationResponse {
            message: "No modified groups to notify".to_string(),
            report: NotificationReport::default(),
        }));
    }

    tracing::info!(groups = group_ids.len(), "sending schedule change notifications");
    let report = state.notifier.notify(&group_ids).await?;

    Ok(Json(BatchNotificationResponse {
        message: "Notifications processed".to_string(),
        report,
    }))
}
