use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::parse_flag;
use crate::error::{AppError, AppResult};
use crate::services::block_lock_service::BlockLockState;
use crate::services::{admin_service, ownership_service};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct CancelForm {
    pub cancelled: String,
}

#[derive(Debug, Deserialize)]
pub struct CapacityForm {
    // Empty clears the override.
    pub capacity: Option<String>,
}

fn lock_response(result: AppResult<BlockLockState>, block_id: i64) -> Response {
    match result {
        Ok(state) => Json(json!({
            "block_id": block_id,
            "locked": state == BlockLockState::Locked,
        }))
        .into_response(),
        Err(e) => {
            warn!("Block lock change failed: {}", e);
            e.into_response()
        }
    }
}

pub async fn lock_block_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(block_id): Path<i64>,
    State(state): State<AppState>,
) -> Response {
    lock_response(
        admin_service::lock_block(&state.engine, auth_user.id, block_id).await,
        block_id,
    )
}

pub async fn unlock_block_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(block_id): Path<i64>,
    State(state): State<AppState>,
) -> Response {
    lock_response(
        admin_service::unlock_block(&state.engine, auth_user.id, block_id).await,
        block_id,
    )
}

pub async fn cancel_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(scheduled_activity_id): Path<i64>,
    State(state): State<AppState>,
    Form(form): Form<CancelForm>,
) -> Response {
    let cancelled = parse_flag(&form.cancelled);
    match admin_service::set_cancelled(&state.engine, auth_user.id, scheduled_activity_id, cancelled).await {
        Ok(()) => Json(json!({
            "scheduled_activity_id": scheduled_activity_id,
            "cancelled": cancelled,
        }))
        .into_response(),
        Err(e) => {
            warn!("Cancel toggle failed: {}", e);
            e.into_response()
        }
    }
}

pub async fn capacity_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(scheduled_activity_id): Path<i64>,
    State(state): State<AppState>,
    Form(form): Form<CapacityForm>,
) -> Response {
    let capacity = match form.capacity.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => match raw.parse::<i64>() {
            Ok(v) => Some(v),
            Err(_) => return AppError::MalformedPayload.into_response(),
        },
    };
    let now = Local::now().naive_local();
    match admin_service::set_capacity(&state.engine, auth_user.id, scheduled_activity_id, capacity, now).await {
        Ok(()) => Json(json!({
            "scheduled_activity_id": scheduled_activity_id,
            "capacity": capacity,
        }))
        .into_response(),
        Err(e) => {
            warn!("Capacity change failed: {}", e);
            e.into_response()
        }
    }
}

pub async fn delete_user_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(user_id): Path<i64>,
    State(state): State<AppState>,
) -> Response {
    let now = Local::now().naive_local();
    match ownership_service::delete_user(&state.engine, auth_user.id, user_id, now).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            warn!("User deletion failed: {}", e);
            e.into_response()
        }
    }
}

pub async fn delete_activity_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    Path(activity_id): Path<i64>,
    State(state): State<AppState>,
) -> Response {
    let now = Local::now().naive_local();
    match ownership_service::delete_activity(&state.engine, auth_user.id, activity_id, now).await {
        Ok(summary) => Json(summary).into_response(),
        Err(e) => {
            warn!("Activity deletion failed: {}", e);
            e.into_response()
        }
    }
}
