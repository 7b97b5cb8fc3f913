use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Form, Json,
};
use chrono::Local;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::config::parse_flag;
use crate::services::signup_service::{SignupOutcome, UnsignupOutcome};
use crate::web::middleware::auth::AuthenticatedUser;
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub uid: Option<i64>,
    pub bid: i64,
    pub aid: i64,
    pub force: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UnsignupForm {
    pub uid: Option<i64>,
    pub bid: i64,
    pub force: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FavoriteForm {
    pub aid: i64,
}

#[derive(Debug, Deserialize)]
pub struct LeaveWaitlistForm {
    pub uid: Option<i64>,
    pub bid: i64,
}

fn forced(raw: Option<&str>) -> bool {
    raw.is_some_and(parse_flag)
}

pub async fn signup_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> Response {
    let now = Local::now().naive_local();
    let result = state
        .engine
        .signup(
            auth_user.id,
            form.uid,
            form.bid,
            form.aid,
            forced(form.force.as_deref()),
            now,
        )
        .await;

    match result {
        Ok(SignupOutcome::SignedUp { message }) => {
            (StatusCode::OK, Json(json!({ "success_message": message }))).into_response()
        }
        Ok(SignupOutcome::Waitlisted { position, message }) => (
            StatusCode::ACCEPTED,
            Json(json!({ "waitlisted": true, "position": position, "message": message })),
        )
            .into_response(),
        Ok(SignupOutcome::Rejected(report)) => (StatusCode::FORBIDDEN, Json(report)).into_response(),
        Err(e) => {
            warn!("Signup failed: {}", e);
            e.into_response()
        }
    }
}

pub async fn unsignup_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Form(form): Form<UnsignupForm>,
) -> Response {
    let now = Local::now().naive_local();
    let result = state
        .engine
        .unsignup(auth_user.id, form.uid, form.bid, forced(form.force.as_deref()), now)
        .await;

    match result {
        Ok(UnsignupOutcome::Removed { message }) => {
            (StatusCode::OK, Json(json!({ "success_message": message }))).into_response()
        }
        Ok(UnsignupOutcome::NotSignedUp) => {
            (StatusCode::OK, Json(json!({ "message": "signup did not exist" }))).into_response()
        }
        Ok(UnsignupOutcome::Rejected(report)) => (StatusCode::FORBIDDEN, Json(report)).into_response(),
        Err(e) => {
            warn!("Unsignup failed: {}", e);
            e.into_response()
        }
    }
}

pub async fn favorite_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Form(form): Form<FavoriteForm>,
) -> Response {
    match state.engine.toggle_favorite(auth_user.id, form.aid).await {
        Ok(favorited) => Json(json!({ "favorited": favorited })).into_response(),
        Err(e) => {
            warn!("Favorite toggle failed: {}", e);
            e.into_response()
        }
    }
}

pub async fn leave_waitlist_handler(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(state): State<AppState>,
    Form(form): Form<LeaveWaitlistForm>,
) -> Response {
    match state.engine.leave_waitlist(auth_user.id, form.uid, form.bid).await {
        Ok(removed) => Json(json!({
            "success_message": "Left the waitlist.",
            "removed": removed,
        }))
        .into_response(),
        Err(e) => {
            warn!("Leaving waitlist failed: {}", e);
            e.into_response()
        }
    }
}
