pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, post},
    Router,
};
use http::header::{HeaderValue, CACHE_CONTROL};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::services::signup_service::SignupEngine;
use crate::web::routes::{admin, signup};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SignupEngine>,
}

impl AppState {
    pub fn new(engine: SignupEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

/// Every route needs an identity; there are no public pages here.
pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/eighth/signup", post(signup::signup_handler))
        .route("/eighth/unsignup", post(signup::unsignup_handler))
        .route("/eighth/favorite", post(signup::favorite_handler))
        .route("/eighth/waitlist/leave", post(signup::leave_waitlist_handler))
        .route("/eighth/blocks/:block_id/lock", post(admin::lock_block_handler))
        .route("/eighth/blocks/:block_id/unlock", post(admin::unlock_block_handler))
        .route(
            "/eighth/scheduled/:scheduled_activity_id/cancel",
            post(admin::cancel_handler),
        )
        .route(
            "/eighth/scheduled/:scheduled_activity_id/capacity",
            post(admin::capacity_handler),
        )
        .route("/eighth/users/:user_id", delete(admin::delete_user_handler))
        .route(
            "/eighth/activities/:activity_id",
            delete(admin::delete_activity_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(protected_routes)
        .layer(SetResponseHeaderLayer::if_not_present(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
