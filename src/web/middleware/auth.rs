use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use tracing::warn;

use crate::database::user_repo;
use crate::web::AppState;

#[derive(Clone, Copy, Debug)]
pub struct AuthenticatedUser {
    pub id: i64,
}

#[derive(Deserialize)]
struct JwtPayload {
    sub: String,
}

/// Read the user id out of the `access_token` cookie. The portal's login
/// service has already verified the token; only the payload is decoded here.
fn user_id_from_cookies(cookies: &str) -> Option<i64> {
    let token = cookies
        .split(';')
        .map(str::trim)
        .find_map(|c| c.strip_prefix("access_token="))?;

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }
    let payload_bytes = general_purpose::URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
    let payload = serde_json::from_slice::<JwtPayload>(&payload_bytes).ok()?;
    payload.sub.trim().parse().ok()
}

pub async fn require_auth(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let user_id = request
        .headers()
        .get(header::COOKIE)
        .and_then(|hv| hv.to_str().ok())
        .and_then(user_id_from_cookies);

    if let Some(user_id) = user_id {
        let known = match state.engine.pool().acquire().await {
            Ok(mut conn) => user_repo::load_user(&mut conn, user_id).await.map(|u| u.is_some()),
            Err(e) => Err(e),
        };
        match known {
            Ok(true) => {
                request.extensions_mut().insert(AuthenticatedUser { id: user_id });
                return next.run(request).await;
            }
            Ok(false) => warn!(user_id, "token for unknown user"),
            Err(e) => warn!(error = %e, "user lookup during auth failed"),
        }
    }

    (StatusCode::UNAUTHORIZED, "Unauthorized - Please login").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(sub: &str) -> String {
        let payload = general_purpose::URL_SAFE_NO_PAD.encode(format!("{{\"sub\":\"{sub}\"}}"));
        format!("eyJhbGciOiJub25lIn0.{payload}.sig")
    }

    #[test]
    fn reads_numeric_subject() {
        let cookies = format!("theme=dark; access_token={}", token("42"));
        assert_eq!(user_id_from_cookies(&cookies), Some(42));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert_eq!(user_id_from_cookies("access_token=garbage"), None);
        assert_eq!(user_id_from_cookies(&format!("access_token={}", token("jdoe"))), None);
        assert_eq!(user_id_from_cookies("other=1"), None);
    }
}
