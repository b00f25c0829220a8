use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::models::auth::AuthenticatedUser;
use crate::services::auth::AuthService;

pub type AuthRejection = (StatusCode, Json<Value>);

fn reject(status: StatusCode, message: &str) -> AuthRejection {
    (status, Json(json!({ "error": message })))
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, "Invalid Authorization header format"))?;

        let secret = parts.extensions.get::<JwtSecret>().ok_or_else(|| {
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Session secret not configured")
        })?;

        AuthService::decode_session_token(token, &secret.0)
            .map_err(|_| reject(StatusCode::UNAUTHORIZED, "Invalid or expired session"))
    }
}

/// Extension type to carry the session signing secret through request extensions.
#[derive(Clone)]
pub struct JwtSecret(pub String);
