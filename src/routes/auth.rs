use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{
    models::{
        auth::AuthenticatedUser,
        user::{LoginRequest, LoginResponse, UserProfile, UserRole},
    },
    routes::{api_error, service_error, ApiError},
    services::auth::AuthService,
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let outcome = AuthService::login(
        state.store.as_ref(),
        &body.username,
        &body.password,
        &state.config.session_secret,
        state.config.session_ttl_seconds,
    )
    .await
    .map_err(service_error)?;

    match outcome {
        Some(response) => Ok(Json(response)),
        None => Err(api_error(
            StatusCode::UNAUTHORIZED,
            "Invalid credentials. Please try again.",
        )),
    }
}

/// Sessions are stateless; the client drops its token.
pub async fn logout(user: AuthenticatedUser) -> Json<Value> {
    tracing::info!("User {} logged out", user.username);
    Json(json!({ "message": "Logged out" }))
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserProfile>, ApiError> {
    let row = state
        .store
        .find_user(&user.username)
        .await
        .map_err(|e| service_error(e.into()))?
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "User not found"))?;
    Ok(Json(UserProfile::from(row)))
}

/// Features reachable from the dashboard for a role.
pub fn features_for(role: UserRole) -> Vec<&'static str> {
    match role {
        UserRole::Faculty => vec!["timetable", "notifications", "absence_inbox", "monthly_report"],
        UserRole::Student => vec!["timetable", "notifications", "absence_reports"],
        UserRole::Admin => vec!["admin_panel"],
    }
}

pub async fn dashboard(user: AuthenticatedUser) -> Json<Value> {
    Json(json!({
        "username": user.username,
        "role": user.role,
        "role_label": user.role.label(),
        "division": user.division,
        "features": features_for(user.role),
    }))
}
