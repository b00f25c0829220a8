use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    middleware::roles::FacultyUser,
    models::auth::AuthenticatedUser,
    routes::{service_error, ApiError},
    services::notifications::{HistoryPage, HistoryQuery, NotificationService},
    AppState,
};

pub async fn history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    let page = NotificationService::history(state.store.as_ref(), &user, &query)
        .await
        .map_err(service_error)?;
    Ok(Json(page))
}

/// Withdraw one of the caller's own status notifications.
pub async fn undo(
    State(state): State<AppState>,
    FacultyUser(user): FacultyUser,
    Path(timestamp): Path<String>,
) -> Result<Json<Value>, ApiError> {
    NotificationService::undo(state.store.as_ref(), &user, &timestamp)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "message": "Notification withdrawn" })))
}
