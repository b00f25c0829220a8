use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    middleware::roles::AdminUser,
    models::user::{CreateFacultyRequest, UpdateFacultyRequest, UserProfile},
    routes::{service_error, ApiError},
    AppState,
};

pub async fn list_faculty(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let rows = state
        .faculty
        .list(state.store.as_ref())
        .await
        .map_err(service_error)?;
    Ok(Json(rows))
}

pub async fn create_faculty(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<CreateFacultyRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let created = state
        .faculty
        .create(state.store.as_ref(), &body)
        .await
        .map_err(service_error)?;
    tracing::info!("{} added faculty {}", admin.username, created.username);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_faculty(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(username): Path<String>,
    Json(body): Json<UpdateFacultyRequest>,
) -> Result<Json<Value>, ApiError> {
    state
        .faculty
        .update(state.store.as_ref(), &username, &body)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "message": format!("Updated {username}") })))
}

pub async fn delete_faculty(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .faculty
        .delete(state.store.as_ref(), &username)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "message": format!("Deleted {username}") })))
}
