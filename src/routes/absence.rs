use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    middleware::roles::{FacultyUser, StudentUser},
    models::notification::{FacultyResponse, Notification},
    routes::{local_now, service_error, ApiError},
    services::{
        absence::{AbsenceOptions, AbsenceOptionsQuery, AbsenceRequest, AbsenceService, ReportWeek},
        notifications::{InboxItem, NotificationService, RespondRequest},
    },
    AppState,
};

pub async fn options(
    State(state): State<AppState>,
    StudentUser(user): StudentUser,
    Query(query): Query<AbsenceOptionsQuery>,
) -> Result<Json<AbsenceOptions>, ApiError> {
    let options = AbsenceService::options(state.store.as_ref(), &user, &query)
        .await
        .map_err(service_error)?;
    Ok(Json(options))
}

pub async fn submit(
    State(state): State<AppState>,
    StudentUser(user): StudentUser,
    Json(body): Json<AbsenceRequest>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    let created = AbsenceService::submit(state.store.as_ref(), &user, &body, local_now())
        .await
        .map_err(service_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn mine(
    State(state): State<AppState>,
    StudentUser(user): StudentUser,
) -> Result<Json<Vec<ReportWeek>>, ApiError> {
    let weeks = AbsenceService::mine(state.store.as_ref(), &user, local_now().date())
        .await
        .map_err(service_error)?;
    Ok(Json(weeks))
}

pub async fn inbox(
    State(state): State<AppState>,
    FacultyUser(user): FacultyUser,
) -> Result<Json<Vec<InboxItem>>, ApiError> {
    let items = NotificationService::inbox(state.store.as_ref(), &user)
        .await
        .map_err(service_error)?;
    Ok(Json(items))
}

pub async fn respond(
    State(state): State<AppState>,
    FacultyUser(user): FacultyUser,
    Path(timestamp): Path<String>,
    Json(body): Json<RespondRequest>,
) -> Result<Json<FacultyResponse>, ApiError> {
    let response =
        NotificationService::respond(state.store.as_ref(), &user, &timestamp, body.response)
            .await
            .map_err(service_error)?;
    Ok(Json(response))
}

pub async fn dismiss(
    State(state): State<AppState>,
    FacultyUser(user): FacultyUser,
    Path(timestamp): Path<String>,
) -> Result<Json<Value>, ApiError> {
    NotificationService::dismiss(state.store.as_ref(), &user, &timestamp)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "message": "Report deleted" })))
}
