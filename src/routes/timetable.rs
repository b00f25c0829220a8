use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::{
    middleware::roles::FacultyUser,
    models::{auth::AuthenticatedUser, notification::Notification, split_list},
    routes::{api_error, local_now, service_error, ApiError},
    services::{
        metrics::EXPORTS_COUNTER,
        timetable::{SlotReportRequest, TimetableService, TimetableView, ViewMode},
    },
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct TimetableQuery {
    #[serde(default)]
    pub view: ViewMode,
    /// Comma-separated subject subset; absent means every subject.
    pub subjects: Option<String>,
}

impl TimetableQuery {
    fn selected(&self) -> Option<Vec<String>> {
        self.subjects.as_deref().map(split_list)
    }
}

pub async fn view(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<TimetableQuery>,
) -> Result<Json<TimetableView>, ApiError> {
    let selected = query.selected();
    let view = TimetableService::view(
        state.store.as_ref(),
        &user,
        query.view,
        selected.as_deref(),
        local_now().date(),
    )
    .await
    .map_err(service_error)?;
    Ok(Json(view))
}

pub async fn report_slot(
    State(state): State<AppState>,
    FacultyUser(user): FacultyUser,
    Json(body): Json<SlotReportRequest>,
) -> Result<(StatusCode, Json<Notification>), ApiError> {
    let created = TimetableService::report_slot(state.store.as_ref(), &user, &body, local_now())
        .await
        .map_err(service_error)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn export_csv(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<TimetableQuery>,
) -> Result<Response, ApiError> {
    let entries = TimetableService::for_user(state.store.as_ref(), &user)
        .await
        .map_err(|e| service_error(e.into()))?;
    let selected = query.selected();
    let entries = TimetableService::select_subjects(entries, selected.as_deref());

    let bytes = TimetableService::export_csv(&entries)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    EXPORTS_COUNTER.with_label_values(&["csv"]).inc();

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"timetable.csv\""),
        ],
        bytes,
    )
        .into_response())
}
