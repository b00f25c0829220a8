use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::{
    middleware::roles::FacultyUser,
    models::report::{MonthlyReport, MonthlyReportQuery, ReportOptions},
    routes::{api_error, local_now, service_error, ApiError},
    services::{
        metrics::EXPORTS_COUNTER,
        reports::{export_filename, export_xlsx, ReportService},
    },
    AppState,
};

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub async fn options(
    State(state): State<AppState>,
    FacultyUser(user): FacultyUser,
) -> Result<Json<ReportOptions>, ApiError> {
    let options = ReportService::options(state.store.as_ref(), &user, local_now().date())
        .await
        .map_err(service_error)?;
    Ok(Json(options))
}

pub async fn monthly(
    State(state): State<AppState>,
    FacultyUser(user): FacultyUser,
    Query(query): Query<MonthlyReportQuery>,
) -> Result<Json<MonthlyReport>, ApiError> {
    let report = ReportService::monthly(state.store.as_ref(), &user, &query)
        .await
        .map_err(service_error)?;
    Ok(Json(report))
}

pub async fn export(
    State(state): State<AppState>,
    FacultyUser(user): FacultyUser,
    Query(query): Query<MonthlyReportQuery>,
) -> Result<Response, ApiError> {
    let report = ReportService::monthly(state.store.as_ref(), &user, &query)
        .await
        .map_err(service_error)?;
    let bytes = export_xlsx(&report.summary)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    EXPORTS_COUNTER.with_label_values(&["xlsx"]).inc();

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_filename(&query.division, query.month, query.year)
    );
    Ok((
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
