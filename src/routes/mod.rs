pub mod absence;
pub mod admin;
pub mod auth;
pub mod health;
pub mod metrics;
pub mod notifications;
pub mod reports;
pub mod timetable;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::{middleware::auth::JwtSecret, services::ServiceError, store::StoreError, AppState};

pub type ApiError = (StatusCode, Json<Value>);

pub fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

pub fn service_error(e: ServiceError) -> ApiError {
    match e {
        ServiceError::BadRequest(m) => api_error(StatusCode::BAD_REQUEST, m),
        ServiceError::NotFound(m) => api_error(StatusCode::NOT_FOUND, m),
        ServiceError::Conflict(m) => api_error(StatusCode::CONFLICT, m),
        ServiceError::Forbidden(m) => api_error(StatusCode::FORBIDDEN, m),
        ServiceError::Store(StoreError::Conflict(m)) => api_error(StatusCode::CONFLICT, m),
        ServiceError::Store(e) => {
            error!("Store error: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error connecting to database: {e}"),
            )
        }
        ServiceError::Other(e) => {
            error!("Internal error: {:#}", e);
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// Current local wall-clock time; notification dates and weekdays are local.
pub(crate) fn local_now() -> chrono::NaiveDateTime {
    chrono::Local::now().naive_local()
}

fn cors_layer(base_url: String) -> CorsLayer {
    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == base_url
    });

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_origin(origin)
}

pub fn router(state: AppState) -> Router {
    let jwt_secret = JwtSecret(state.config.session_secret.clone());
    let cors = cors_layer(state.config.app_base_url.clone());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics_handler))
        // Session
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/dashboard", get(auth::dashboard))
        // Timetable
        .route("/timetable", get(timetable::view))
        .route("/timetable/report", post(timetable::report_slot))
        .route("/timetable/export.csv", get(timetable::export_csv))
        // Notifications
        .route("/notifications/history", get(notifications::history))
        .route("/notifications/{timestamp}", delete(notifications::undo))
        // Student absence reports and faculty responses
        .route("/absence", post(absence::submit))
        .route("/absence/options", get(absence::options))
        .route("/absence/mine", get(absence::mine))
        .route("/absence/inbox", get(absence::inbox))
        .route("/absence/{timestamp}/respond", post(absence::respond))
        .route("/absence/{timestamp}", delete(absence::dismiss))
        // Monthly report
        .route("/reports/monthly/options", get(reports::options))
        .route("/reports/monthly", get(reports::monthly))
        .route("/reports/monthly/export", get(reports::export))
        // Admin
        .route("/admin/faculty", get(admin::list_faculty).post(admin::create_faculty))
        .route(
            "/admin/faculty/{username}",
            put(admin::update_faculty).delete(admin::delete_faculty),
        )
        .layer(axum::Extension(jwt_secret))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
