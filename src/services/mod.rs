pub mod absence;
pub mod auth;
pub mod faculty;
pub mod loader;
pub mod metrics;
pub mod notifications;
pub mod reports;
pub mod timetable;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Teaching days shown in the week view, in order.
pub const WEEK_DAYS: [&str; 6] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday"];

/// Full English weekday name, as stored in the timetable ("Monday").
pub fn weekday_name(date: NaiveDate) -> String {
    date.format("%A").to_string()
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64)
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

/// First three characters of a faculty username, upper-cased; "FAC" when blank.
pub fn faculty_short(username: &str) -> String {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        return "FAC".to_string();
    }
    trimmed.chars().take(3).collect::<String>().to_uppercase()
}
