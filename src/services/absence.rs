use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    models::{
        auth::AuthenticatedUser,
        notification::{
            notification_timestamp, Notification, NotificationFilter, STUDENT_ABSENCE_MESSAGE,
            STUDENT_ABSENCE_STATUS,
        },
        timetable::{TimetableEntry, TimetableFilter},
        user::UserRole,
    },
    services::{
        faculty_short, metrics::NOTIFICATIONS_COUNTER, parse_date, week_start, weekday_name,
        ServiceError, ServiceResult,
    },
    store::Store,
};

pub const AWAITING_RESPONSE: &str = "Awaiting response";

#[derive(Debug, Default, Deserialize)]
pub struct AbsenceOptionsQuery {
    pub subject: Option<String>,
    pub faculty: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FacultyOption {
    pub username: String,
    /// "KUM - kumar"
    pub label: String,
}

#[derive(Debug, Serialize)]
pub struct AbsenceOptions {
    pub division: String,
    pub subjects: Vec<String>,
    pub faculty: Vec<FacultyOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    pub times: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AbsenceRequest {
    pub subject: String,
    pub faculty: String,
    pub date: String,
    pub time: String,
}

#[derive(Debug, Serialize)]
pub struct MyReport {
    #[serde(flatten)]
    pub notification: Notification,
    pub response_text: String,
}

#[derive(Debug, Serialize)]
pub struct ReportWeek {
    pub week: i64,
    pub start: String,
    pub end: String,
    pub current: bool,
    pub expanded: bool,
    pub reports: Vec<MyReport>,
}

/// Group a student's reports into weeks counted from the Monday of the
/// earliest report. The week containing `today` comes first and is the only
/// expanded one; the rest follow in ascending order. Rows with an
/// unparseable date are skipped.
pub fn group_by_week(notes: Vec<Notification>, today: NaiveDate) -> Vec<ReportWeek> {
    let mut dated: Vec<(NaiveDate, Notification)> = notes
        .into_iter()
        .filter_map(|n| match parse_date(&n.date) {
            Some(d) => Some((d, n)),
            None => {
                warn!("Skipping report {} with unparseable date '{}'", n.timestamp, n.date);
                None
            }
        })
        .collect();
    dated.sort_by(|(a, na), (b, nb)| a.cmp(b).then_with(|| na.timestamp.cmp(&nb.timestamp)));

    let Some(earliest) = dated.iter().map(|(d, _)| *d).min() else {
        return Vec::new();
    };
    let base = week_start(earliest);
    let week_of = |d: NaiveDate| (d - base).num_days().div_euclid(7) + 1;
    let current = week_of(today);

    let mut weeks: BTreeMap<i64, Vec<MyReport>> = BTreeMap::new();
    for (date, notification) in dated {
        let response_text = notification
            .response
            .as_ref()
            .map(|r| r.message.clone())
            .unwrap_or_else(|| AWAITING_RESPONSE.to_string());
        weeks.entry(week_of(date)).or_default().push(MyReport {
            notification,
            response_text,
        });
    }

    let mut out: Vec<ReportWeek> = weeks
        .into_iter()
        .map(|(week, reports)| {
            let start = base + Duration::days((week - 1) * 7);
            ReportWeek {
                week,
                start: start.format("%Y-%m-%d").to_string(),
                end: (start + Duration::days(6)).format("%Y-%m-%d").to_string(),
                current: week == current,
                expanded: week == current,
                reports,
            }
        })
        .collect();
    // Stable sort keeps the remaining weeks ascending.
    out.sort_by_key(|w| !w.current);
    out
}

pub struct AbsenceService;

impl AbsenceService {
    fn division_of(user: &AuthenticatedUser) -> ServiceResult<&str> {
        user.division
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| ServiceError::BadRequest("No division assigned to your account.".into()))
    }

    async fn division_timetable(
        store: &dyn Store,
        division: &str,
    ) -> ServiceResult<Vec<TimetableEntry>> {
        let rows = store
            .list_timetable(&TimetableFilter::default().division(division))
            .await?;
        if rows.is_empty() {
            return Err(ServiceError::NotFound(
                "No timetable found for your division.".into(),
            ));
        }
        Ok(rows)
    }

    /// Cascading subject → faculty → date → time choices over the division timetable.
    pub async fn options(
        store: &dyn Store,
        user: &AuthenticatedUser,
        query: &AbsenceOptionsQuery,
    ) -> ServiceResult<AbsenceOptions> {
        let division = Self::division_of(user)?;
        let rows = Self::division_timetable(store, division).await?;

        let mut subjects: Vec<String> = rows.iter().map(|e| e.subject.clone()).collect();
        subjects.sort();
        subjects.dedup();

        let mut options = AbsenceOptions {
            division: division.to_string(),
            subjects,
            faculty: Vec::new(),
            day: None,
            times: Vec::new(),
        };

        let Some(subject) = query.subject.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(options);
        };
        let mut faculty: Vec<String> = rows
            .iter()
            .filter(|e| e.subject == subject)
            .map(|e| e.faculty.clone())
            .collect();
        faculty.sort();
        faculty.dedup();
        options.faculty = faculty
            .into_iter()
            .map(|username| FacultyOption {
                label: format!("{} - {}", faculty_short(&username), username),
                username,
            })
            .collect();

        let (Some(faculty), Some(date)) = (
            query.faculty.as_deref().filter(|s| !s.is_empty()),
            query.date.as_deref().filter(|s| !s.is_empty()),
        ) else {
            return Ok(options);
        };
        let date = parse_date(date)
            .ok_or_else(|| ServiceError::BadRequest(format!("Invalid date '{date}'")))?;
        let day = weekday_name(date);
        let mut times: Vec<String> = rows
            .iter()
            .filter(|e| e.subject == subject && e.faculty == faculty && e.day == day)
            .map(|e| e.time.clone())
            .collect();
        times.sort();
        times.dedup();
        options.day = Some(day);
        options.times = times;
        Ok(options)
    }

    pub async fn submit(
        store: &dyn Store,
        user: &AuthenticatedUser,
        req: &AbsenceRequest,
        now: NaiveDateTime,
    ) -> ServiceResult<Notification> {
        let division = Self::division_of(user)?;
        let date = parse_date(&req.date)
            .ok_or_else(|| ServiceError::BadRequest(format!("Invalid date '{}'", req.date)))?;
        let day = weekday_name(date);

        let filter = TimetableFilter::default()
            .division(division)
            .subject(&req.subject)
            .day(&day);
        let entry = store
            .list_timetable(&filter)
            .await?
            .into_iter()
            .find(|e| e.faculty == req.faculty && e.time == req.time)
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "No {} class with {} at {} on {}",
                    req.subject, req.faculty, req.time, day
                ))
            })?;

        let notification = Notification {
            username: user.username.clone(),
            role: UserRole::Student,
            subject: entry.subject,
            division: division.to_string(),
            day,
            date: date.format("%Y-%m-%d").to_string(),
            time: entry.time,
            faculty: entry.faculty,
            class_type: entry.class_type,
            status: STUDENT_ABSENCE_STATUS.to_string(),
            message: STUDENT_ABSENCE_MESSAGE.to_string(),
            timestamp: notification_timestamp(now),
            response: None,
        };
        store.insert_notification(&notification).await?;

        NOTIFICATIONS_COUNTER
            .with_label_values(&["student", STUDENT_ABSENCE_STATUS])
            .inc();
        info!(
            "{} reported {} absent for {} on {} {}",
            user.username, notification.faculty, notification.subject, notification.date, notification.time
        );
        Ok(notification)
    }

    pub async fn mine(
        store: &dyn Store,
        user: &AuthenticatedUser,
        today: NaiveDate,
    ) -> ServiceResult<Vec<ReportWeek>> {
        let filter = NotificationFilter::default()
            .role(UserRole::Student)
            .username(&user.username);
        let notes = store.list_notifications(&filter).await?;
        Ok(group_by_week(notes, today))
    }
}
