use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    models::{
        auth::AuthenticatedUser,
        notification::{notification_timestamp, FacultyStatus, Notification, NotificationFilter},
        timetable::{ClassType, TimetableEntry, TimetableFilter},
        user::UserRole,
    },
    services::{
        faculty_short, metrics::NOTIFICATIONS_COUNTER, weekday_name, ServiceError, ServiceResult,
        WEEK_DAYS,
    },
    store::{Store, StoreError},
};

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Today,
    Week,
}

/// What a faculty member can do with one of today's slots.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotAction {
    Available { options: Vec<FacultyStatus> },
    /// Already reported; `timestamp` is the undo target.
    Submitted { status: String, timestamp: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TimetableRow {
    pub index: usize,
    pub day: String,
    pub time: String,
    pub subject: String,
    pub class_type: ClassType,
    pub faculty_short: String,
    pub room: String,
    pub division: String,
    pub batch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<SlotAction>,
}

#[derive(Debug, Serialize)]
pub struct DayView {
    pub day: String,
    pub rows: Vec<TimetableRow>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum TimetableView {
    Today {
        day: String,
        date: String,
        subjects: Vec<String>,
        selected_subjects: Vec<String>,
        rows: Vec<TimetableRow>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Week {
        subjects: Vec<String>,
        selected_subjects: Vec<String>,
        days: Vec<DayView>,
    },
}

#[derive(Debug, Deserialize)]
pub struct SlotReportRequest {
    pub subject: String,
    pub day: String,
    pub time: String,
    pub status: FacultyStatus,
}

/// CSV export row; the faculty column carries the 3-letter abbreviation.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TimetableCsvRow {
    pub day: String,
    pub time: String,
    pub subject: String,
    #[serde(rename = "type")]
    pub class_type: String,
    pub faculty: String,
    pub room: String,
    pub division: String,
    pub batch: Option<String>,
}

pub struct TimetableService;

impl TimetableService {
    /// Faculty see their own rows, students their division's; admins have no timetable.
    pub fn visible_filter(user: &AuthenticatedUser) -> Option<TimetableFilter> {
        match user.role {
            UserRole::Faculty => Some(TimetableFilter::default().faculty(&user.username)),
            UserRole::Student => Some(
                TimetableFilter::default().division(user.division.as_deref().unwrap_or_default()),
            ),
            UserRole::Admin => None,
        }
    }

    pub async fn for_user(
        store: &dyn Store,
        user: &AuthenticatedUser,
    ) -> Result<Vec<TimetableEntry>, StoreError> {
        match Self::visible_filter(user) {
            Some(filter) => store.list_timetable(&filter).await,
            None => Ok(Vec::new()),
        }
    }

    /// Distinct subjects, sorted.
    pub fn subjects_of(entries: &[TimetableEntry]) -> Vec<String> {
        let mut subjects: Vec<String> = entries.iter().map(|e| e.subject.clone()).collect();
        subjects.sort();
        subjects.dedup();
        subjects
    }

    /// `None` keeps every subject (the default selection).
    pub fn select_subjects(
        entries: Vec<TimetableEntry>,
        selected: Option<&[String]>,
    ) -> Vec<TimetableEntry> {
        match selected {
            Some(selected) => entries
                .into_iter()
                .filter(|e| selected.contains(&e.subject))
                .collect(),
            None => entries,
        }
    }

    /// Rows on `day`, ordered by slot label.
    pub fn rows_for_day<'a>(entries: &'a [TimetableEntry], day: &str) -> Vec<&'a TimetableEntry> {
        let mut rows: Vec<&TimetableEntry> = entries.iter().filter(|e| e.day == day).collect();
        rows.sort_by(|a, b| a.time.cmp(&b.time));
        rows
    }

    /// The existing faculty notification for this exact (username, subject, day, time).
    pub fn existing_report<'a>(
        entry: &TimetableEntry,
        username: &str,
        notifications: &'a [Notification],
    ) -> Option<&'a Notification> {
        notifications.iter().find(|n| {
            n.role == UserRole::Faculty
                && n.username == username
                && n.subject == entry.subject
                && n.day == entry.day
                && n.time == entry.time
        })
    }

    pub fn slot_action(
        entry: &TimetableEntry,
        username: &str,
        notifications: &[Notification],
    ) -> SlotAction {
        match Self::existing_report(entry, username, notifications) {
            Some(n) => SlotAction::Submitted {
                status: n.status.clone(),
                timestamp: n.timestamp.clone(),
            },
            None => SlotAction::Available {
                options: FacultyStatus::ALL.to_vec(),
            },
        }
    }

    fn render_row(index: usize, entry: &TimetableEntry, action: Option<SlotAction>) -> TimetableRow {
        TimetableRow {
            index,
            day: entry.day.clone(),
            time: entry.time.clone(),
            subject: entry.subject.clone(),
            class_type: entry.kind(),
            faculty_short: faculty_short(&entry.faculty),
            room: entry.room.clone(),
            division: entry.division.clone(),
            batch: entry.batch_label().to_string(),
            action,
        }
    }

    /// Today's rows, with a slot action per row for faculty.
    pub fn render_day(
        entries: &[TimetableEntry],
        day: &str,
        user: &AuthenticatedUser,
        notifications: &[Notification],
    ) -> Vec<TimetableRow> {
        Self::rows_for_day(entries, day)
            .into_iter()
            .enumerate()
            .map(|(i, entry)| {
                let action = (user.role == UserRole::Faculty)
                    .then(|| Self::slot_action(entry, &user.username, notifications));
                Self::render_row(i + 1, entry, action)
            })
            .collect()
    }

    /// Monday to Saturday; days without rows are left out.
    pub fn render_week(entries: &[TimetableEntry]) -> Vec<DayView> {
        WEEK_DAYS
            .iter()
            .filter_map(|day| {
                let rows: Vec<TimetableRow> = Self::rows_for_day(entries, day)
                    .into_iter()
                    .enumerate()
                    .map(|(i, entry)| Self::render_row(i + 1, entry, None))
                    .collect();
                (!rows.is_empty()).then(|| DayView {
                    day: day.to_string(),
                    rows,
                })
            })
            .collect()
    }

    pub async fn view(
        store: &dyn Store,
        user: &AuthenticatedUser,
        mode: ViewMode,
        selected: Option<&[String]>,
        today: NaiveDate,
    ) -> ServiceResult<TimetableView> {
        let entries = Self::for_user(store, user).await?;
        let subjects = Self::subjects_of(&entries);
        let filtered = Self::select_subjects(entries, selected);
        let selected_subjects = Self::subjects_of(&filtered);

        match mode {
            ViewMode::Today => {
                let day = weekday_name(today);
                let notifications = if user.role == UserRole::Faculty {
                    let filter = NotificationFilter::default()
                        .role(UserRole::Faculty)
                        .username(&user.username);
                    store.list_notifications(&filter).await?
                } else {
                    Vec::new()
                };
                let rows = Self::render_day(&filtered, &day, user, &notifications);
                let message = rows.is_empty().then(|| "No classes scheduled.".to_string());
                Ok(TimetableView::Today {
                    day,
                    date: today.format("%Y-%m-%d").to_string(),
                    subjects,
                    selected_subjects,
                    rows,
                    message,
                })
            }
            ViewMode::Week => Ok(TimetableView::Week {
                subjects,
                selected_subjects,
                days: Self::render_week(&filtered),
            }),
        }
    }

    /// UTF-8 CSV with a header row, one row per entry, ordered by weekday then slot.
    pub fn export_csv(entries: &[TimetableEntry]) -> anyhow::Result<Vec<u8>> {
        let mut sorted: Vec<&TimetableEntry> = entries.iter().collect();
        sorted.sort_by_key(|e| {
            let day_idx = WEEK_DAYS.iter().position(|d| *d == e.day).unwrap_or(WEEK_DAYS.len());
            (day_idx, e.time.clone())
        });

        let mut wtr = csv::Writer::from_writer(vec![]);
        for entry in sorted {
            wtr.serialize(TimetableCsvRow {
                day: entry.day.clone(),
                time: entry.time.clone(),
                subject: entry.subject.clone(),
                class_type: entry.class_type.clone(),
                faculty: faculty_short(&entry.faculty),
                room: entry.room.clone(),
                division: entry.division.clone(),
                batch: entry.batch.clone(),
            })?;
        }
        Ok(wtr.into_inner()?)
    }

    /// Record a faculty outcome for one of today's slots.
    pub async fn report_slot(
        store: &dyn Store,
        user: &AuthenticatedUser,
        req: &SlotReportRequest,
        now: NaiveDateTime,
    ) -> ServiceResult<Notification> {
        let today = weekday_name(now.date());
        if req.day != today {
            return Err(ServiceError::BadRequest(format!(
                "Only today's classes ({today}) can be reported"
            )));
        }

        let filter = TimetableFilter::default()
            .faculty(&user.username)
            .subject(&req.subject)
            .day(&req.day);
        let entry = store
            .list_timetable(&filter)
            .await?
            .into_iter()
            .find(|e| e.time == req.time)
            .ok_or_else(|| ServiceError::NotFound("No such class in your timetable".into()))?;

        let existing = store
            .list_notifications(
                &NotificationFilter::default()
                    .role(UserRole::Faculty)
                    .username(&user.username)
                    .subject(&entry.subject)
                    .day(&entry.day)
                    .time(&entry.time),
            )
            .await?;
        if let Some(n) = existing.first() {
            return Err(ServiceError::Conflict(format!(
                "Notification already sent: {}",
                n.status
            )));
        }

        let notification = Notification {
            username: user.username.clone(),
            role: UserRole::Faculty,
            subject: entry.subject.clone(),
            division: entry.division.clone(),
            day: entry.day.clone(),
            date: now.date().format("%Y-%m-%d").to_string(),
            time: entry.time.clone(),
            faculty: entry.faculty.clone(),
            class_type: entry.class_type.clone(),
            status: req.status.label().to_string(),
            message: req.status.message().to_string(),
            timestamp: notification_timestamp(now),
            response: None,
        };

        store.insert_notification(&notification).await.map_err(|e| match e {
            StoreError::Conflict(_) => {
                ServiceError::Conflict("Notification already sent for this class".into())
            }
            other => other.into(),
        })?;

        NOTIFICATIONS_COUNTER
            .with_label_values(&["faculty", req.status.label()])
            .inc();
        info!(
            "{} reported '{}' for {} {} {}",
            user.username, notification.status, notification.subject, notification.day, notification.time
        );
        Ok(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::User;
    use crate::store::memory::MemoryStore;
    use chrono::NaiveDate;

    fn entry(day: &str, time: &str, subject: &str, faculty: &str, division: &str) -> TimetableEntry {
        TimetableEntry {
            day: day.into(),
            time: time.into(),
            subject: subject.into(),
            faculty: faculty.into(),
            division: division.into(),
            batch: None,
            room: "101".into(),
            class_type: "Lecture".into(),
        }
    }

    fn faculty(username: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            username: username.into(),
            role: UserRole::Faculty,
            division: None,
        }
    }

    fn sample_timetable() -> Vec<TimetableEntry> {
        vec![
            entry("Monday", "10:00-11:00", "OS", "rao", "A"),
            entry("Monday", "09:00-10:00", "DBMS", "kumar", "A"),
            entry("Tuesday", "09:00-10:00", "DBMS", "kumar", "B"),
            entry("Wednesday", "11:00-12:00", "CN", "kumar", "A"),
            entry("Saturday", "09:00-10:00", "OS", "rao", "B"),
        ]
    }

    // 2025-01-06 is a Monday.
    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn faculty_filter_returns_exactly_their_rows() {
        let store = MemoryStore::with_data(vec![], sample_timetable());
        let rows = TimetableService::for_user(&store, &faculty("kumar")).await.unwrap();
        let expected: Vec<TimetableEntry> = sample_timetable()
            .into_iter()
            .filter(|e| e.faculty == "kumar")
            .collect();
        assert_eq!(rows, expected);
    }

    #[tokio::test]
    async fn student_sees_division_and_admin_sees_nothing() {
        let store = MemoryStore::with_data(vec![], sample_timetable());
        let student = AuthenticatedUser {
            username: "s1".into(),
            role: UserRole::Student,
            division: Some("B".into()),
        };
        let rows = TimetableService::for_user(&store, &student).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|e| e.division == "B"));

        let admin = AuthenticatedUser {
            username: "root".into(),
            role: UserRole::Admin,
            division: None,
        };
        assert!(TimetableService::for_user(&store, &admin).await.unwrap().is_empty());
    }

    #[test]
    fn day_rows_sorted_by_time_and_subject_filter_applies() {
        let all = sample_timetable();
        let monday = TimetableService::rows_for_day(&all, "Monday");
        assert_eq!(monday[0].subject, "DBMS");
        assert_eq!(monday[1].subject, "OS");

        let only_os = TimetableService::select_subjects(all.clone(), Some(&["OS".to_string()]));
        assert!(only_os.iter().all(|e| e.subject == "OS"));
        assert_eq!(TimetableService::select_subjects(all.clone(), None).len(), all.len());
        assert_eq!(TimetableService::subjects_of(&all), vec!["CN", "DBMS", "OS"]);
    }

    #[test]
    fn week_view_skips_empty_days_and_keeps_order() {
        let days = TimetableService::render_week(&sample_timetable());
        let names: Vec<&str> = days.iter().map(|d| d.day.as_str()).collect();
        assert_eq!(names, vec!["Monday", "Tuesday", "Wednesday", "Saturday"]);
        assert_eq!(days[0].rows[0].faculty_short, "KUM");
        assert_eq!(days[0].rows[0].index, 1);
    }

    #[tokio::test]
    async fn slot_action_offered_once_then_undo_restores_it() {
        let store = MemoryStore::with_data(vec![User::faculty("kumar", "pw", vec![], vec![])], sample_timetable());
        let user = faculty("kumar");
        let today = monday_at(9, 5);

        let view = TimetableService::view(&store, &user, ViewMode::Today, None, today.date())
            .await
            .unwrap();
        let TimetableView::Today { rows, .. } = view else { panic!("expected today view") };
        assert_eq!(rows.len(), 1);
        assert!(matches!(rows[0].action, Some(SlotAction::Available { .. })));

        let req = SlotReportRequest {
            subject: "DBMS".into(),
            day: "Monday".into(),
            time: "09:00-10:00".into(),
            status: FacultyStatus::ClassHappened,
        };
        let created = TimetableService::report_slot(&store, &user, &req, today).await.unwrap();
        assert_eq!(created.status, "Class Happened");
        assert_eq!(created.date, "2025-01-06");

        let filter = NotificationFilter::default()
            .role(UserRole::Faculty)
            .username("kumar")
            .subject("DBMS")
            .day("Monday")
            .time("09:00-10:00");
        assert_eq!(store.list_notifications(&filter).await.unwrap().len(), 1);

        // A second submission for the same slot is rejected.
        let again = TimetableService::report_slot(&store, &user, &req, monday_at(9, 30)).await;
        assert!(matches!(again, Err(ServiceError::Conflict(_))));

        let view = TimetableService::view(&store, &user, ViewMode::Today, None, today.date())
            .await
            .unwrap();
        let TimetableView::Today { rows, .. } = view else { panic!("expected today view") };
        match &rows[0].action {
            Some(SlotAction::Submitted { status, timestamp }) => {
                assert_eq!(status, "Class Happened");
                assert_eq!(timestamp, &created.timestamp);
            }
            other => panic!("unexpected action {other:?}"),
        }

        let removed = store
            .delete_notification(&created.timestamp, &NotificationFilter::default().username("kumar"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.list_notifications(&filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_todays_slots_can_be_reported() {
        let store = MemoryStore::with_data(vec![], sample_timetable());
        let req = SlotReportRequest {
            subject: "CN".into(),
            day: "Wednesday".into(),
            time: "11:00-12:00".into(),
            status: FacultyStatus::Cancelled,
        };
        let err = TimetableService::report_slot(&store, &faculty("kumar"), &req, monday_at(11, 0)).await;
        assert!(matches!(err, Err(ServiceError::BadRequest(_))));

        let req = SlotReportRequest {
            subject: "OS".into(),
            day: "Monday".into(),
            time: "10:00-11:00".into(),
            status: FacultyStatus::Cancelled,
        };
        // Rao's slot, not Kumar's.
        let err = TimetableService::report_slot(&store, &faculty("kumar"), &req, monday_at(11, 0)).await;
        assert!(matches!(err, Err(ServiceError::NotFound(_))));
    }

    #[test]
    fn csv_export_round_trips_rows() {
        let mut entries = sample_timetable();
        entries[2].batch = Some("B1".into());
        let bytes = TimetableService::export_csv(&entries).unwrap();

        let mut rdr = csv::Reader::from_reader(bytes.as_slice());
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["day", "time", "subject", "type", "faculty", "room", "division", "batch"]
        );
        let parsed: Vec<TimetableCsvRow> = rdr.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(parsed.len(), entries.len());

        for original in &entries {
            let row = parsed
                .iter()
                .find(|r| r.day == original.day && r.time == original.time && r.subject == original.subject)
                .expect("row exported");
            assert_eq!(row.division, original.division);
            assert_eq!(row.batch, original.batch);
            assert_eq!(row.faculty, faculty_short(&original.faculty));
        }
    }
}
