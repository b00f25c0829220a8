use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use super::null_as_default;
use super::user::UserRole;

pub const STUDENT_ABSENCE_STATUS: &str = "Faculty not present";
pub const STUDENT_ABSENCE_MESSAGE: &str = "Reported faculty absence";

/// A status event tied to one slot occurrence on one date.
///
/// `timestamp` is the creation key and the identity used for update/delete.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    pub role: UserRole,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub division: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub day: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub faculty: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub class_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    pub timestamp: String,
    #[serde(default, deserialize_with = "lenient_response")]
    pub response: Option<FacultyResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacultyResponse {
    #[serde(default)]
    pub by: String,
    pub message: String,
}

/// A response that is not an object with a `message` is treated as absent.
fn lenient_response<'de, D>(deserializer: D) -> Result<Option<FacultyResponse>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Creation key: local time with microseconds so two events in the same
/// second stay distinct.
pub fn notification_timestamp(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Outcomes a faculty member can report for one of their slots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FacultyStatus {
    #[serde(rename = "Class Happened")]
    ClassHappened,
    #[serde(rename = "Cancelled")]
    Cancelled,
    #[serde(rename = "No Students Present")]
    NoStudentsPresent,
}

impl FacultyStatus {
    pub const ALL: [FacultyStatus; 3] = [
        FacultyStatus::ClassHappened,
        FacultyStatus::Cancelled,
        FacultyStatus::NoStudentsPresent,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            FacultyStatus::ClassHappened => "Class Happened",
            FacultyStatus::Cancelled => "Cancelled",
            FacultyStatus::NoStudentsPresent => "No Students Present",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FacultyStatus::ClassHappened => "Class was held successfully.",
            FacultyStatus::Cancelled => "Class was cancelled.",
            FacultyStatus::NoStudentsPresent => "No students attended the lecture.",
        }
    }
}

/// Canned replies to a student absence report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Coming,
    Unavailable,
    Coordinator,
}

impl ResponseKind {
    pub const ALL: [ResponseKind; 3] = [
        ResponseKind::Coming,
        ResponseKind::Unavailable,
        ResponseKind::Coordinator,
    ];

    pub fn message(&self) -> &'static str {
        match self {
            ResponseKind::Coming => "I'm coming",
            ResponseKind::Unavailable => "I'm unavailable",
            ResponseKind::Coordinator => "Contact Class Coordinator",
        }
    }
}

/// Equality / set / range filters on the notifications table. Every set
/// field must match.
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    pub role: Option<UserRole>,
    pub username: Option<String>,
    pub faculty: Option<String>,
    pub division: Option<String>,
    pub subject: Option<String>,
    pub day: Option<String>,
    pub time: Option<String>,
    pub timestamp: Option<String>,
    pub subjects: Option<Vec<String>>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl NotificationFilter {
    pub fn role(mut self, role: UserRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.username = Some(username.to_string());
        self
    }

    pub fn faculty(mut self, faculty: &str) -> Self {
        self.faculty = Some(faculty.to_string());
        self
    }

    pub fn division(mut self, division: &str) -> Self {
        self.division = Some(division.to_string());
        self
    }

    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = Some(subject.to_string());
        self
    }

    pub fn day(mut self, day: &str) -> Self {
        self.day = Some(day.to_string());
        self
    }

    pub fn time(mut self, time: &str) -> Self {
        self.time = Some(time.to_string());
        self
    }

    pub fn timestamp(mut self, timestamp: &str) -> Self {
        self.timestamp = Some(timestamp.to_string());
        self
    }

    pub fn subject_in(mut self, subjects: &[String]) -> Self {
        self.subjects = Some(subjects.to_vec());
        self
    }

    /// Inclusive `YYYY-MM-DD` range; dates compare as text.
    pub fn date_between(mut self, from: &str, to: &str) -> Self {
        self.date_from = Some(from.to_string());
        self.date_to = Some(to.to_string());
        self
    }

    /// An empty `in` list can never match.
    pub fn matches_nothing(&self) -> bool {
        self.subjects.as_ref().is_some_and(|s| s.is_empty())
    }

    pub fn matches(&self, n: &Notification) -> bool {
        if self.matches_nothing() {
            return false;
        }
        self.role.map_or(true, |r| r == n.role)
            && eq(&self.username, &n.username)
            && eq(&self.faculty, &n.faculty)
            && eq(&self.division, &n.division)
            && eq(&self.subject, &n.subject)
            && eq(&self.day, &n.day)
            && eq(&self.time, &n.time)
            && eq(&self.timestamp, &n.timestamp)
            && self.subjects.as_ref().map_or(true, |s| s.contains(&n.subject))
            && self.date_from.as_deref().map_or(true, |from| n.date.as_str() >= from)
            && self.date_to.as_deref().map_or(true, |to| n.date.as_str() <= to)
    }
}

fn eq(wanted: &Option<String>, actual: &str) -> bool {
    wanted.as_deref().map_or(true, |w| w == actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample() -> Notification {
        Notification {
            username: "kumar".into(),
            role: UserRole::Faculty,
            subject: "DBMS".into(),
            division: "A".into(),
            day: "Monday".into(),
            date: "2025-03-10".into(),
            time: "09:00-10:00".into(),
            faculty: "kumar".into(),
            class_type: "Lecture".into(),
            status: FacultyStatus::ClassHappened.label().into(),
            message: FacultyStatus::ClassHappened.message().into(),
            timestamp: "2025-03-10 09:05:00.000000".into(),
            response: None,
        }
    }

    #[test]
    fn date_range_is_inclusive() {
        let n = sample();
        assert!(NotificationFilter::default().date_between("2025-03-01", "2025-03-10").matches(&n));
        assert!(NotificationFilter::default().date_between("2025-03-10", "2025-03-31").matches(&n));
        assert!(!NotificationFilter::default().date_between("2025-04-01", "2025-04-30").matches(&n));
    }

    #[test]
    fn subject_set_filter() {
        let n = sample();
        let subjects = vec!["OS".to_string(), "DBMS".to_string()];
        assert!(NotificationFilter::default().subject_in(&subjects).matches(&n));
        assert!(!NotificationFilter::default().subject_in(&subjects[..1]).matches(&n));
        assert!(!NotificationFilter::default().subject_in(&[]).matches(&n));
    }

    #[test]
    fn malformed_response_reads_as_none() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["response"] = serde_json::json!("yes");
        let n: Notification = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(n.response, None);

        value["response"] = serde_json::json!({"by": "kumar", "message": "I'm coming"});
        let n: Notification = serde_json::from_value(value).unwrap();
        assert_eq!(n.response.unwrap().message, "I'm coming");
    }

    #[test]
    fn timestamp_keeps_sub_second_precision() {
        let now = NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_micro_opt(9, 15, 2, 42)
            .unwrap();
        assert_eq!(notification_timestamp(now), "2025-01-06 09:15:02.000042");
    }
}
