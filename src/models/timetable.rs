use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{blank_as_none, null_as_default};

/// One weekly recurring class slot.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct TimetableEntry {
    #[serde(default, deserialize_with = "null_as_default")]
    pub day: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subject: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub faculty: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub division: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub batch: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub room: String,
    /// "Lecture" or "Lab"
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    #[sqlx(rename = "type")]
    pub class_type: String,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ClassType {
    Lecture,
    Lab,
}

impl TimetableEntry {
    /// Anything that is not exactly "Lab" renders as a lecture.
    pub fn kind(&self) -> ClassType {
        if self.class_type == "Lab" {
            ClassType::Lab
        } else {
            ClassType::Lecture
        }
    }

    pub fn batch_label(&self) -> &str {
        self.batch.as_deref().unwrap_or("")
    }
}

/// Equality filters on the timetable table.
#[derive(Debug, Clone, Default)]
pub struct TimetableFilter {
    pub faculty: Option<String>,
    pub division: Option<String>,
    pub subject: Option<String>,
    pub day: Option<String>,
}

impl TimetableFilter {
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

    pub fn matches(&self, entry: &TimetableEntry) -> bool {
        eq(&self.faculty, &entry.faculty)
            && eq(&self.division, &entry.division)
            && eq(&self.subject, &entry.subject)
            && eq(&self.day, &entry.day)
    }
}

fn eq(wanted: &Option<String>, actual: &str) -> bool {
    wanted.as_deref().map_or(true, |w| w == actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_batch_and_type_read_as_defaults() {
        let row = r#"{"day":"Monday","time":"09:00-10:00","subject":"DBMS",
                      "faculty":"kumar","division":"A","batch":"","room":null}"#;
        let entry: TimetableEntry = serde_json::from_str(row).unwrap();
        assert_eq!(entry.batch, None);
        assert_eq!(entry.room, "");
        assert_eq!(entry.kind(), ClassType::Lecture);
    }

    #[test]
    fn filter_matches_on_every_set_field() {
        let entry: TimetableEntry = serde_json::from_str(
            r#"{"day":"Friday","time":"11:00","subject":"OS","faculty":"rao","division":"B","type":"Lab"}"#,
        )
        .unwrap();
        assert!(TimetableFilter::default().matches(&entry));
        assert!(TimetableFilter::default().faculty("rao").day("Friday").matches(&entry));
        assert!(!TimetableFilter::default().faculty("rao").division("A").matches(&entry));
        assert_eq!(entry.kind(), ClassType::Lab);
    }
}
