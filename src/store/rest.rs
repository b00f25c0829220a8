//! PostgREST-compatible backend (the hosted Supabase REST API).
//!
//! Filters map onto query parameters: `col=eq.value`, `col=in.("a","b")`,
//! `col=gte.value` / `col=lte.value`; writes use `Prefer` headers to ask for
//! the affected rows back so callers can tell whether anything matched.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::warn;

use super::{Store, StoreError};
use crate::models::{
    notification::{FacultyResponse, Notification, NotificationFilter},
    timetable::{TimetableEntry, TimetableFilter},
    user::{User, UserChanges, UserRole},
};

const TIMETABLE_CONFLICT_KEY: &str = "day,time,subject,faculty,division,batch";

pub struct RestStore {
    client: Client,
    base_url: String,
    key: String,
}

impl RestStore {
    pub fn new(url: &str, key: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/rest/v1/{}", self.base_url, table))
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: Vec<(String, String)>,
    ) -> Result<Vec<T>, StoreError> {
        let resp = self.request(Method::GET, table).query(&params).send().await?;
        let rows: Vec<Value> = check(resp).await?.json().await?;
        Ok(decode_rows(table, rows))
    }

    /// Run a write that returns the affected rows and count them.
    async fn write_counting(&self, builder: RequestBuilder) -> Result<u64, StoreError> {
        let resp = builder
            .header("Prefer", "return=representation")
            .send()
            .await?;
        let rows: Vec<Value> = check(resp).await?.json().await?;
        Ok(rows.len() as u64)
    }

    async fn upsert(&self, table: &str, on_conflict: &str, body: Value) -> Result<(), StoreError> {
        let resp = self
            .request(Method::POST, table)
            .query(&[("on_conflict", on_conflict)])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

/// Map non-2xx answers onto [`StoreError`]; 409 is a uniqueness violation.
async fn check(resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status.as_u16() == 409 {
        Err(StoreError::Conflict(body))
    } else {
        Err(StoreError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

/// Rows that do not decode are skipped rather than failing the whole query.
fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Skipping malformed {} row: {}", table, e);
                None
            }
        })
        .collect()
}

fn eq_param(column: &str, value: &str) -> (String, String) {
    (column.to_string(), format!("eq.{value}"))
}

/// `in.("a","b")` with PostgREST quoting so commas and parentheses survive.
fn in_param(column: &str, values: &[String]) -> (String, String) {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    (column.to_string(), format!("in.({})", quoted.join(",")))
}

fn timetable_params(filter: &TimetableFilter) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    let equalities = [
        ("faculty", &filter.faculty),
        ("division", &filter.division),
        ("subject", &filter.subject),
        ("day", &filter.day),
    ];
    for (column, value) in equalities {
        if let Some(v) = value {
            params.push(eq_param(column, v));
        }
    }
    params
}

fn notification_filter_params(filter: &NotificationFilter) -> Vec<(String, String)> {
    let mut params = Vec::new();
    if let Some(r) = filter.role {
        params.push(eq_param("role", &r.to_string()));
    }
    let equalities = [
        ("username", &filter.username),
        ("faculty", &filter.faculty),
        ("division", &filter.division),
        ("subject", &filter.subject),
        ("day", &filter.day),
        ("time", &filter.time),
        ("timestamp", &filter.timestamp),
    ];
    for (column, value) in equalities {
        if let Some(v) = value {
            params.push(eq_param(column, v));
        }
    }
    if let Some(subjects) = &filter.subjects {
        params.push(in_param("subject", subjects));
    }
    if let Some(from) = &filter.date_from {
        params.push(("date".to_string(), format!("gte.{from}")));
    }
    if let Some(to) = &filter.date_to {
        params.push(("date".to_string(), format!("lte.{to}")));
    }
    params
}

fn timetable_body(entry: &TimetableEntry) -> Value {
    json!({
        "day": entry.day,
        "time": entry.time,
        "subject": entry.subject,
        "faculty": entry.faculty,
        "division": entry.division,
        "batch": entry.batch_label(),
        "room": entry.room,
        "type": entry.class_type,
    })
}

fn user_changes_body(changes: &UserChanges) -> Value {
    let mut body = serde_json::Map::new();
    if let Some(p) = &changes.password {
        body.insert("password".into(), json!(p));
    }
    if let Some(s) = &changes.subjects {
        body.insert("subjects".into(), json!(s));
    }
    if let Some(d) = &changes.divisions {
        body.insert("divisions".into(), json!(d));
    }
    Value::Object(body)
}

#[async_trait]
impl Store for RestStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let resp = self
            .request(Method::GET, "users")
            .query(&[("select", "username"), ("limit", "1")])
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let params = vec![("select".into(), "*".into()), eq_param("username", username)];
        let users: Vec<User> = self.select("users", params).await?;
        Ok(users.into_iter().next())
    }

    async fn find_user_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        let params = vec![
            ("select".into(), "*".into()),
            eq_param("username", username),
            eq_param("password", password),
        ];
        let users: Vec<User> = self.select("users", params).await?;
        Ok(users.into_iter().next())
    }

    async fn list_users(&self, role: UserRole) -> Result<Vec<User>, StoreError> {
        let params = vec![
            ("select".into(), "*".into()),
            eq_param("role", &role.to_string()),
            ("order".into(), "username.asc".into()),
        ];
        self.select("users", params).await
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let resp = self
            .request(Method::POST, "users")
            .header("Prefer", "return=minimal")
            .json(user)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        self.upsert("users", "username", json!(user)).await
    }

    async fn update_user(&self, username: &str, changes: &UserChanges) -> Result<bool, StoreError> {
        if changes.is_empty() {
            return Ok(self.find_user(username).await?.is_some());
        }
        let builder = self
            .request(Method::PATCH, "users")
            .query(&[eq_param("username", username)])
            .json(&user_changes_body(changes));
        Ok(self.write_counting(builder).await? > 0)
    }

    async fn delete_user(&self, username: &str) -> Result<bool, StoreError> {
        let builder = self
            .request(Method::DELETE, "users")
            .query(&[eq_param("username", username)]);
        Ok(self.write_counting(builder).await? > 0)
    }

    async fn list_timetable(&self, filter: &TimetableFilter) -> Result<Vec<TimetableEntry>, StoreError> {
        self.select("timetable", timetable_params(filter)).await
    }

    async fn upsert_timetable(&self, entry: &TimetableEntry) -> Result<(), StoreError> {
        self.upsert("timetable", TIMETABLE_CONFLICT_KEY, timetable_body(entry))
            .await
    }

    async fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, StoreError> {
        if filter.matches_nothing() {
            return Ok(Vec::new());
        }
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(notification_filter_params(filter));
        params.push(("order".into(), "timestamp.asc".into()));
        self.select("notifications", params).await
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        let resp = self
            .request(Method::POST, "notifications")
            .header("Prefer", "return=minimal")
            .json(notification)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn set_response(
        &self,
        timestamp: &str,
        response: &FacultyResponse,
    ) -> Result<bool, StoreError> {
        let builder = self
            .request(Method::PATCH, "notifications")
            .query(&[eq_param("timestamp", timestamp)])
            .json(&json!({ "response": response }));
        Ok(self.write_counting(builder).await? > 0)
    }

    async fn delete_notification(
        &self,
        timestamp: &str,
        filter: &NotificationFilter,
    ) -> Result<u64, StoreError> {
        if filter.matches_nothing() {
            return Ok(0);
        }
        let mut params = vec![eq_param("timestamp", timestamp)];
        params.extend(notification_filter_params(filter));
        let builder = self.request(Method::DELETE, "notifications").query(&params);
        self.write_counting(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_filter_maps_to_postgrest_operators() {
        let filter = NotificationFilter::default()
            .role(UserRole::Student)
            .division("A")
            .subject_in(&["DBMS".to_string(), "Maths, II".to_string()])
            .date_between("2025-03-01", "2025-03-31");
        let params = notification_filter_params(&filter);
        assert_eq!(
            params,
            vec![
                ("role".to_string(), "eq.student".to_string()),
                ("division".to_string(), "eq.A".to_string()),
                ("subject".to_string(), r#"in.("DBMS","Maths, II")"#.to_string()),
                ("date".to_string(), "gte.2025-03-01".to_string()),
                ("date".to_string(), "lte.2025-03-31".to_string()),
            ]
        );
    }

    #[test]
    fn in_param_escapes_quotes() {
        let (_, value) = in_param("subject", &[r#"say "hi""#.to_string()]);
        assert_eq!(value, r#"in.("say \"hi\"")"#);
    }

    #[test]
    fn timetable_body_writes_missing_batch_as_blank() {
        let entry: TimetableEntry = serde_json::from_value(json!({
            "day": "Monday", "time": "09:00", "subject": "OS",
            "faculty": "rao", "division": "A", "room": "101", "type": "Lecture"
        }))
        .unwrap();
        let body = timetable_body(&entry);
        assert_eq!(body["batch"], "");
        assert_eq!(body["type"], "Lecture");
    }

    #[test]
    fn partial_user_update_only_sends_given_fields() {
        let changes = UserChanges {
            password: None,
            subjects: Some(vec!["OS".into()]),
            divisions: None,
        };
        assert_eq!(user_changes_body(&changes), json!({ "subjects": ["OS"] }));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let rows = vec![
            json!({"username": "a", "password": "p", "role": "faculty"}),
            json!({"username": "b", "password": "p", "role": "janitor"}),
        ];
        let users: Vec<User> = decode_rows("users", rows);
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "a");
    }
}
