use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool, Postgres, QueryBuilder};
use tracing::warn;

use super::{Store, StoreError};
use crate::models::{
    notification::{FacultyResponse, Notification, NotificationFilter},
    timetable::{TimetableEntry, TimetableFilter},
    user::{User, UserChanges, UserRole},
};

const USER_COLUMNS: &str = "username, password, role, division, subjects, divisions";

const TIMETABLE_COLUMNS: &str =
    r#"day, "time", subject, faculty, division, NULLIF(batch, '') AS batch, room, "type""#;

const NOTIFICATION_COLUMNS: &str = r#"username, role, subject, division, day, "date", "time",
    faculty, "type", status, message, "timestamp", response"#;

/// DB row struct; role is kept as TEXT and parsed afterwards.
#[derive(FromRow)]
struct UserRow {
    username: String,
    password: String,
    role: String,
    division: Option<String>,
    subjects: Vec<String>,
    divisions: Vec<String>,
}

impl UserRow {
    fn into_user(self) -> Option<User> {
        let role = match self.role.parse::<UserRole>() {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping user {}: {}", self.username, e);
                return None;
            }
        };
        Some(User {
            username: self.username,
            password: self.password,
            role,
            division: self.division.filter(|d| !d.trim().is_empty()),
            subjects: self.subjects,
            divisions: self.divisions,
        })
    }
}

#[derive(FromRow)]
struct NotificationRow {
    username: String,
    role: String,
    subject: String,
    division: String,
    day: String,
    date: String,
    time: String,
    faculty: String,
    #[sqlx(rename = "type")]
    class_type: String,
    status: String,
    message: String,
    timestamp: String,
    response: Option<Json<serde_json::Value>>,
}

impl NotificationRow {
    fn into_notification(self) -> Option<Notification> {
        let role = match self.role.parse::<UserRole>() {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping notification {}: {}", self.timestamp, e);
                return None;
            }
        };
        Some(Notification {
            username: self.username,
            role,
            subject: self.subject,
            division: self.division,
            day: self.day,
            date: self.date,
            time: self.time,
            faculty: self.faculty,
            class_type: self.class_type,
            status: self.status,
            message: self.message,
            timestamp: self.timestamp,
            response: self
                .response
                .and_then(|Json(v)| serde_json::from_value::<FacultyResponse>(v).ok()),
        })
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_timetable_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &TimetableFilter) {
    if let Some(v) = &filter.faculty {
        qb.push(" AND faculty = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.division {
        qb.push(" AND division = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.subject {
        qb.push(" AND subject = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.day {
        qb.push(" AND day = ").push_bind(v.clone());
    }
}

fn push_notification_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &NotificationFilter) {
    if let Some(r) = filter.role {
        qb.push(" AND role = ").push_bind(r.to_string());
    }
    let equalities = [
        ("username", &filter.username),
        ("faculty", &filter.faculty),
        ("division", &filter.division),
        ("subject", &filter.subject),
        ("day", &filter.day),
        (r#""time""#, &filter.time),
        (r#""timestamp""#, &filter.timestamp),
    ];
    for (column, value) in equalities {
        if let Some(v) = value {
            qb.push(format!(" AND {column} = ")).push_bind(v.clone());
        }
    }
    if let Some(subjects) = &filter.subjects {
        qb.push(" AND subject = ANY(").push_bind(subjects.clone()).push(")");
    }
    if let Some(from) = &filter.date_from {
        qb.push(r#" AND "date" >= "#).push_bind(from.clone());
    }
    if let Some(to) = &filter.date_to {
        qb.push(r#" AND "date" <= "#).push_bind(to.clone());
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(UserRow::into_user))
    }

    async fn find_user_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 AND password = $2"
        ))
        .bind(username)
        .bind(password)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(UserRow::into_user))
    }

    async fn list_users(&self, role: UserRole) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY username"
        ))
        .bind(role.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().filter_map(UserRow::into_user).collect())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (username, password, role, division, subjects, divisions)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.role.to_string())
        .bind(&user.division)
        .bind(&user.subjects)
        .bind(&user.divisions)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (username, password, role, division, subjects, divisions)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (username) DO UPDATE SET
                 password  = EXCLUDED.password,
                 role      = EXCLUDED.role,
                 division  = EXCLUDED.division,
                 subjects  = EXCLUDED.subjects,
                 divisions = EXCLUDED.divisions",
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.role.to_string())
        .bind(&user.division)
        .bind(&user.subjects)
        .bind(&user.divisions)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_user(&self, username: &str, changes: &UserChanges) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE users
             SET password  = COALESCE($2, password),
                 subjects  = COALESCE($3, subjects),
                 divisions = COALESCE($4, divisions)
             WHERE username = $1",
        )
        .bind(username)
        .bind(&changes.password)
        .bind(&changes.subjects)
        .bind(&changes.divisions)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, username: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_timetable(&self, filter: &TimetableFilter) -> Result<Vec<TimetableEntry>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TIMETABLE_COLUMNS} FROM timetable WHERE TRUE"
        ));
        push_timetable_filters(&mut qb, filter);
        qb.push(r#" ORDER BY day, "time""#);
        let rows = qb
            .build_query_as::<TimetableEntry>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn upsert_timetable(&self, entry: &TimetableEntry) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO timetable (day, "time", subject, faculty, division, batch, room, "type")
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               ON CONFLICT ON CONSTRAINT timetable_slot_key DO UPDATE SET
                   room   = EXCLUDED.room,
                   "type" = EXCLUDED."type""#,
        )
        .bind(&entry.day)
        .bind(&entry.time)
        .bind(&entry.subject)
        .bind(&entry.faculty)
        .bind(&entry.division)
        .bind(entry.batch_label())
        .bind(&entry.room)
        .bind(&entry.class_type)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, StoreError> {
        if filter.matches_nothing() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE TRUE"
        ));
        push_notification_filters(&mut qb, filter);
        qb.push(r#" ORDER BY "timestamp""#);
        let rows = qb
            .build_query_as::<NotificationRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(NotificationRow::into_notification)
            .collect())
    }

    async fn insert_notification(&self, n: &Notification) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO notifications
                   (username, role, subject, division, day, "date", "time", faculty,
                    "type", status, message, "timestamp", response)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"#,
        )
        .bind(&n.username)
        .bind(n.role.to_string())
        .bind(&n.subject)
        .bind(&n.division)
        .bind(&n.day)
        .bind(&n.date)
        .bind(&n.time)
        .bind(&n.faculty)
        .bind(&n.class_type)
        .bind(&n.status)
        .bind(&n.message)
        .bind(&n.timestamp)
        .bind(n.response.as_ref().map(Json))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_response(
        &self,
        timestamp: &str,
        response: &FacultyResponse,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"UPDATE notifications SET response = $2 WHERE "timestamp" = $1"#)
            .bind(timestamp)
            .bind(Json(response))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_notification(
        &self,
        timestamp: &str,
        filter: &NotificationFilter,
    ) -> Result<u64, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(r#"DELETE FROM notifications WHERE "timestamp" = "#);
        qb.push_bind(timestamp.to_string());
        push_notification_filters(&mut qb, filter);
        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
