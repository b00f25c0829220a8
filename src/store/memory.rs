use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use super::{Store, StoreError};
use crate::models::{
    notification::{FacultyResponse, Notification, NotificationFilter},
    timetable::{TimetableEntry, TimetableFilter},
    user::{User, UserChanges, UserRole},
};

/// In-process tables with the same uniqueness rules as the SQL schema.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    timetable: RwLock<Vec<TimetableEntry>>,
    notifications: RwLock<Vec<Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(users: Vec<User>, timetable: Vec<TimetableEntry>) -> Self {
        info!(
            "Creating MemoryStore, users: {}, timetable rows: {}",
            users.len(),
            timetable.len()
        );
        Self {
            users: RwLock::new(users),
            timetable: RwLock::new(timetable),
            notifications: RwLock::new(Vec::new()),
        }
    }
}

fn same_slot(a: &TimetableEntry, b: &TimetableEntry) -> bool {
    a.day == b.day
        && a.time == b.time
        && a.subject == b.subject
        && a.faculty == b.faculty
        && a.division == b.division
        && a.batch_label() == b.batch_label()
}

fn same_faculty_slot(a: &Notification, b: &Notification) -> bool {
    a.role == UserRole::Faculty
        && b.role == UserRole::Faculty
        && a.username == b.username
        && a.subject == b.subject
        && a.day == b.day
        && a.time == b.time
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| u.username == username && u.password == password)
            .cloned())
    }

    async fn list_users(&self, role: UserRole) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().filter(|u| u.role == role).cloned().collect())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Conflict(format!(
                "user {} already exists",
                user.username
            )));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn upsert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.username == user.username) {
            Some(existing) => *existing = user.clone(),
            None => users.push(user.clone()),
        }
        Ok(())
    }

    async fn update_user(&self, username: &str, changes: &UserChanges) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        match users.iter_mut().find(|u| u.username == username) {
            Some(user) => {
                changes.apply(user);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, username: &str) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.username != username);
        Ok(users.len() != before)
    }

    async fn list_timetable(&self, filter: &TimetableFilter) -> Result<Vec<TimetableEntry>, StoreError> {
        let rows = self.timetable.read().await;
        Ok(rows.iter().filter(|e| filter.matches(e)).cloned().collect())
    }

    async fn upsert_timetable(&self, entry: &TimetableEntry) -> Result<(), StoreError> {
        let mut rows = self.timetable.write().await;
        match rows.iter_mut().find(|e| same_slot(e, entry)) {
            Some(existing) => *existing = entry.clone(),
            None => rows.push(entry.clone()),
        }
        Ok(())
    }

    async fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, StoreError> {
        let rows = self.notifications.read().await;
        let mut out: Vec<Notification> = rows.iter().filter(|n| filter.matches(n)).cloned().collect();
        out.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Ok(out)
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), StoreError> {
        let mut rows = self.notifications.write().await;
        if rows.iter().any(|n| n.timestamp == notification.timestamp) {
            return Err(StoreError::Conflict(format!(
                "notification {} already exists",
                notification.timestamp
            )));
        }
        if rows.iter().any(|n| same_faculty_slot(n, notification)) {
            return Err(StoreError::Conflict(
                "a notification for this slot was already sent".into(),
            ));
        }
        rows.push(notification.clone());
        Ok(())
    }

    async fn set_response(
        &self,
        timestamp: &str,
        response: &FacultyResponse,
    ) -> Result<bool, StoreError> {
        let mut rows = self.notifications.write().await;
        let mut found = false;
        for n in rows.iter_mut().filter(|n| n.timestamp == timestamp) {
            n.response = Some(response.clone());
            found = true;
        }
        Ok(found)
    }

    async fn delete_notification(
        &self,
        timestamp: &str,
        filter: &NotificationFilter,
    ) -> Result<u64, StoreError> {
        let mut rows = self.notifications.write().await;
        let before = rows.len();
        rows.retain(|n| !(n.timestamp == timestamp && filter.matches(n)));
        Ok((before - rows.len()) as u64)
    }
}
