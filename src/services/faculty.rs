use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    models::user::{
        CreateFacultyRequest, UpdateFacultyRequest, User, UserChanges, UserProfile, UserRole,
    },
    services::{metrics::ADMIN_CHANGES_COUNTER, ServiceError, ServiceResult},
    store::{Store, StoreError},
};

const DUPLICATE_USERNAME: &str = "A user with this username already exists.";

/// Admin view of faculty accounts. The listing is memoised for `ttl` and
/// dropped on every mutation made through this directory.
pub struct FacultyDirectory {
    ttl: Duration,
    cache: RwLock<Option<(Instant, Vec<UserProfile>)>>,
}

impl FacultyDirectory {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: RwLock::new(None),
        }
    }

    pub async fn list(&self, store: &dyn Store) -> ServiceResult<Vec<UserProfile>> {
        if let Some(rows) = self.fresh(self.cache.read().await.as_ref()) {
            debug!("Faculty list served from cache");
            return Ok(rows);
        }

        // Held across the fetch so an invalidation cannot land between the
        // read and the write-back.
        let mut cache = self.cache.write().await;
        if let Some(rows) = self.fresh(cache.as_ref()) {
            return Ok(rows);
        }
        let mut rows: Vec<UserProfile> = store
            .list_users(UserRole::Faculty)
            .await?
            .into_iter()
            .map(UserProfile::from)
            .collect();
        rows.sort_by(|a, b| a.username.cmp(&b.username));

        *cache = Some((Instant::now(), rows.clone()));
        Ok(rows)
    }

    fn fresh(&self, cached: Option<&(Instant, Vec<UserProfile>)>) -> Option<Vec<UserProfile>> {
        cached
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, rows)| rows.clone())
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    pub async fn create(
        &self,
        store: &dyn Store,
        req: &CreateFacultyRequest,
    ) -> ServiceResult<UserProfile> {
        let username = req.username.trim();
        if username.is_empty() || req.password.is_empty() {
            return Err(ServiceError::BadRequest(
                "Username and password are required.".into(),
            ));
        }
        if store.find_user(username).await?.is_some() {
            return Err(ServiceError::Conflict(DUPLICATE_USERNAME.into()));
        }

        let user = User::faculty(
            username,
            &req.password,
            req.subjects.clone(),
            req.divisions.clone(),
        );
        store.insert_user(&user).await.map_err(|e| match e {
            StoreError::Conflict(_) => ServiceError::Conflict(DUPLICATE_USERNAME.into()),
            other => other.into(),
        })?;
        self.invalidate().await;

        ADMIN_CHANGES_COUNTER.with_label_values(&["create"]).inc();
        info!("Created faculty account {}", user.username);
        Ok(UserProfile::from(user))
    }

    /// A missing or empty password keeps the stored one.
    pub async fn update(
        &self,
        store: &dyn Store,
        username: &str,
        req: &UpdateFacultyRequest,
    ) -> ServiceResult<()> {
        let changes = UserChanges {
            password: req.password.clone().filter(|p| !p.is_empty()),
            subjects: req.subjects.clone(),
            divisions: req.divisions.clone(),
        };
        if changes.is_empty() {
            return Err(ServiceError::BadRequest("Nothing to update.".into()));
        }

        match store.find_user(username).await? {
            Some(u) if u.role == UserRole::Faculty => {}
            _ => return Err(ServiceError::NotFound(format!("Faculty {username} not found"))),
        }
        if !store.update_user(username, &changes).await? {
            return Err(ServiceError::NotFound(format!("Faculty {username} not found")));
        }
        self.invalidate().await;

        ADMIN_CHANGES_COUNTER.with_label_values(&["update"]).inc();
        info!("Updated faculty account {}", username);
        Ok(())
    }

    pub async fn delete(&self, store: &dyn Store, username: &str) -> ServiceResult<()> {
        match store.find_user(username).await? {
            Some(u) if u.role == UserRole::Faculty => {}
            _ => return Err(ServiceError::NotFound(format!("Faculty {username} not found"))),
        }
        store.delete_user(username).await?;
        self.invalidate().await;

        ADMIN_CHANGES_COUNTER.with_label_values(&["delete"]).inc();
        info!("Deleted faculty account {}", username);
        Ok(())
    }
}
