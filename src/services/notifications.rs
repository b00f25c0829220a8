use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    models::{
        auth::AuthenticatedUser,
        notification::{FacultyResponse, Notification, NotificationFilter, ResponseKind},
        user::UserRole,
    },
    services::{
        metrics::{RESPONSES_COUNTER, UNDO_COUNTER},
        parse_date, ServiceError, ServiceResult,
    },
    store::Store,
};

pub const PAGE_SIZE: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub subject: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub notification: Notification,
    pub can_undo: bool,
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub subjects: Vec<String>,
    pub items: Vec<HistoryEntry>,
    pub page: usize,
    pub pages: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InboxItem {
    #[serde(flatten)]
    pub notification: Notification,
    /// Empty once the report has been answered.
    pub actions: Vec<ResponseKind>,
    pub can_delete: bool,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub response: ResponseKind,
}

/// Slice `items` into pages of [`PAGE_SIZE`]; the requested page is clamped to `[1, pages]`.
pub fn paginate<T>(items: Vec<T>, page: Option<usize>) -> (Vec<T>, usize, usize) {
    let pages = items.len().div_ceil(PAGE_SIZE).max(1);
    let page = page.unwrap_or(1).clamp(1, pages);
    let items = items
        .into_iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .collect();
    (items, page, pages)
}

pub struct NotificationService;

impl NotificationService {
    /// Faculty-authored notifications visible to `user`, newest first.
    pub async fn history(
        store: &dyn Store,
        user: &AuthenticatedUser,
        query: &HistoryQuery,
    ) -> ServiceResult<HistoryPage> {
        let mut filter = NotificationFilter::default().role(UserRole::Faculty);
        filter = match user.role {
            UserRole::Faculty => filter.username(&user.username),
            UserRole::Student => filter.division(user.division.as_deref().unwrap_or_default()),
            UserRole::Admin => {
                return Err(ServiceError::Forbidden(
                    "Notification history is available to faculty and students".into(),
                ))
            }
        };

        let from = query.from.as_deref().filter(|s| !s.trim().is_empty());
        let to = query.to.as_deref().filter(|s| !s.trim().is_empty());
        for date in [from, to].into_iter().flatten() {
            if parse_date(date).is_none() {
                return Err(ServiceError::BadRequest(format!(
                    "Invalid date '{date}', expected YYYY-MM-DD"
                )));
            }
        }
        filter.date_from = from.map(|s| s.trim().to_string());
        filter.date_to = to.map(|s| s.trim().to_string());

        let mut rows = store.list_notifications(&filter).await?;

        let mut subjects: Vec<String> = rows.iter().map(|n| n.subject.clone()).collect();
        subjects.sort();
        subjects.dedup();

        if let Some(subject) = query.subject.as_deref().filter(|s| !s.is_empty()) {
            rows.retain(|n| n.subject == subject);
        }
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = rows.len();
        let (page_rows, page, pages) = paginate(rows, query.page);
        let can_undo = user.role == UserRole::Faculty;
        let items = page_rows
            .into_iter()
            .map(|notification| HistoryEntry {
                notification,
                can_undo,
            })
            .collect();

        Ok(HistoryPage {
            subjects,
            items,
            page,
            pages,
            total,
            message: (total == 0).then(|| "No notifications found.".to_string()),
        })
    }

    /// Delete one of the caller's own notifications.
    pub async fn undo(
        store: &dyn Store,
        user: &AuthenticatedUser,
        timestamp: &str,
    ) -> ServiceResult<()> {
        let filter = NotificationFilter::default().username(&user.username);
        let removed = store.delete_notification(timestamp, &filter).await?;
        if removed == 0 {
            return Err(ServiceError::NotFound("Notification not found".into()));
        }
        UNDO_COUNTER.with_label_values(&["undo"]).inc();
        info!("{} withdrew notification {}", user.username, timestamp);
        Ok(())
    }

    fn addressed_to(faculty: &str) -> NotificationFilter {
        NotificationFilter::default()
            .role(UserRole::Student)
            .faculty(faculty)
    }

    /// Student absence reports naming the caller, newest first.
    pub async fn inbox(store: &dyn Store, user: &AuthenticatedUser) -> ServiceResult<Vec<InboxItem>> {
        let mut rows = store
            .list_notifications(&Self::addressed_to(&user.username))
            .await?;
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(rows
            .into_iter()
            .map(|notification| {
                let open = notification.response.is_none();
                InboxItem {
                    actions: if open { ResponseKind::ALL.to_vec() } else { Vec::new() },
                    can_delete: open,
                    notification,
                }
            })
            .collect())
    }

    async fn open_report(
        store: &dyn Store,
        user: &AuthenticatedUser,
        timestamp: &str,
    ) -> ServiceResult<Notification> {
        let report = store
            .list_notifications(&Self::addressed_to(&user.username).timestamp(timestamp))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound("Report not found".into()))?;
        if let Some(existing) = &report.response {
            return Err(ServiceError::Conflict(format!(
                "Already responded: {}",
                existing.message
            )));
        }
        Ok(report)
    }

    pub async fn respond(
        store: &dyn Store,
        user: &AuthenticatedUser,
        timestamp: &str,
        kind: ResponseKind,
    ) -> ServiceResult<FacultyResponse> {
        Self::open_report(store, user, timestamp).await?;

        let response = FacultyResponse {
            by: user.username.clone(),
            message: kind.message().to_string(),
        };
        if !store.set_response(timestamp, &response).await? {
            return Err(ServiceError::NotFound("Report not found".into()));
        }

        RESPONSES_COUNTER.with_label_values(&[kind.message()]).inc();
        info!("{} responded '{}' to {}", user.username, response.message, timestamp);
        Ok(response)
    }

    /// Remove an unanswered report addressed to the caller.
    pub async fn dismiss(
        store: &dyn Store,
        user: &AuthenticatedUser,
        timestamp: &str,
    ) -> ServiceResult<()> {
        Self::open_report(store, user, timestamp).await?;
        let removed = store
            .delete_notification(timestamp, &Self::addressed_to(&user.username))
            .await?;
        if removed == 0 {
            return Err(ServiceError::NotFound("Report not found".into()));
        }
        UNDO_COUNTER.with_label_values(&["dismiss"]).inc();
        info!("{} dismissed report {}", user.username, timestamp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::STUDENT_ABSENCE_STATUS;
    use crate::store::memory::MemoryStore;

    fn note(role: UserRole, username: &str, subject: &str, date: &str, ts: &str) -> Notification {
        Notification {
            username: username.into(),
            role,
            subject: subject.into(),
            division: "A".into(),
            day: "Monday".into(),
            date: date.into(),
            time: format!("{ts}-slot"),
            faculty: "kumar".into(),
            class_type: "Lecture".into(),
            status: "Class Happened".into(),
            message: String::new(),
            timestamp: ts.into(),
            response: None,
        }
    }

    fn user(role: UserRole, username: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            username: username.into(),
            role,
            division: Some("A".into()),
        }
    }

    #[test]
    fn paginate_clamps_page() {
        let items: Vec<u32> = (0..25).collect();
        let (page, n, pages) = paginate(items.clone(), Some(9));
        assert_eq!((n, pages), (3, 3));
        assert_eq!(page, vec![20, 21, 22, 23, 24]);

        let (page, n, _) = paginate(items, Some(0));
        assert_eq!(n, 1);
        assert_eq!(page.len(), PAGE_SIZE);

        let (page, n, pages) = paginate(Vec::<u32>::new(), None);
        assert!(page.is_empty());
        assert_eq!((n, pages), (1, 1));
    }

    #[tokio::test]
    async fn history_is_scoped_and_newest_first() {
        let store = MemoryStore::new();
        for (who, subject, date, ts) in [
            ("kumar", "DBMS", "2025-01-06", "2025-01-06 09:00:00.000001"),
            ("kumar", "CN", "2025-01-08", "2025-01-08 09:00:00.000001"),
            ("rao", "OS", "2025-01-07", "2025-01-07 09:00:00.000001"),
        ] {
            store
                .insert_notification(&note(UserRole::Faculty, who, subject, date, ts))
                .await
                .unwrap();
        }

        let page = NotificationService::history(&store, &user(UserRole::Faculty, "kumar"), &HistoryQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].notification.subject, "CN");
        assert!(page.items.iter().all(|i| i.can_undo));
        assert_eq!(page.subjects, vec!["CN", "DBMS"]);

        let query = HistoryQuery {
            from: Some("2025-01-07".into()),
            to: Some("2025-01-07".into()),
            ..Default::default()
        };
        let page = NotificationService::history(&store, &user(UserRole::Student, "s1"), &query)
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].notification.username, "rao");
        assert!(!page.items[0].can_undo);

        let query = HistoryQuery {
            subject: Some("Maths".into()),
            ..Default::default()
        };
        let page = NotificationService::history(&store, &user(UserRole::Student, "s1"), &query)
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(page.message.is_some());
    }

    #[tokio::test]
    async fn undo_only_removes_own_rows() {
        let store = MemoryStore::new();
        let n = note(UserRole::Faculty, "kumar", "DBMS", "2025-01-06", "2025-01-06 09:00:00.000001");
        store.insert_notification(&n).await.unwrap();

        let err = NotificationService::undo(&store, &user(UserRole::Faculty, "rao"), &n.timestamp).await;
        assert!(matches!(err, Err(ServiceError::NotFound(_))));

        NotificationService::undo(&store, &user(UserRole::Faculty, "kumar"), &n.timestamp)
            .await
            .unwrap();
        assert!(store
            .list_notifications(&NotificationFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn respond_once_then_conflict() {
        let store = MemoryStore::new();
        let mut report = note(UserRole::Student, "s1", "DBMS", "2025-01-06", "2025-01-06 09:10:00.000001");
        report.status = STUDENT_ABSENCE_STATUS.into();
        store.insert_notification(&report).await.unwrap();

        let kumar = user(UserRole::Faculty, "kumar");
        let inbox = NotificationService::inbox(&store, &kumar).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].actions.len(), 3);

        // Not addressed to rao.
        let err = NotificationService::respond(&store, &user(UserRole::Faculty, "rao"), &report.timestamp, ResponseKind::Coming).await;
        assert!(matches!(err, Err(ServiceError::NotFound(_))));

        let response = NotificationService::respond(&store, &kumar, &report.timestamp, ResponseKind::Unavailable)
            .await
            .unwrap();
        assert_eq!(response.message, "I'm unavailable");
        assert_eq!(response.by, "kumar");

        let again = NotificationService::respond(&store, &kumar, &report.timestamp, ResponseKind::Coming).await;
        assert!(matches!(again, Err(ServiceError::Conflict(_))));
        let dismiss = NotificationService::dismiss(&store, &kumar, &report.timestamp).await;
        assert!(matches!(dismiss, Err(ServiceError::Conflict(_))));

        let inbox = NotificationService::inbox(&store, &kumar).await.unwrap();
        assert!(inbox[0].actions.is_empty());
        assert!(!inbox[0].can_delete);
    }

    #[tokio::test]
    async fn dismiss_removes_open_report() {
        let store = MemoryStore::new();
        let report = note(UserRole::Student, "s1", "DBMS", "2025-01-06", "2025-01-06 09:10:00.000001");
        store.insert_notification(&report).await.unwrap();

        let kumar = user(UserRole::Faculty, "kumar");
        NotificationService::dismiss(&store, &kumar, &report.timestamp).await.unwrap();
        assert!(NotificationService::inbox(&store, &kumar).await.unwrap().is_empty());
    }
}
