use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "tracker_logins_total",
        "Login attempts by outcome",
        &["status"]
    ).unwrap();

    pub static ref NOTIFICATIONS_COUNTER: CounterVec = register_counter_vec!(
        "tracker_notifications_created_total",
        "Notifications created by author role and status",
        &["role", "status"]
    ).unwrap();

    pub static ref UNDO_COUNTER: CounterVec = register_counter_vec!(
        "tracker_notifications_deleted_total",
        "Notifications removed by author undo or faculty dismissal",
        &["reason"]
    ).unwrap();

    pub static ref RESPONSES_COUNTER: CounterVec = register_counter_vec!(
        "tracker_faculty_responses_total",
        "Faculty responses to student absence reports",
        &["response"]
    ).unwrap();

    pub static ref ADMIN_CHANGES_COUNTER: CounterVec = register_counter_vec!(
        "tracker_admin_changes_total",
        "Faculty account changes made from the admin panel",
        &["action"]
    ).unwrap();

    pub static ref EXPORTS_COUNTER: CounterVec = register_counter_vec!(
        "tracker_exports_total",
        "Downloads served by format",
        &["format"]
    ).unwrap();
}

/// Counters register on first use; force them so a scrape lists every
/// family even before the first event.
pub fn register_all() {
    lazy_static::initialize(&LOGINS_COUNTER);
    lazy_static::initialize(&NOTIFICATIONS_COUNTER);
    lazy_static::initialize(&UNDO_COUNTER);
    lazy_static::initialize(&RESPONSES_COUNTER);
    lazy_static::initialize(&ADMIN_CHANGES_COUNTER);
    lazy_static::initialize(&EXPORTS_COUNTER);
}
