use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use class_tracker_api::{
    config::Config,
    models::{timetable::TimetableEntry, user::User},
    routes,
    services::weekday_name,
    store::memory::MemoryStore,
    AppState,
};

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn slot(day: &str, time: &str, subject: &str, faculty: &str) -> TimetableEntry {
    TimetableEntry {
        day: day.into(),
        time: time.into(),
        subject: subject.into(),
        faculty: faculty.into(),
        division: "A".into(),
        batch: None,
        room: "101".into(),
        class_type: "Lecture".into(),
    }
}

fn app() -> Router {
    let day = weekday_name(today());
    let users = vec![
        User::admin("root", "toor"),
        User::faculty("kumar", "pw", vec!["DBMS".into()], vec!["A".into()]),
        User::student("s1", "pw", "A"),
    ];
    let timetable = vec![
        slot(&day, "09:00-10:00", "DBMS", "kumar"),
        slot(&day, "11:00-12:00", "OS", "rao"),
    ];
    let store = Arc::new(MemoryStore::with_data(users, timetable));
    routes::router(AppState::new(store, Arc::new(Config::in_memory())))
}

struct Reply {
    status: StatusCode,
    headers: axum::http::HeaderMap,
    bytes: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    Reply { status, headers, bytes }
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "login {username}");
    reply.json()["access_token"].as_str().unwrap().to_string()
}

fn encode(timestamp: &str) -> String {
    timestamp.replace(' ', "%20")
}

#[tokio::test]
async fn login_and_session() {
    let app = app();

    let bad = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "kumar", "password": "nope" })),
    )
    .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad.json()["error"], "Invalid credentials. Please try again.");

    let anon = send(&app, Method::GET, "/auth/me", None, None).await;
    assert_eq!(anon.status, StatusCode::UNAUTHORIZED);

    let token = login(&app, "kumar", "pw").await;
    let me = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(me.status, StatusCode::OK);
    let me = me.json();
    assert_eq!(me["username"], "kumar");
    assert_eq!(me["role"], "faculty");
    assert!(me.get("password").is_none());

    let dash = send(&app, Method::GET, "/dashboard", Some(&token), None).await.json();
    assert_eq!(dash["role_label"], "Faculty");
    assert!(dash["features"].as_array().unwrap().contains(&json!("monthly_report")));
}

#[tokio::test]
async fn faculty_reports_once_and_can_undo() {
    let app = app();
    let token = login(&app, "kumar", "pw").await;
    let day = weekday_name(today());

    let view = send(&app, Method::GET, "/timetable?view=today", Some(&token), None).await.json();
    let rows = view["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["faculty_short"], "KUM");
    assert_eq!(rows[0]["action"]["kind"], "available");

    let report = json!({ "subject": "DBMS", "day": day, "time": "09:00-10:00", "status": "Cancelled" });
    let created = send(&app, Method::POST, "/timetable/report", Some(&token), Some(report.clone())).await;
    assert_eq!(created.status, StatusCode::CREATED);
    let timestamp = created.json()["timestamp"].as_str().unwrap().to_string();

    let again = send(&app, Method::POST, "/timetable/report", Some(&token), Some(report)).await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let view = send(&app, Method::GET, "/timetable?view=today", Some(&token), None).await.json();
    assert_eq!(view["rows"][0]["action"]["kind"], "submitted");
    assert_eq!(view["rows"][0]["action"]["timestamp"], timestamp.as_str());

    let history = send(&app, Method::GET, "/notifications/history", Some(&token), None).await.json();
    assert_eq!(history["total"], 1);
    assert_eq!(history["items"][0]["can_undo"], true);

    let uri = format!("/notifications/{}", encode(&timestamp));
    let undo = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(undo.status, StatusCode::OK);
    let undo = send(&app, Method::DELETE, &uri, Some(&token), None).await;
    assert_eq!(undo.status, StatusCode::NOT_FOUND);

    let history = send(&app, Method::GET, "/notifications/history", Some(&token), None).await.json();
    assert_eq!(history["total"], 0);
}

#[tokio::test]
async fn student_report_reaches_faculty_inbox() {
    let app = app();
    let student = login(&app, "s1", "pw").await;
    let faculty = login(&app, "kumar", "pw").await;
    let date = today().format("%Y-%m-%d").to_string();

    let options = send(&app, Method::GET, "/absence/options?subject=DBMS", Some(&student), None).await.json();
    assert_eq!(options["faculty"][0]["label"], "KUM - kumar");

    let forbidden = send(&app, Method::GET, "/absence/options", Some(&faculty), None).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let created = send(
        &app,
        Method::POST,
        "/absence",
        Some(&student),
        Some(json!({ "subject": "DBMS", "faculty": "kumar", "date": date, "time": "09:00-10:00" })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let timestamp = created.json()["timestamp"].as_str().unwrap().to_string();

    let inbox = send(&app, Method::GET, "/absence/inbox", Some(&faculty), None).await.json();
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    assert_eq!(inbox[0]["actions"].as_array().unwrap().len(), 3);

    let uri = format!("/absence/{}/respond", encode(&timestamp));
    let ok = send(&app, Method::POST, &uri, Some(&faculty), Some(json!({ "response": "coming" }))).await;
    assert_eq!(ok.status, StatusCode::OK);
    assert_eq!(ok.json()["message"], "I'm coming");
    let again = send(&app, Method::POST, &uri, Some(&faculty), Some(json!({ "response": "unavailable" }))).await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let mine = send(&app, Method::GET, "/absence/mine", Some(&student), None).await.json();
    assert_eq!(mine[0]["current"], true);
    assert_eq!(mine[0]["reports"][0]["response_text"], "I'm coming");
}

#[tokio::test]
async fn admin_manages_faculty() {
    let app = app();
    let admin = login(&app, "root", "toor").await;

    let created = send(
        &app,
        Method::POST,
        "/admin/faculty",
        Some(&admin),
        Some(json!({ "username": "rao", "password": "pw", "subjects": "OS, CN , OS", "divisions": "A" })),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.json()["subjects"], json!(["OS", "CN"]));

    let dup = send(
        &app,
        Method::POST,
        "/admin/faculty",
        Some(&admin),
        Some(json!({ "username": "kumar", "password": "x" })),
    )
    .await;
    assert_eq!(dup.status, StatusCode::CONFLICT);
    assert_eq!(dup.json()["error"], "A user with this username already exists.");

    let list = send(&app, Method::GET, "/admin/faculty", Some(&admin), None).await.json();
    let names: Vec<&str> = list.as_array().unwrap().iter().filter_map(|u| u["username"].as_str()).collect();
    assert_eq!(names, vec!["kumar", "rao"]);

    let updated = send(
        &app,
        Method::PUT,
        "/admin/faculty/rao",
        Some(&admin),
        Some(json!({ "subjects": "DBMS" })),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    // Password unchanged by the update.
    login(&app, "rao", "pw").await;

    let deleted = send(&app, Method::DELETE, "/admin/faculty/rao", Some(&admin), None).await;
    assert_eq!(deleted.status, StatusCode::OK);

    let student = login(&app, "s1", "pw").await;
    let denied = send(&app, Method::GET, "/admin/faculty", Some(&student), None).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn exports_csv_and_xlsx() {
    let app = app();
    let student = login(&app, "s1", "pw").await;

    let csv = send(&app, Method::GET, "/timetable/export.csv", Some(&student), None).await;
    assert_eq!(csv.status, StatusCode::OK);
    assert!(csv.headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
    let text = String::from_utf8(csv.bytes).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("day,time,subject,type,faculty,room,division,batch"));
    assert_eq!(lines.count(), 2);

    let faculty = login(&app, "kumar", "pw").await;
    let xlsx = send(
        &app,
        Method::GET,
        "/reports/monthly/export?division=A&month=3&year=2025",
        Some(&faculty),
        None,
    )
    .await;
    assert_eq!(xlsx.status, StatusCode::OK);
    assert_eq!(
        xlsx.headers[header::CONTENT_DISPOSITION].to_str().unwrap(),
        "attachment; filename=\"A_3_2025_report.xlsx\""
    );
    // Zip container magic.
    assert_eq!(&xlsx.bytes[..2], b"PK");

    let other = send(
        &app,
        Method::GET,
        "/reports/monthly?division=Z&month=3&year=2025",
        Some(&faculty),
        None,
    )
    .await;
    assert_eq!(other.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_and_metrics() {
    let app = app();
    let health = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.json()["status"], "ok");

    let metrics = send(&app, Method::GET, "/metrics", None, None).await;
    assert_eq!(metrics.status, StatusCode::OK);
}
