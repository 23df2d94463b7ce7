//! Integration tests for the attendance server
//!
//! These tests drive the HTTP router end to end against an on-disk
//! database:
//! - Sign-in and role checks
//! - Attendance marking, merging and bulk entry
//! - Subjects and mid marks

use axum::body::{Body, BodyDataStream};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use college_attendance::{api, app, config::ServerConfig};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_LOGIN: &str = "admin@college.edu";
const ADMIN_PASSWORD: &str = "admin123";

/// Helper to build the router over a fresh database
async fn create_test_app() -> (Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();

    let config = ServerConfig {
        db_path: temp_dir.path().join("test.db"),
        admin_login: ADMIN_LOGIN.to_string(),
        admin_password: ADMIN_PASSWORD.to_string(),
        ..ServerConfig::default()
    };

    let state = app::setup(config).await.unwrap();
    (api::router(state), temp_dir)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }

    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    (status, value)
}

async fn login(app: &Router, login: &str, password: &str, role: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "login": login, "password": password, "role": role })),
    )
    .await
}

async fn admin_token(app: &Router) -> String {
    let (status, body) = login(app, ADMIN_LOGIN, ADMIN_PASSWORD, "admin").await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn create_student(app: &Router, token: &str, name: &str, branch: &str, year: i32) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/admin/students",
        Some(token),
        Some(json!({
            "name": name,
            "roll_number": format!("R-{}", name),
            "branch": branch,
            "year": year,
            "batch": "2022-26",
            "login": format!("{}@college.edu", name.to_lowercase()),
            "password": "secret1"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn test_health() {
    let (app, _temp) = create_test_app().await;

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_login_rejections_are_generic() {
    let (app, _temp) = create_test_app().await;

    let (wrong_password, body_a) = login(&app, ADMIN_LOGIN, "nope-nope", "admin").await;
    let (unknown_user, body_b) = login(&app, "ghost@college.edu", ADMIN_PASSWORD, "admin").await;
    let (wrong_role, body_c) = login(&app, ADMIN_LOGIN, ADMIN_PASSWORD, "student").await;

    assert_eq!(wrong_password, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_role, StatusCode::UNAUTHORIZED);
    assert_eq!(body_a, body_b);
    assert_eq!(body_b, body_c);
}

#[tokio::test]
async fn test_routes_require_matching_role() {
    let (app, _temp) = create_test_app().await;
    let admin = admin_token(&app).await;
    create_student(&app, &admin, "Asha", "CSE", 2).await;

    let (status, _) = send(&app, Method::GET, "/api/admin/dashboard", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = login(&app, "asha@college.edu", "secret1", "student").await;
    let student = body["token"].as_str().unwrap().to_string();

    let (status, _) = send(&app, Method::GET, "/api/admin/dashboard", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/api/student/profile", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, Method::GET, "/api/student/profile", Some(&student), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Asha");
}

#[tokio::test]
async fn test_logout_revokes_token() {
    let (app, _temp) = create_test_app().await;
    let admin = admin_token(&app).await;

    let (status, _) = send(&app, Method::POST, "/api/auth/logout", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, "/api/admin/dashboard", Some(&admin), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_attendance_submit_and_merge() {
    let (app, _temp) = create_test_app().await;
    let admin = admin_token(&app).await;

    let asha = create_student(&app, &admin, "Asha", "CSE", 2).await;
    let bala = create_student(&app, &admin, "Bala", "CSE", 2).await;
    let asha_id = asha["id"].as_str().unwrap();
    let bala_id = bala["id"].as_str().unwrap();

    let (status, first) = send(
        &app,
        Method::POST,
        "/api/admin/attendance",
        Some(&admin),
        Some(json!({
            "date": "2024-03-01",
            "branch": "CSE",
            "year": 2,
            "students": [
                { "student_id": asha_id, "present": true },
                { "student_id": bala_id, "present": false }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    assert_eq!(first["created_session"], true);
    assert_eq!(first["inserted"], 2);

    let (status, second) = send(
        &app,
        Method::POST,
        "/api/admin/attendance",
        Some(&admin),
        Some(json!({
            "date": "2024-03-01",
            "students": [{ "student_id": bala_id, "present": true }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created_session"], false);
    assert_eq!(second["updated"], 1);
    assert_eq!(second["session"]["id"], first["session"]["id"]);

    let (status, page) = send(
        &app,
        Method::GET,
        "/api/admin/attendance?date=2024-03-01&branch=CSE&year=all",
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["roster"].as_array().unwrap().len(), 2);
    assert_eq!(page["session"]["records"].as_array().unwrap().len(), 2);
    assert_eq!(page["session"]["summary"]["present"], 2);
    assert_eq!(page["session"]["summary"]["percentage"], 100.0);
}

#[tokio::test]
async fn test_attendance_validation() {
    let (app, _temp) = create_test_app().await;
    let admin = admin_token(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/attendance",
        Some(&admin),
        Some(json!({ "date": "2024-03-01", "students": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/attendance/bulk",
        Some(&admin),
        Some(json!({ "date": "2024-03-01", "percentage": 150.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_bulk_attendance_and_student_dashboard() {
    let (app, _temp) = create_test_app().await;
    let admin = admin_token(&app).await;

    for name in ["Dev", "Chitra", "Bala", "Asha"] {
        create_student(&app, &admin, name, "ECE", 3).await;
    }
    create_student(&app, &admin, "Zoya", "CSE", 3).await;

    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    let (status, bulk) = send(
        &app,
        Method::POST,
        "/api/admin/attendance/bulk",
        Some(&admin),
        Some(json!({ "date": today, "branch": "ECE", "year": 3, "percentage": 50.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", bulk);
    assert_eq!(bulk["present"], 2);
    assert_eq!(bulk["absent"], 2);
    assert_eq!(bulk["session"]["is_direct_entry"], true);

    let (_, body) = login(&app, "asha@college.edu", "secret1", "student").await;
    let asha = body["token"].as_str().unwrap().to_string();
    let (status, dashboard) = send(&app, Method::GET, "/api/student/dashboard", Some(&asha), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["today"], "present");
    assert_eq!(dashboard["overall"]["percentage"], 100.0);

    let (_, body) = login(&app, "dev@college.edu", "secret1", "student").await;
    let dev = body["token"].as_str().unwrap().to_string();
    let (_, dashboard) = send(&app, Method::GET, "/api/student/dashboard", Some(&dev), None).await;
    assert_eq!(dashboard["today"], "absent");

    let (_, body) = login(&app, "zoya@college.edu", "secret1", "student").await;
    let zoya = body["token"].as_str().unwrap().to_string();
    let (_, dashboard) = send(&app, Method::GET, "/api/student/dashboard", Some(&zoya), None).await;
    assert_eq!(dashboard["today"], "not_marked");

    let (status, admin_dashboard) =
        send(&app, Method::GET, "/api/admin/dashboard", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(admin_dashboard["total_students"], 5);
    assert_eq!(admin_dashboard["today"]["total"], 4);
    assert_eq!(admin_dashboard["today"]["present"], 2);
    assert_eq!(admin_dashboard["branches"], json!(["CSE", "ECE"]));
}

/// Next SSE frame as text, or `None` if nothing arrives within `wait`
async fn next_frame(frames: &mut BodyDataStream, wait: Duration) -> Option<String> {
    match tokio::time::timeout(wait, frames.next()).await {
        Ok(Some(chunk)) => Some(String::from_utf8(chunk.unwrap().to_vec()).unwrap()),
        Ok(None) => panic!("live dashboard stream ended"),
        Err(_) => None,
    }
}

#[tokio::test]
async fn test_live_dashboard_is_event_stream() {
    let (app, _temp) = create_test_app().await;
    let admin = admin_token(&app).await;
    let student = create_student(&app, &admin, "Asha", "CSE", 2).await;
    let student_id = student["id"].as_str().unwrap();

    let (_, body) = login(&app, "asha@college.edu", "secret1", "student").await;
    let token = body["token"].as_str().unwrap();

    let request = Request::builder()
        .uri("/api/student/dashboard/live")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");

    let mut frames = response.into_body().into_data_stream();

    let first = next_frame(&mut frames, Duration::from_secs(5))
        .await
        .expect("initial status frame");
    assert!(first.contains("event: status"), "{}", first);
    assert!(first.contains(r#""today":"not_marked""#), "{}", first);

    // A write for another day does not wake the stream
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/attendance",
        Some(&admin),
        Some(json!({
            "date": "2024-03-01",
            "students": [{ "student_id": student_id, "present": true }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(next_frame(&mut frames, Duration::from_millis(300)).await, None);

    let today = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/attendance",
        Some(&admin),
        Some(json!({
            "date": today,
            "students": [{ "student_id": student_id, "present": true }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let second = next_frame(&mut frames, Duration::from_secs(5))
        .await
        .expect("status frame after today's write");
    assert!(second.contains("event: status"), "{}", second);
    assert!(second.contains(r#""today":"present""#), "{}", second);
}

#[tokio::test]
async fn test_deleted_student_cannot_sign_in() {
    let (app, _temp) = create_test_app().await;
    let admin = admin_token(&app).await;
    let student = create_student(&app, &admin, "Asha", "CSE", 2).await;
    let id = student["id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/admin/students/{}", id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = login(&app, "asha@college.edu", "secret1", "student").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/admin/students/{}", id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_marks_entry_and_results() {
    let (app, _temp) = create_test_app().await;
    let admin = admin_token(&app).await;
    let student = create_student(&app, &admin, "Asha", "CSE", 2).await;
    let student_id = student["id"].as_str().unwrap();

    let mut subject_ids = Vec::new();
    for (name, code) in [("Data Structures", "CS201"), ("Operating Systems", "CS202")] {
        let (status, subject) = send(
            &app,
            Method::POST,
            "/api/admin/subjects",
            Some(&admin),
            Some(json!({ "name": name, "code": code, "semester": 3, "branch": "CSE" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        subject_ids.push(subject["id"].as_str().unwrap().to_string());
    }

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/admin/marks",
        Some(&admin),
        Some(json!({ "semester": 3, "mid_number": 1, "marks": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut marks = serde_json::Map::new();
    marks.insert(subject_ids[0].clone(), json!(45));
    marks.insert(subject_ids[1].clone(), json!(21));

    let (status, saved) = send(
        &app,
        Method::PUT,
        "/api/admin/marks",
        Some(&admin),
        Some(json!({
            "student_id": student_id,
            "semester": 3,
            "mid_number": 1,
            "marks": marks
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", saved);
    assert_eq!(saved.as_array().unwrap().len(), 2);

    let (status, sheet) = send(
        &app,
        Method::GET,
        &format!("/api/admin/marks?student_id={}&semester=3&mid=1", student_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sheet["marks"][subject_ids[0].as_str()], 30);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/admin/subjects/{}", subject_ids[1]),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = login(&app, "asha@college.edu", "secret1", "student").await;
    let token = body["token"].as_str().unwrap().to_string();
    let (status, results) = send(
        &app,
        Method::GET,
        "/api/student/results?semester=3&mid=1",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results["subjects"].as_array().unwrap().len(), 1);
    assert_eq!(results["subjects"][0]["marks"], 30);
    assert_eq!(results["orphaned"][0]["marks"], 21);
    assert_eq!(results["orphaned"][0]["subject_name"], Value::Null);
}
