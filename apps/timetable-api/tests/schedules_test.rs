mod common;

use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum_test::TestServer;

use timetable_api::models::user::UserRole;

// ---------------------------------------------------------------------------
// POST /schedule
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_schedule_returns_resolved_entry_at_version_one() {
    let (app, state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();
    let (admin, token) = common::admin_with_token(&state).await;
    let refs = common::insert_references(&state.db).await;

    let resp = server
        .post("/schedule")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&common::schedule_body(&refs))
        .await;

    resp.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["version"], 1);
    assert_eq!(body["status"], "normal");
    assert_eq!(body["session_type"], "course");
    assert_eq!(body["group"]["code"], refs.group.code);
    assert_eq!(body["subject"]["id"], refs.subject.id);
    assert_eq!(body["room"]["code"], refs.room.code);
    assert!(body["odd_week_subject"].is_null());

    common::cleanup_references(&state.db, &refs).await;
    common::cleanup_user(&state.db, admin.id).await;
}

#[tokio::test]
async fn create_schedule_requires_auth() {
    let (app, _state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();

    let resp = server
        .post("/schedule")
        .json(&serde_json::json!({}))
        .await;

    resp.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_schedule_rejects_students() {
    let (app, state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();
    let refs = common::insert_references(&state.db).await;

    let student = common::insert_user(
        &state.db,
        &common::unique_email("stu"),
        UserRole::Student,
        Some("x"),
    )
    .await;
    let token = common::token_for(&state, &student).await;

    let resp = server
        .post("/schedule")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&common::schedule_body(&refs))
        .await;

    resp.assert_status(StatusCode::FORBIDDEN);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    common::cleanup_references(&state.db, &refs).await;
    common::cleanup_user(&state.db, student.id).await;
}

#[tokio::test]
async fn create_schedule_with_unknown_reference_is_bad_request() {
    let (app, state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();
    let (admin, token) = common::admin_with_token(&state).await;
    let refs = common::insert_references(&state.db).await;

    let mut body = common::schedule_body(&refs);
    body["room_id"] = serde_json::json!(i32::MAX);

    let resp = server
        .post("/schedule")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&body)
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);

    common::cleanup_references(&state.db, &refs).await;
    common::cleanup_user(&state.db, admin.id).await;
}

#[tokio::test]
async fn create_schedule_rejects_unknown_session_type() {
    let (app, state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();
    let (admin, token) = common::admin_with_token(&state).await;
    let refs = common::insert_references(&state.db).await;

    let mut body = common::schedule_body(&refs);
    body["session_type"] = serde_json::json!("workshop");

    let resp = server
        .post("/schedule")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&body)
        .await;

    resp.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    common::cleanup_references(&state.db, &refs).await;
    common::cleanup_user(&state.db, admin.id).await;
}

#[tokio::test]
async fn create_schedule_validates_blank_slot() {
    let (app, state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();
    let (admin, token) = common::admin_with_token(&state).await;
    let refs = common::insert_references(&state.db).await;

    let mut body = common::schedule_body(&refs);
    body["day"] = serde_json::json!("  ");

    let resp = server
        .post("/schedule")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&body)
        .await;

    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    common::cleanup_references(&state.db, &refs).await;
    common::cleanup_user(&state.db, admin.id).await;
}

// ---------------------------------------------------------------------------
// GET /schedule/{group_code}, GET /schedule/id/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn group_listing_and_lookup_by_id() {
    let (app, state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();
    let (admin, token) = common::admin_with_token(&state).await;
    let refs = common::insert_references(&state.db).await;

    let created: serde_json::Value = server
        .post("/schedule")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&common::schedule_body(&refs))
        .await
        .json();
    let id = created["id"].as_i64().unwrap();

    let resp = server.get(&format!("/schedule/{}", refs.group.code)).await;
    resp.assert_status_ok();
    let list: Vec<serde_json::Value> = resp.json();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], id);

    let resp = server.get(&format!("/schedule/id/{id}")).await;
    resp.assert_status_ok();
    let one: serde_json::Value = resp.json();
    assert_eq!(one["group"]["id"], refs.group.id);

    common::cleanup_references(&state.db, &refs).await;
    common::cleanup_user(&state.db, admin.id).await;
}

#[tokio::test]
async fn unknown_group_code_lists_nothing() {
    let (app, _state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();

    let resp = server
        .get(&format!("/schedule/{}", common::unique("missing")))
        .await;

    resp.assert_status_ok();
    let list: Vec<serde_json::Value> = resp.json();
    assert!(list.is_empty());
}

#[tokio::test]
async fn missing_schedule_id_is_not_found() {
    let (app, _state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();

    let resp = server.get(&format!("/schedule/id/{}", i32::MAX)).await;
    resp.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_filters_by_academic_year() {
    let (app, state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();
    let (admin, token) = common::admin_with_token(&state).await;
    let refs = common::insert_references(&state.db).await;

    let mut body = common::schedule_body(&refs);
    body["academic_year"] = serde_json::json!(1987);
    body["semester"] = serde_json::json!("2");
    server
        .post("/schedule")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&body)
        .await
        .assert_status(StatusCode::CREATED);

    let resp = server.get("/schedule?academic_year=1987&semester=2").await;
    resp.assert_status_ok();
    let list: Vec<serde_json::Value> = resp.json();
    assert!(list.iter().all(|s| s["academic_year"] == 1987));
    assert!(list.iter().any(|s| s["group"]["id"] == refs.group.id));

    common::cleanup_references(&state.db, &refs).await;
    common::cleanup_user(&state.db, admin.id).await;
}

// ---------------------------------------------------------------------------
// PUT /schedule/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_bumps_version_on_every_call() {
    let (app, state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();
    let (admin, token) = common::admin_with_token(&state).await;
    let refs = common::insert_references(&state.db).await;

    let created: serde_json::Value = server
        .post("/schedule")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&common::schedule_body(&refs))
        .await
        .json();
    let id = created["id"].as_i64().unwrap();

    let resp = server
        .put(&format!("/schedule/{id}"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "status": "canceled", "notes": "Rector's day" }))
        .await;
    resp.assert_status_ok();
    let updated: serde_json::Value = resp.json();
    assert_eq!(updated["version"], 2);
    assert_eq!(updated["status"], "canceled");
    assert_eq!(updated["notes"], "Rector's day");
    assert_eq!(updated["day"], "Monday");

    let resp = server
        .put(&format!("/schedule/{id}"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "room_id": refs.room.id }))
        .await;
    let updated: serde_json::Value = resp.json();
    assert_eq!(updated["version"], 3);

    common::cleanup_references(&state.db, &refs).await;
    common::cleanup_user(&state.db, admin.id).await;
}

#[tokio::test]
async fn update_missing_schedule_is_not_found() {
    let (app, state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();
    let (admin, token) = common::admin_with_token(&state).await;

    let resp = server
        .put(&format!("/schedule/{}", i32::MAX))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&serde_json::json!({ "status": "moved" }))
        .await;

    resp.assert_status(StatusCode::NOT_FOUND);
    common::cleanup_user(&state.db, admin.id).await;
}

// ---------------------------------------------------------------------------
// DELETE /schedule/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_removes_entry_once() {
    let (app, state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();
    let (admin, token) = common::admin_with_token(&state).await;
    let refs = common::insert_references(&state.db).await;

    let created: serde_json::Value = server
        .post("/schedule")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&common::schedule_body(&refs))
        .await
        .json();
    let id = created["id"].as_i64().unwrap();

    server
        .delete(&format!("/schedule/{id}"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .assert_status_ok();

    server
        .get(&format!("/schedule/id/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .delete(&format!("/schedule/{id}"))
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    common::cleanup_references(&state.db, &refs).await;
    common::cleanup_user(&state.db, admin.id).await;
}

// ---------------------------------------------------------------------------
// POST /schedule/refresh-all
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_all_reports_entry_count() {
    let (app, state, _mailer) = common::test_app().await;
    let server = TestServer::new(app).unwrap();
    let (admin, token) = common::admin_with_token(&state).await;
    let refs = common::insert_references(&state.db).await;

    server
        .post("/schedule")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .json(&common::schedule_body(&refs))
        .await
        .assert_status(StatusCode::CREATED);

    let resp = server
        .post("/schedule/refresh-all")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;

    resp.assert_status_ok();
    let body: serde_json::Value = resp.json();
    assert!(body["schedules_count"].as_u64().unwrap() >= 1);
    assert_eq!(body["message"], "Refresh sent to 0 clients");

    common::cleanup_references(&state.db, &refs).await;
    common::cleanup_user(&state.db, admin.id).await;
}
