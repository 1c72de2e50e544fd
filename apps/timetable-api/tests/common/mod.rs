#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use parking_lot::Mutex;

use timetable_api::auth::tokens::{self, AccessTokenData};
use timetable_api::config::{test_database_url, Config};
use timetable_api::db::kv::{KeyValueStore, MemoryStore};
use timetable_api::db::pool::DbPool;
use timetable_api::db::schema::{groups, professors, rooms, schedules, subjects, user_groups, users};
use timetable_api::models::group::{Group, NewGroup};
use timetable_api::models::professor::{NewProfessor, Professor};
use timetable_api::models::room::{NewRoom, Room};
use timetable_api::models::subject::{NewSubject, Subject};
use timetable_api::models::user::{NewUser, User, UserRole};
use timetable_api::notify::mailer::{MailError, Mailer};
use timetable_api::AppState;

/// Captures outgoing mail instead of talking to a relay.
#[derive(Default)]
pub struct RecordingMailer {
    pub notices: Mutex<Vec<(String, String)>>,
    pub codes: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    /// Most recent verification code mailed to `address`.
    pub fn last_code_for(&self, address: &str) -> Option<String> {
        self.codes
            .lock()
            .iter()
            .rev()
            .find(|(to, _)| to == address)
            .map(|(_, code)| code.clone())
    }

    pub fn notices_for_group(&self, group_code: &str) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|(_, code)| code == group_code)
            .map(|(to, _)| to.clone())
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_schedule_notice(&self, address: &str, group_code: &str) -> Result<(), MailError> {
        self.notices
            .lock()
            .push((address.to_string(), group_code.to_string()));
        Ok(())
    }

    async fn send_verification_code(&self, address: &str, code: &str) -> Result<(), MailError> {
        self.codes
            .lock()
            .push((address.to_string(), code.to_string()));
        Ok(())
    }
}

/// Build an AppState against the `_test` database with in-memory KV and a
/// recording mailer. Notification pacing is disabled.
pub async fn test_state() -> (AppState, Arc<RecordingMailer>) {
    let env_path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    let _ = dotenvy::from_path(env_path);

    let mut config = Config::from_env();
    config.database_url = test_database_url(&config.database_url);
    config.notify_send_delay = Duration::ZERO;

    let db = timetable_api::db::pool::connect(&config.database_url, 5).await;
    let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let mailer = Arc::new(RecordingMailer::default());

    let state = AppState::new(db, kv, config, mailer.clone());
    (state, mailer)
}

/// Build the full router with state applied.
pub async fn test_app() -> (Router, AppState, Arc<RecordingMailer>) {
    let (state, mailer) = test_state().await;
    let app = timetable_api::routes::router().with_state(state.clone());
    (app, state, mailer)
}

/// A short unique suffix so parallel tests never collide on unique columns.
pub fn unique(tag: &str) -> String {
    let id = timetable_common::prefixed_ulid(tag);
    id.to_lowercase()
}

pub fn unique_email(tag: &str) -> String {
    format!("{}@test.uni.edu", unique(tag))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub async fn insert_user(
    db: &DbPool,
    username: &str,
    role: UserRole,
    password_hash: Option<&str>,
) -> User {
    let mut conn = db.get().await.expect("db conn");
    diesel::insert_into(users::table)
        .values(NewUser {
            username,
            password_hash,
            role,
            is_active: password_hash.is_some(),
        })
        .returning(User::as_returning())
        .get_result(&mut conn)
        .await
        .expect("insert user")
}

pub async fn add_to_group(db: &DbPool, user_id: i32, group_id: i32) {
    let mut conn = db.get().await.expect("db conn");
    diesel::insert_into(user_groups::table)
        .values((
            user_groups::user_id.eq(user_id),
            user_groups::group_id.eq(group_id),
        ))
        .execute(&mut conn)
        .await
        .expect("insert membership");
}

/// Mint an access token without going through the login endpoint.
pub async fn token_for(state: &AppState, user: &User) -> String {
    tokens::issue_access_token(
        state.kv.as_ref(),
        &AccessTokenData {
            user_id: user.id,
            role: user.role,
        },
    )
    .await
    .expect("issue token")
}

/// Create an administrator and return it with a bearer token.
pub async fn admin_with_token(state: &AppState) -> (User, String) {
    let admin = insert_user(&state.db, &unique_email("adm"), UserRole::Admin, Some("x")).await;
    let token = token_for(state, &admin).await;
    (admin, token)
}

pub async fn cleanup_user(db: &DbPool, user_id: i32) {
    let mut conn = db.get().await.expect("db conn");
    let _ = diesel::delete(users::table.find(user_id))
        .execute(&mut conn)
        .await;
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// One row of each reference table, enough to build a timetable entry.
pub struct References {
    pub group: Group,
    pub subject: Subject,
    pub professor: Professor,
    pub room: Room,
}

pub async fn insert_group(db: &DbPool, code: &str) -> Group {
    let mut conn = db.get().await.expect("db conn");
    diesel::insert_into(groups::table)
        .values(NewGroup {
            code,
            year: Some(2),
            faculty: Some("Computer Science"),
            specialization: None,
        })
        .returning(Group::as_returning())
        .get_result(&mut conn)
        .await
        .expect("insert group")
}

pub async fn cleanup_group(db: &DbPool, group_id: i32) {
    let mut conn = db.get().await.expect("db conn");
    let _ = diesel::delete(groups::table.find(group_id))
        .execute(&mut conn)
        .await;
}

pub async fn insert_references(db: &DbPool) -> References {
    let group = insert_group(db, &unique("grp")).await;

    let mut conn = db.get().await.expect("db conn");
    let subject_code = unique("sub");
    let subject = diesel::insert_into(subjects::table)
        .values(NewSubject {
            name: "Algorithms",
            code: &subject_code,
            semester: Some("1"),
        })
        .returning(Subject::as_returning())
        .get_result(&mut conn)
        .await
        .expect("insert subject");

    let professor = diesel::insert_into(professors::table)
        .values(NewProfessor {
            full_name: "Dr. Test",
            department: None,
            email: None,
        })
        .returning(Professor::as_returning())
        .get_result(&mut conn)
        .await
        .expect("insert professor");

    let room_code = unique("room");
    let room = diesel::insert_into(rooms::table)
        .values(NewRoom {
            code: &room_code,
            building: Some("C"),
            capacity: Some(30),
        })
        .returning(Room::as_returning())
        .get_result(&mut conn)
        .await
        .expect("insert room");

    References {
        group,
        subject,
        professor,
        room,
    }
}

/// Request body for a timetable entry on the given references.
pub fn schedule_body(refs: &References) -> serde_json::Value {
    serde_json::json!({
        "group_id": refs.group.id,
        "subject_id": refs.subject.id,
        "professor_id": refs.professor.id,
        "room_id": refs.room.id,
        "day": "Monday",
        "hour": "08:00-10:00",
        "session_type": "course",
    })
}

/// Delete the references together with any timetable entries using them.
pub async fn cleanup_references(db: &DbPool, refs: &References) {
    let mut conn = db.get().await.expect("db conn");
    let _ = diesel::delete(schedules::table.filter(schedules::group_id.eq(refs.group.id)))
        .execute(&mut conn)
        .await;
    let _ = diesel::delete(groups::table.find(refs.group.id))
        .execute(&mut conn)
        .await;
    let _ = diesel::delete(subjects::table.find(refs.subject.id))
        .execute(&mut conn)
        .await;
    let _ = diesel::delete(professors::table.find(refs.professor.id))
        .execute(&mut conn)
        .await;
    let _ = diesel::delete(rooms::table.find(refs.room.id))
        .execute(&mut conn)
        .await;
}
