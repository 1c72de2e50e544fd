//! Applies the embedded SQL migrations.
//!
//! Usage:
//!   cargo run -p timetable-api --bin timetable-migrate
//!   cargo run -p timetable-api --bin timetable-migrate -- --test
//!
//! `--test` targets the `<name>_test` database used by the integration tests.

use std::path::Path;

use diesel::Connection;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::AsyncPgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use timetable_api::config::test_database_url;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

fn main() {
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    let mut database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL env var is required");
    if std::env::args().any(|arg| arg == "--test") {
        database_url = test_database_url(&database_url);
    }

    let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&database_url)
        .expect("failed to connect to database");

    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .expect("failed to run migrations");

    if applied.is_empty() {
        println!("Timetable schema is up to date.");
        return;
    }
    for version in &applied {
        println!("  applied {version}");
    }
    println!("{} migration(s) applied.", applied.len());
}
