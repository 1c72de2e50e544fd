//! Interactive creation of an administrator account.

use std::io::{self, Write};
use std::path::Path;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use timetable_api::auth::password::{hash_password, MIN_PASSWORD_LEN};
use timetable_api::db::schema::users;
use timetable_api::models::user::{self, normalize_username, NewUser, User, UserRole};

fn prompt(label: &str) -> String {
    print!("{label}: ");
    io::stdout().flush().expect("flush stdout");
    let mut input = String::new();
    io::stdin().read_line(&mut input).expect("read stdin");
    input.trim().to_string()
}

fn fail(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    println!("=== Timetable administrator setup ===\n");

    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL env var is required");

    let username = normalize_username(&prompt("Admin email"));
    if !username.contains('@') {
        fail("The username must be an email address.");
    }

    print!("Password: ");
    io::stdout().flush().expect("flush stdout");
    let password = rpassword::read_password().expect("failed to read password");
    if password.chars().count() < MIN_PASSWORD_LEN {
        fail(&format!("Password must be at least {MIN_PASSWORD_LEN} characters."));
    }
    print!("Repeat password: ");
    io::stdout().flush().expect("flush stdout");
    if rpassword::read_password().expect("failed to read password") != password {
        fail("Passwords do not match.");
    }

    let pool = timetable_api::db::pool::connect(&database_url, 1).await;
    let mut conn = pool.get().await.expect("failed to get a database connection");

    match user::find_by_username(&mut conn, &username).await {
        Ok(Some(_)) => fail(&format!("User '{username}' already exists.")),
        Ok(None) => {}
        Err(e) => fail(&format!("Database error: {e}")),
    }

    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(e) => fail(&e.message),
    };

    let admin: User = diesel::insert_into(users::table)
        .values(NewUser {
            username: &username,
            password_hash: Some(&password_hash),
            role: UserRole::Admin,
            is_active: true,
        })
        .returning(User::as_returning())
        .get_result(&mut conn)
        .await
        .unwrap_or_else(|e| fail(&format!("Failed to create user: {e}")));

    println!("\nAdministrator created.");
    println!("  Email: {}", admin.username);
    println!("  ID:    {}", admin.id);
}
