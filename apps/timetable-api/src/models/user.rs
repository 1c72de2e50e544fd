use std::fmt;
use std::str::FromStr;

use diesel::deserialize::FromSqlRow;
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::{groups, user_groups, users};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsExpression, FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Professor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Professor => "professor",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(UserRole::Student),
            "professor" => Ok(UserRole::Professor),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("unknown user role `{other}`")),
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

super::text_sql_enum!(UserRole);

/// An account. `username` is the user's institutional email address.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password_hash: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
}

impl User {
    pub fn has_password(&self) -> bool {
        self.password_hash
            .as_deref()
            .is_some_and(|h| !h.trim().is_empty())
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: Option<&'a str>,
    pub role: UserRole,
    pub is_active: bool,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = users)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
}

impl UpdateUser {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.password_hash.is_none()
            && self.role.is_none()
            && self.is_active.is_none()
    }
}

/// Public view of a user, including the student's group if any.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub role: UserRole,
    pub is_active: bool,
    pub group_id: Option<i32>,
    pub group_code: Option<String>,
}

impl UserResponse {
    pub fn new(user: User, group: Option<(i32, String)>) -> Self {
        let (group_id, group_code) = match group {
            Some((id, code)) => (Some(id), Some(code)),
            None => (None, None),
        };
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            is_active: user.is_active,
            group_id,
            group_code,
        }
    }
}

/// Usernames are email addresses and compared case-insensitively.
pub fn normalize_username(username: &str) -> String {
    username.trim().to_lowercase()
}

pub async fn find_by_username(
    conn: &mut AsyncPgConnection,
    username: &str,
) -> QueryResult<Option<User>> {
    users::table
        .filter(users::username.eq(normalize_username(username)))
        .select(User::as_select())
        .first(conn)
        .await
        .optional()
}

/// The group a user belongs to, as `(group_id, group_code)`.
pub async fn find_group(
    conn: &mut AsyncPgConnection,
    user_id: i32,
) -> QueryResult<Option<(i32, String)>> {
    user_groups::table
        .inner_join(groups::table)
        .filter(user_groups::user_id.eq(user_id))
        .select((groups::id, groups::code))
        .first(conn)
        .await
        .optional()
}
