//! Group membership lookups used by the notification fan-out.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::db::pool::DbPool;
use crate::db::schema::{groups, user_groups, users};
use crate::error::ApiError;
use crate::models::user::UserRole;

#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Display code of a group, or `None` if the id does not exist.
    async fn resolve_group_code(&self, group_id: i32) -> Result<Option<String>, ApiError>;

    /// Contact addresses of the group's students. Usernames are institutional
    /// email addresses.
    async fn list_students(&self, group_id: i32) -> Result<Vec<String>, ApiError>;
}

pub struct DbGroupDirectory {
    db: DbPool,
}

impl DbGroupDirectory {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl GroupDirectory for DbGroupDirectory {
    async fn resolve_group_code(&self, group_id: i32) -> Result<Option<String>, ApiError> {
        let mut conn = self.db.get().await?;
        let code = groups::table
            .find(group_id)
            .select(groups::code)
            .first::<String>(&mut conn)
            .await
            .optional()?;
        Ok(code)
    }

    async fn list_students(&self, group_id: i32) -> Result<Vec<String>, ApiError> {
        let mut conn = self.db.get().await?;
        let addresses = user_groups::table
            .inner_join(users::table)
            .filter(user_groups::group_id.eq(group_id))
            .filter(users::role.eq(UserRole::Student))
            .order(users::username.asc())
            .select(users::username)
            .load::<String>(&mut conn)
            .await?;
        Ok(addresses)
    }
}
