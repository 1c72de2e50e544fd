use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::groups;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = groups)]
pub struct Group {
    pub id: i32,
    pub code: String,
    pub year: Option<i32>,
    pub faculty: Option<String>,
    pub specialization: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = groups)]
pub struct NewGroup<'a> {
    pub code: &'a str,
    pub year: Option<i32>,
    pub faculty: Option<&'a str>,
    pub specialization: Option<&'a str>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = groups)]
pub struct UpdateGroup {
    pub code: Option<String>,
    pub year: Option<i32>,
    pub faculty: Option<String>,
    pub specialization: Option<String>,
}

impl UpdateGroup {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.year.is_none()
            && self.faculty.is_none()
            && self.specialization.is_none()
    }
}
