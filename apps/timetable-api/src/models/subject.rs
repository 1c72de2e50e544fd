use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::subjects;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = subjects)]
pub struct Subject {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub semester: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = subjects)]
pub struct NewSubject<'a> {
    pub name: &'a str,
    pub code: &'a str,
    pub semester: Option<&'a str>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = subjects)]
pub struct UpdateSubject {
    pub name: Option<String>,
    pub code: Option<String>,
    pub semester: Option<String>,
}

impl UpdateSubject {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.code.is_none() && self.semester.is_none()
    }
}
