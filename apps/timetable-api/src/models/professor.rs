use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::professors;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = professors)]
pub struct Professor {
    pub id: i32,
    pub full_name: String,
    pub department: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = professors)]
pub struct NewProfessor<'a> {
    pub full_name: &'a str,
    pub department: Option<&'a str>,
    pub email: Option<&'a str>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = professors)]
pub struct UpdateProfessor {
    pub full_name: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
}

impl UpdateProfessor {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.department.is_none() && self.email.is_none()
    }
}
