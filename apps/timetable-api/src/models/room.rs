use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::rooms;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Serialize, Deserialize, ToSchema)]
#[diesel(table_name = rooms)]
pub struct Room {
    pub id: i32,
    pub code: String,
    pub building: Option<String>,
    pub capacity: Option<i32>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = rooms)]
pub struct NewRoom<'a> {
    pub code: &'a str,
    pub building: Option<&'a str>,
    pub capacity: Option<i32>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = rooms)]
pub struct UpdateRoom {
    pub code: Option<String>,
    pub building: Option<String>,
    pub capacity: Option<i32>,
}

impl UpdateRoom {
    pub fn is_empty(&self) -> bool {
        self.code.is_none() && self.building.is_none() && self.capacity.is_none()
    }
}
