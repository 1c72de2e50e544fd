use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use diesel::deserialize::FromSqlRow;
use diesel::expression::AsExpression;
use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::schema::{groups, professors, rooms, schedules, subjects};
use crate::models::group::Group;
use crate::models::professor::Professor;
use crate::models::room::Room;
use crate::models::subject::Subject;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    #[default]
    Course,
    Seminar,
    Lab,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Course => "course",
            SessionType::Seminar => "seminar",
            SessionType::Lab => "lab",
        }
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course" => Ok(SessionType::Course),
            "seminar" => Ok(SessionType::Seminar),
            "lab" => Ok(SessionType::Lab),
            other => Err(format!("unknown session type `{other}`")),
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

super::text_sql_enum!(SessionType);

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Normal,
    Moved,
    Canceled,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Normal => "normal",
            SessionStatus::Moved => "moved",
            SessionStatus::Canceled => "canceled",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(SessionStatus::Normal),
            "moved" => Ok(SessionStatus::Moved),
            "canceled" => Ok(SessionStatus::Canceled),
            other => Err(format!("unknown session status `{other}`")),
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

super::text_sql_enum!(SessionStatus);

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// A weekly timetable slot as stored, with foreign keys unresolved.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schedules)]
pub struct Schedule {
    pub id: i32,
    pub group_id: i32,
    pub subject_id: i32,
    pub professor_id: i32,
    pub room_id: i32,
    pub day: String,
    pub hour: String,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub version: i32,
    pub odd_week_subject_id: Option<i32>,
    pub odd_week_professor_id: Option<i32>,
    pub odd_week_room_id: Option<i32>,
    pub academic_year: Option<i32>,
    pub semester: Option<String>,
    pub cycle_type: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = schedules)]
pub struct NewSchedule<'a> {
    pub group_id: i32,
    pub subject_id: i32,
    pub professor_id: i32,
    pub room_id: i32,
    pub day: &'a str,
    pub hour: &'a str,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub notes: Option<&'a str>,
    pub odd_week_subject_id: Option<i32>,
    pub odd_week_professor_id: Option<i32>,
    pub odd_week_room_id: Option<i32>,
    pub academic_year: Option<i32>,
    pub semester: Option<&'a str>,
    pub cycle_type: Option<&'a str>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = schedules)]
pub struct UpdateSchedule {
    pub group_id: Option<i32>,
    pub subject_id: Option<i32>,
    pub professor_id: Option<i32>,
    pub room_id: Option<i32>,
    pub day: Option<String>,
    pub hour: Option<String>,
    pub session_type: Option<SessionType>,
    pub status: Option<SessionStatus>,
    pub notes: Option<String>,
    pub odd_week_subject_id: Option<i32>,
    pub odd_week_professor_id: Option<i32>,
    pub odd_week_room_id: Option<i32>,
    pub academic_year: Option<i32>,
    pub semester: Option<String>,
    pub cycle_type: Option<String>,
}

impl UpdateSchedule {
    pub fn is_empty(&self) -> bool {
        self.group_id.is_none()
            && self.subject_id.is_none()
            && self.professor_id.is_none()
            && self.room_id.is_none()
            && self.day.is_none()
            && self.hour.is_none()
            && self.session_type.is_none()
            && self.status.is_none()
            && self.notes.is_none()
            && self.odd_week_subject_id.is_none()
            && self.odd_week_professor_id.is_none()
            && self.odd_week_room_id.is_none()
            && self.academic_year.is_none()
            && self.semester.is_none()
            && self.cycle_type.is_none()
    }
}

// ---------------------------------------------------------------------------
// Resolved view
// ---------------------------------------------------------------------------

/// A timetable slot with every reference resolved. This is the shape sent to
/// HTTP clients and embedded in live `schedule_update` events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ScheduleResponse {
    pub id: i32,
    pub day: String,
    pub hour: String,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub notes: Option<String>,
    /// Starts at 1 and grows by one on every successful update.
    pub version: i32,
    pub group: Group,
    pub subject: Subject,
    pub professor: Professor,
    pub room: Room,
    pub odd_week_subject: Option<Subject>,
    pub odd_week_professor: Option<Professor>,
    pub odd_week_room: Option<Room>,
    pub academic_year: Option<i32>,
    pub semester: Option<String>,
    pub cycle_type: Option<String>,
}

/// Reference rows keyed by id, loaded in bulk for a batch of schedules.
#[derive(Debug, Default)]
pub struct ReferenceLookup {
    pub groups: HashMap<i32, Group>,
    pub subjects: HashMap<i32, Subject>,
    pub professors: HashMap<i32, Professor>,
    pub rooms: HashMap<i32, Room>,
}

impl Schedule {
    /// Attach the referenced rows. Returns `None` when a required reference
    /// is missing; an unresolvable odd-week reference is dropped to `None`.
    pub fn resolve(self, lookup: &ReferenceLookup) -> Option<ScheduleResponse> {
        let group = lookup.groups.get(&self.group_id)?.clone();
        let subject = lookup.subjects.get(&self.subject_id)?.clone();
        let professor = lookup.professors.get(&self.professor_id)?.clone();
        let room = lookup.rooms.get(&self.room_id)?.clone();

        Some(ScheduleResponse {
            id: self.id,
            day: self.day,
            hour: self.hour,
            session_type: self.session_type,
            status: self.status,
            notes: self.notes,
            version: self.version,
            group,
            subject,
            professor,
            room,
            odd_week_subject: self
                .odd_week_subject_id
                .and_then(|id| lookup.subjects.get(&id).cloned()),
            odd_week_professor: self
                .odd_week_professor_id
                .and_then(|id| lookup.professors.get(&id).cloned()),
            odd_week_room: self
                .odd_week_room_id
                .and_then(|id| lookup.rooms.get(&id).cloned()),
            academic_year: self.academic_year,
            semester: self.semester,
            cycle_type: self.cycle_type,
        })
    }
}

/// Load every row referenced by `rows` and resolve them. Rows with a dangling
/// required reference are skipped and logged.
pub async fn resolve_all(
    conn: &mut AsyncPgConnection,
    rows: Vec<Schedule>,
) -> QueryResult<Vec<ScheduleResponse>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let group_ids: Vec<i32> = rows.iter().map(|s| s.group_id).collect();
    let subject_ids: Vec<i32> = rows
        .iter()
        .flat_map(|s| std::iter::once(s.subject_id).chain(s.odd_week_subject_id))
        .collect();
    let professor_ids: Vec<i32> = rows
        .iter()
        .flat_map(|s| std::iter::once(s.professor_id).chain(s.odd_week_professor_id))
        .collect();
    let room_ids: Vec<i32> = rows
        .iter()
        .flat_map(|s| std::iter::once(s.room_id).chain(s.odd_week_room_id))
        .collect();

    let groups: Vec<Group> = groups::table
        .filter(groups::id.eq_any(&group_ids))
        .select(Group::as_select())
        .load(conn)
        .await?;
    let subjects: Vec<Subject> = subjects::table
        .filter(subjects::id.eq_any(&subject_ids))
        .select(Subject::as_select())
        .load(conn)
        .await?;
    let professors: Vec<Professor> = professors::table
        .filter(professors::id.eq_any(&professor_ids))
        .select(Professor::as_select())
        .load(conn)
        .await?;
    let rooms: Vec<Room> = rooms::table
        .filter(rooms::id.eq_any(&room_ids))
        .select(Room::as_select())
        .load(conn)
        .await?;

    let lookup = ReferenceLookup {
        groups: groups.into_iter().map(|g| (g.id, g)).collect(),
        subjects: subjects.into_iter().map(|s| (s.id, s)).collect(),
        professors: professors.into_iter().map(|p| (p.id, p)).collect(),
        rooms: rooms.into_iter().map(|r| (r.id, r)).collect(),
    };

    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let id = row.id;
            let resolved = row.resolve(&lookup);
            if resolved.is_none() {
                tracing::warn!(schedule_id = id, "skipping schedule with dangling reference");
            }
            resolved
        })
        .collect())
}

/// Load and resolve a single schedule by id.
pub async fn find_resolved(
    conn: &mut AsyncPgConnection,
    id: i32,
) -> QueryResult<Option<ScheduleResponse>> {
    let row: Option<Schedule> = schedules::table
        .find(id)
        .select(Schedule::as_select())
        .first(conn)
        .await
        .optional()?;

    match row {
        Some(row) => Ok(resolve_all(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}
