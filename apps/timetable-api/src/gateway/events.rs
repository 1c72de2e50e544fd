//! Live-update wire messages and the mapping from timetable writes to events.

use serde::Serialize;

use crate::models::schedule::ScheduleResponse;

/// Text frame a client sends to keep the connection alive.
pub const PING: &str = "ping";

const WELCOME_MESSAGE: &str = "Connected to live timetable updates";

// ---------------------------------------------------------------------------
// Server → Client message
// ---------------------------------------------------------------------------

/// A message pushed from the server to a subscriber.
///
/// Serialized with a `type` discriminator:
/// `{"type":"connected",...}`, `{"type":"pong"}`,
/// `{"type":"schedule_update","action":...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        message: String,
        connection_count: usize,
    },
    Pong,
    ScheduleUpdate(ScheduleChange),
}

impl ServerMessage {
    /// Welcome message sent once, right after a subscriber is registered.
    pub fn connected(connection_count: usize) -> Self {
        ServerMessage::Connected {
            message: WELCOME_MESSAGE.to_string(),
            connection_count,
        }
    }
}

/// One timetable mutation, or a full resync.
///
/// The `action` tag decides which payload field exists: `schedule` for
/// create/update/delete, `all_schedules` for refresh_all. Never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScheduleChange {
    Create { schedule: ScheduleResponse },
    Update { schedule: ScheduleResponse },
    Delete { schedule: ScheduleResponse },
    RefreshAll { all_schedules: Vec<ScheduleResponse> },
}

// ---------------------------------------------------------------------------
// Mutation → event
// ---------------------------------------------------------------------------

/// Outcome of a successful write, as handed over by the persistence layer.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// The entry as stored after insert.
    Created(ScheduleResponse),
    /// The entry as stored after update (version already bumped).
    Updated(ScheduleResponse),
    /// Snapshot taken *before* the row was deleted, while its references
    /// could still be resolved.
    Deleted(ScheduleResponse),
    /// The entire current timetable.
    Resynced(Vec<ScheduleResponse>),
}

/// Build the `schedule_update` event for a write.
pub fn to_event(mutation: Mutation) -> ServerMessage {
    let change = match mutation {
        Mutation::Created(schedule) => ScheduleChange::Create { schedule },
        Mutation::Updated(schedule) => ScheduleChange::Update { schedule },
        Mutation::Deleted(schedule) => ScheduleChange::Delete { schedule },
        Mutation::Resynced(all_schedules) => ScheduleChange::RefreshAll { all_schedules },
    };
    ServerMessage::ScheduleUpdate(change)
}
