use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::room::RoomView;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    pub event: Option<String>,
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast on the rooms stream after any room changes status or is created.
pub struct ActiveRoomsEvent {
    /// Public views of every active room, newest first.
    pub rooms: Vec<RoomView>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast on the rooms stream after a room's roster or price changed.
pub struct RoomUpdatedEvent {
    pub room: RoomView,
}
