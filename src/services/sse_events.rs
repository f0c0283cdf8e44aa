use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        ledger::LedgerSnapshotView,
        room::RoomView,
        sse::{ActiveRoomsEvent, RoomUpdatedEvent, ServerEvent},
    },
    state::{SharedState, SseHub, ledger::LedgerSnapshot, room::Room},
};

pub(crate) const EVENT_LEDGER_SNAPSHOT: &str = "ledger.snapshot";
const EVENT_ROOMS_ACTIVE: &str = "rooms.active";
const EVENT_ROOM_UPDATED: &str = "room.updated";

/// Serialise a ledger snapshot into the event pushed on a group stream.
pub fn ledger_snapshot_event(snapshot: LedgerSnapshot) -> Option<ServerEvent> {
    let view = LedgerSnapshotView::from(snapshot);
    encode(EVENT_LEDGER_SNAPSHOT, &view)
}

/// Broadcast the recomputed ledger of one group to its subscribers.
pub fn broadcast_ledger_snapshot(state: &SharedState, group_id: Uuid, snapshot: LedgerSnapshot) {
    if let Some(event) = ledger_snapshot_event(snapshot) {
        state.group_sse(group_id).broadcast(event);
    }
}

/// Serialise the public list of active rooms.
pub fn active_rooms_event(rooms: &[Room]) -> Option<ServerEvent> {
    let payload = ActiveRoomsEvent {
        rooms: rooms.iter().map(RoomView::public).collect(),
    };
    encode(EVENT_ROOMS_ACTIVE, &payload)
}

/// Broadcast the public list of active rooms.
pub fn broadcast_active_rooms(state: &SharedState, rooms: &[Room]) {
    send(state.rooms_sse(), active_rooms_event(rooms));
}

/// Broadcast the public view of a single room.
pub fn broadcast_room_updated(state: &SharedState, room: &Room) {
    let payload = RoomUpdatedEvent {
        room: RoomView::public(room),
    };
    send(state.rooms_sse(), encode(EVENT_ROOM_UPDATED, &payload));
}

fn send(hub: &SseHub, event: Option<ServerEvent>) {
    if let Some(event) = event {
        hub.broadcast(event);
    }
}

fn encode(event: &str, payload: &impl Serialize) -> Option<ServerEvent> {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event, error = %err, "failed to serialize SSE payload");
            None
        }
    }
}
