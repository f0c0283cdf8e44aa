use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::sse::ServerEvent;

/// SSE-specific sub-state carved out from [`AppState`](super::AppState).
pub struct SseState {
    groups: DashMap<Uuid, SseHub>,
    rooms: SseHub,
    group_capacity: usize,
}

impl SseState {
    /// Build the SSE sub-tree with per-stream channel capacities.
    pub fn new(group_capacity: usize, rooms_capacity: usize) -> Self {
        Self {
            groups: DashMap::new(),
            rooms: SseHub::new(rooms_capacity),
            group_capacity,
        }
    }

    /// Hub for one group's ledger stream, created on first use.
    pub fn group(&self, group_id: Uuid) -> SseHub {
        self.groups
            .entry(group_id)
            .or_insert_with(|| SseHub::new(self.group_capacity))
            .clone()
    }

    /// Hub carrying room updates.
    pub fn rooms(&self) -> &SseHub {
        &self.rooms
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
#[derive(Clone)]
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn group_hubs_are_shared_per_group() {
        let sse = SseState::new(4, 4);
        let group = Uuid::new_v4();
        let mut receiver = sse.group(group).subscribe();
        let mut other = sse.group(Uuid::new_v4()).subscribe();

        sse.group(group).broadcast(ServerEvent {
            event: Some("ping".into()),
            data: "{}".into(),
        });

        assert_eq!(receiver.recv().await.unwrap().event.as_deref(), Some("ping"));
        assert!(other.try_recv().is_err());
    }
}
