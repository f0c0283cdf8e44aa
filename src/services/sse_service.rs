use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::{
    dto::sse::ServerEvent,
    error::ServiceError,
    identity::Caller,
    services::{group_service, ledger_service, room_service, sse_events},
    state::SharedState,
};

/// Identifies the target SSE stream for logging once the connection is torn down.
#[derive(Clone, Copy, Debug)]
pub enum StreamKind {
    Group(Uuid),
    Rooms,
}

/// Subscribe to one group's ledger stream.
///
/// The receiver is registered before the initial snapshot is read so no mutation that
/// lands in between is lost.
pub async fn subscribe_group(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
) -> Result<(broadcast::Receiver<ServerEvent>, Vec<ServerEvent>), ServiceError> {
    group_service::ensure_viewer(state, caller, group_id).await?;
    let receiver = state.group_sse(group_id).subscribe();
    let snapshot = ledger_service::load_snapshot(state, group_id, None).await?;
    let initial = sse_events::ledger_snapshot_event(snapshot)
        .into_iter()
        .collect();
    Ok((receiver, initial))
}

/// Subscribe to the public rooms stream, starting with the current active list.
pub async fn subscribe_rooms(
    state: &SharedState,
) -> Result<(broadcast::Receiver<ServerEvent>, Vec<ServerEvent>), ServiceError> {
    let receiver = state.rooms_sse().subscribe();
    let rooms = room_service::load_active_rooms(state).await?;
    let initial = sse_events::active_rooms_event(&rooms).into_iter().collect();
    Ok((receiver, initial))
}

fn to_event(payload: ServerEvent) -> Event {
    let mut event = Event::default().data(payload.data);
    if let Some(name) = payload.event {
        event = event.event(name);
    }
    event
}

/// Convert a broadcast receiver into an SSE response, replaying `initial` first.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    initial: Vec<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(?kind, skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        match kind {
            StreamKind::Group(group_id) => {
                tracing::info!(%group_id, "group SSE stream disconnected")
            }
            StreamKind::Rooms => tracing::info!("rooms SSE stream disconnected"),
        }
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::memory::MemoryStore,
        dto::group::CreateGroupRequest,
        identity::Identity,
        services::sse_events::EVENT_LEDGER_SNAPSHOT,
        state::AppState,
    };

    fn caller(uid: &str) -> Caller {
        Caller::authenticated(Identity {
            uid: uid.into(),
            email: format!("{uid}@example.com"),
            display_name: None,
        })
    }

    #[tokio::test]
    async fn group_stream_starts_with_a_snapshot_for_viewers_only() {
        let state = AppState::new(AppConfig::default());
        state.set_store(Arc::new(MemoryStore::new())).await;
        let owner = caller("owner");
        let group = group_service::create_group(
            &state,
            &owner,
            CreateGroupRequest { name: "Casa".into() },
        )
        .await
        .unwrap();

        let (_receiver, initial) = subscribe_group(&state, &owner, group.id).await.unwrap();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].event.as_deref(), Some(EVENT_LEDGER_SNAPSHOT));
        assert!(initial[0].data.contains(&group.id.to_string()));

        assert!(matches!(
            subscribe_group(&state, &caller("stranger"), group.id).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            subscribe_group(&state, &Caller::guest(), group.id).await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn rooms_stream_needs_storage() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            subscribe_rooms(&state).await,
            Err(ServiceError::Degraded)
        ));

        state.set_store(Arc::new(MemoryStore::new())).await;
        let (_receiver, initial) = subscribe_rooms(&state).await.unwrap();
        assert_eq!(initial[0].event.as_deref(), Some("rooms.active"));
    }
}
