use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::AppError,
    identity::Caller,
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/groups/{id}",
    tag = "sse",
    params(
        ("id" = Uuid, Path, description = "Group identifier"),
        ("access_token" = Option<String>, Query, description = "Bearer token for clients that cannot set headers")
    ),
    responses((status = 200, description = "Ledger snapshots of one group", content_type = "text/event-stream", body = String))
)]
/// Stream `ledger.snapshot` events of one group, starting with the current snapshot.
pub async fn group_stream(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (receiver, initial) = sse_service::subscribe_group(&state, &caller, id).await?;
    info!(group_id = %id, "new group SSE connection");
    Ok(sse_service::to_sse_stream(
        receiver,
        initial,
        StreamKind::Group(id),
    ))
}

#[utoipa::path(
    get,
    path = "/sse/rooms",
    tag = "sse",
    responses((status = 200, description = "Active rooms and room updates", content_type = "text/event-stream", body = String))
)]
/// Stream `rooms.active` and `room.updated` events.
pub async fn rooms_stream(
    State(state): State<SharedState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (receiver, initial) = sse_service::subscribe_rooms(&state).await?;
    info!("new rooms SSE connection");
    Ok(sse_service::to_sse_stream(receiver, initial, StreamKind::Rooms))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/groups/{id}", get(group_stream))
        .route("/sse/rooms", get(rooms_stream))
}
