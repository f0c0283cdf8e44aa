use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::room::{
        AddPlayerRequest, CreateRoomRequest, JoinRoomRequest, PriceSplitView, RoomView,
        UpdatePlayerStatusRequest, UpdatePriceRequest,
    },
    error::AppError,
    identity::Caller,
    services::room_service,
    state::SharedState,
};

/// Recocho room endpoints.
///
/// Admin proofs travel as `x-admin-code`, `x-recovery-pin` and `x-owned-rooms` headers.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/rooms", get(list_rooms).post(create_room))
        .route("/rooms/mine", get(my_rooms))
        .route("/rooms/join", post(join_room))
        .route("/rooms/{id}", get(get_room).delete(finish_room))
        .route("/rooms/{id}/split", get(price_split))
        .route("/rooms/{id}/players", post(add_player))
        .route("/rooms/{id}/players/{player_id}", delete(remove_player))
        .route(
            "/rooms/{id}/players/{player_id}/status",
            put(update_player_status),
        )
        .route("/rooms/{id}/price", put(update_price))
}

/// Active rooms, newest first.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    responses((status = 200, description = "Active rooms", body = [RoomView]))
)]
pub async fn list_rooms(
    State(state): State<SharedState>,
    caller: Caller,
) -> Result<Json<Vec<RoomView>>, AppError> {
    Ok(Json(room_service::list_active_games(&state, &caller).await?))
}

/// Open a new room. The response carries the admin code.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 201, description = "Room created", body = RoomView),
        (status = 409, description = "Active room limit reached")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    caller: Caller,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<(StatusCode, Json<RoomView>), AppError> {
    let room = room_service::create_game(&state, &caller, payload).await?;
    Ok((StatusCode::CREATED, Json(room)))
}

/// Rooms created by the caller or recorded by this device.
#[utoipa::path(
    get,
    path = "/rooms/mine",
    tag = "rooms",
    params(("x-owned-rooms" = Option<String>, Header, description = "Comma-separated room ids")),
    responses((status = 200, description = "Caller's rooms", body = [RoomView]))
)]
pub async fn my_rooms(
    State(state): State<SharedState>,
    caller: Caller,
) -> Result<Json<Vec<RoomView>>, AppError> {
    Ok(Json(room_service::my_games(&state, &caller).await?))
}

/// Open a room by public or admin code.
#[utoipa::path(
    post,
    path = "/rooms/join",
    tag = "rooms",
    request_body = JoinRoomRequest,
    responses(
        (status = 200, description = "Room", body = RoomView),
        (status = 404, description = "No active room with that code")
    )
)]
pub async fn join_room(
    State(state): State<SharedState>,
    caller: Caller,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(room_service::join_game(&state, &caller, payload).await?))
}

#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses((status = 200, description = "Room", body = RoomView))
)]
pub async fn get_room(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(room_service::get_game(&state, &caller, id).await?))
}

/// Finish a room, freeing its slot and codes.
#[utoipa::path(
    delete,
    path = "/rooms/{id}",
    tag = "rooms",
    params(
        ("id" = Uuid, Path, description = "Room identifier"),
        ("x-admin-code" = Option<String>, Header, description = "Room admin code"),
        ("x-recovery-pin" = Option<String>, Header, description = "Room recovery pin")
    ),
    responses((status = 200, description = "Room finished", body = RoomView))
)]
pub async fn finish_room(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(room_service::delete_game(&state, &caller, id).await?))
}

#[utoipa::path(
    get,
    path = "/rooms/{id}/split",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    responses((status = 200, description = "Pitch price split", body = PriceSplitView))
)]
pub async fn price_split(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PriceSplitView>, AppError> {
    Ok(Json(room_service::price_split(&state, id).await?))
}

/// Add a confirmed player (admin) or suggest one (anyone, phone required).
#[utoipa::path(
    post,
    path = "/rooms/{id}/players",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = AddPlayerRequest,
    responses((status = 200, description = "Room with the new player", body = RoomView))
)]
pub async fn add_player(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<AddPlayerRequest>>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(
        room_service::add_player(&state, &caller, id, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/rooms/{id}/players/{player_id}",
    tag = "rooms",
    params(
        ("id" = Uuid, Path, description = "Room identifier"),
        ("player_id" = Uuid, Path, description = "Player identifier")
    ),
    responses((status = 200, description = "Room without the player", body = RoomView))
)]
pub async fn remove_player(
    State(state): State<SharedState>,
    caller: Caller,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(
        room_service::remove_player(&state, &caller, id, player_id).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/rooms/{id}/players/{player_id}/status",
    tag = "rooms",
    params(
        ("id" = Uuid, Path, description = "Room identifier"),
        ("player_id" = Uuid, Path, description = "Player identifier")
    ),
    request_body = UpdatePlayerStatusRequest,
    responses((status = 200, description = "Room with the updated player", body = RoomView))
)]
pub async fn update_player_status(
    State(state): State<SharedState>,
    caller: Caller,
    Path((id, player_id)): Path<(Uuid, Uuid)>,
    Valid(Json(payload)): Valid<Json<UpdatePlayerStatusRequest>>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(
        room_service::update_player_status(&state, &caller, id, player_id, payload).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/rooms/{id}/price",
    tag = "rooms",
    params(("id" = Uuid, Path, description = "Room identifier")),
    request_body = UpdatePriceRequest,
    responses((status = 200, description = "Room with the new price", body = RoomView))
)]
pub async fn update_price(
    State(state): State<SharedState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdatePriceRequest>>,
) -> Result<Json<RoomView>, AppError> {
    Ok(Json(
        room_service::update_pitch_price(&state, &caller, id, payload).await?,
    ))
}
