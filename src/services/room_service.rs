//! Recocho rooms: admission under the active-room ceiling, code lookup, admin authority
//! and roster edits.

use std::{collections::HashSet, time::SystemTime};

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{PlayerStatus, RoomStatus},
        store::RoomAdmission,
    },
    dto::{
        room::{
            AddPlayerRequest, CreateRoomRequest, JoinRoomRequest, PriceSplitView, RoomView,
            UpdatePlayerStatusRequest, UpdatePriceRequest,
        },
        validation::validate_phone,
    },
    error::ServiceError,
    identity::Caller,
    services::sse_events,
    state::{
        SharedState,
        room::{
            AuthorityGrant, DEFAULT_LEVEL, GUEST_CREATOR, Player, Room, generate_code_pair,
            guest_creator, normalize_code, resolve_admin_authority, validate_level,
            validate_price, validate_recovery_pin, validate_team_size,
        },
        roster::sanitize_name,
    },
};

/// A room together with the authority the current caller holds over it.
#[derive(Debug, Clone)]
pub struct RoomAccess {
    pub room: Room,
    pub authority: Option<AuthorityGrant>,
}

impl RoomAccess {
    fn resolve(state: &SharedState, caller: &Caller, room: Room) -> Self {
        let authority = resolve_admin_authority(
            &room,
            caller.identity(),
            &caller.room_claim,
            &state.config().superuser_email,
        );
        Self { room, authority }
    }

    fn require_admin(&self) -> Result<(), ServiceError> {
        if self.authority.is_some() {
            Ok(())
        } else {
            Err(ServiceError::Unauthorized(
                "room admin authority required".into(),
            ))
        }
    }

    pub fn view(&self) -> RoomView {
        RoomView::new(&self.room, self.authority)
    }
}

async fn load_room(state: &SharedState, room_id: Uuid) -> Result<Room, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_room(room_id)
        .await?
        .map(Room::from)
        .ok_or_else(|| ServiceError::NotFound(format!("room `{room_id}` not found")))
}

async fn load_access(
    state: &SharedState,
    caller: &Caller,
    room_id: Uuid,
) -> Result<RoomAccess, ServiceError> {
    let room = load_room(state, room_id).await?;
    Ok(RoomAccess::resolve(state, caller, room))
}

async fn save_and_publish(state: &SharedState, room: &Room) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    store.save_room(room.clone().into()).await?;
    sse_events::broadcast_room_updated(state, room);
    Ok(())
}

/// Active rooms, newest first.
pub async fn load_active_rooms(state: &SharedState) -> Result<Vec<Room>, ServiceError> {
    let store = state.require_store().await?;
    let mut rooms: Vec<Room> = store
        .list_active_rooms()
        .await?
        .into_iter()
        .map(Room::from)
        .collect();
    rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(rooms)
}

async fn publish_active_rooms(state: &SharedState) {
    match load_active_rooms(state).await {
        Ok(rooms) => sse_events::broadcast_active_rooms(state, &rooms),
        Err(err) => warn!(error = %err, "failed to publish active rooms"),
    }
}

/// Open a room if the active-room ceiling allows it.
///
/// Codes are drawn against the current active set; if the store still reports a
/// collision (another room was admitted meanwhile) the draw is repeated.
pub async fn create_game(
    state: &SharedState,
    caller: &Caller,
    payload: CreateRoomRequest,
) -> Result<RoomView, ServiceError> {
    validate_team_size(payload.team_size)?;
    validate_price(payload.pitch_price)?;
    let recovery_pin = match payload.recovery_pin.as_deref().map(str::trim) {
        Some(pin) if !pin.is_empty() => {
            validate_recovery_pin(pin)?;
            Some(pin.to_owned())
        }
        _ => None,
    };
    let location = payload
        .location
        .map(|location| location.trim().to_owned())
        .filter(|location| !location.is_empty());
    let created_by = match caller.identity() {
        Some(identity) => identity.uid.clone(),
        None => guest_creator(
            payload
                .creator_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .unwrap_or(GUEST_CREATOR),
        ),
    };

    let config = state.config();
    let store = state.require_store().await?;

    for attempt in 0..config.code_attempts {
        let active = store.list_active_rooms().await?;
        if active.len() >= config.max_active_rooms {
            return Err(capacity_reached(config.max_active_rooms));
        }
        let taken: HashSet<String> = active
            .into_iter()
            .flat_map(|room| [room.code, room.admin_code])
            .collect();
        let Some((code, admin_code)) =
            generate_code_pair(&mut rand::rng(), &taken, config.code_attempts)
        else {
            break;
        };

        let room = Room {
            id: Uuid::new_v4(),
            code,
            admin_code,
            recovery_pin: recovery_pin.clone(),
            location: location.clone(),
            created_at: SystemTime::now(),
            team_size: payload.team_size,
            pitch_price: payload.pitch_price,
            players: Vec::new(),
            created_by: created_by.clone(),
            status: RoomStatus::Active,
        };

        match store
            .insert_room(room.clone().into(), config.max_active_rooms)
            .await?
        {
            RoomAdmission::Admitted => {
                info!(room_id = %room.id, code = %room.code, "room created");
                publish_active_rooms(state).await;
                return Ok(RoomView::new(&room, Some(AuthorityGrant::Creator)));
            }
            RoomAdmission::CapacityReached => {
                return Err(capacity_reached(config.max_active_rooms));
            }
            RoomAdmission::CodeConflict => {
                warn!(attempt, "room code collision; drawing new codes");
            }
        }
    }

    Err(ServiceError::InvalidState(
        "could not allocate unique room codes, try again".into(),
    ))
}

fn capacity_reached(max_active: usize) -> ServiceError {
    ServiceError::Capacity(format!(
        "the limit of {max_active} active rooms has been reached"
    ))
}

/// Open an active room by its public code, or by its admin code (granting authority).
pub async fn join_game(
    state: &SharedState,
    caller: &Caller,
    payload: JoinRoomRequest,
) -> Result<RoomView, ServiceError> {
    let code = normalize_code(&payload.code);
    let store = state.require_store().await?;

    if let Some(room) = store.find_active_room_by_code(code.clone()).await? {
        return Ok(RoomAccess::resolve(state, caller, room.into()).view());
    }
    if let Some(room) = store.find_active_room_by_admin_code(code.clone()).await? {
        let room = Room::from(room);
        info!(room_id = %room.id, "room opened with admin code");
        return Ok(RoomView::new(&room, Some(AuthorityGrant::AdminCode)));
    }
    Err(ServiceError::NotFound(format!(
        "no active room with code `{code}`"
    )))
}

pub async fn get_game(
    state: &SharedState,
    caller: &Caller,
    room_id: Uuid,
) -> Result<RoomView, ServiceError> {
    Ok(load_access(state, caller, room_id).await?.view())
}

/// Active rooms as seen by the caller, newest first.
pub async fn list_active_games(
    state: &SharedState,
    caller: &Caller,
) -> Result<Vec<RoomView>, ServiceError> {
    Ok(load_active_rooms(state)
        .await?
        .into_iter()
        .map(|room| RoomAccess::resolve(state, caller, room).view())
        .collect())
}

/// Rooms the caller created (signed in) or recorded on this device (guest), any status.
pub async fn my_games(state: &SharedState, caller: &Caller) -> Result<Vec<RoomView>, ServiceError> {
    let limit = state.config().my_rooms_limit;
    let store = state.require_store().await?;

    let mut rooms: Vec<Room> = match caller.identity() {
        Some(identity) => store
            .list_rooms_created_by(identity.uid.clone(), limit)
            .await?
            .into_iter()
            .map(Room::from)
            .filter(|room| room.creator_uid() == Some(identity.uid.as_str()))
            .collect(),
        None => {
            let mut owned = Vec::new();
            for room_id in caller.room_claim.owned_rooms.iter().take(limit) {
                if let Some(room) = store.find_room(*room_id).await? {
                    owned.push(Room::from(room));
                }
            }
            owned
        }
    };
    rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(rooms
        .into_iter()
        .map(|room| RoomAccess::resolve(state, caller, room).view())
        .collect())
}

/// Finish a room. History is kept; the public and admin codes become reusable.
pub async fn delete_game(
    state: &SharedState,
    caller: &Caller,
    room_id: Uuid,
) -> Result<RoomView, ServiceError> {
    let _gate = state.lock(room_id).await;
    let mut access = load_access(state, caller, room_id).await?;
    access.require_admin()?;
    access.room.ensure_active()?;

    access.room.status = RoomStatus::Finished;
    save_and_publish(state, &access.room).await?;
    info!(%room_id, "room finished");
    publish_active_rooms(state).await;
    Ok(access.view())
}

/// Add a player. Admins confirm directly; anyone else suggests and leaves a phone number.
pub async fn add_player(
    state: &SharedState,
    caller: &Caller,
    room_id: Uuid,
    payload: AddPlayerRequest,
) -> Result<RoomView, ServiceError> {
    let name = sanitize_name(&payload.name)?;
    if let Some(level) = payload.level {
        validate_level(level)?;
    }
    let phone_number = payload
        .phone_number
        .map(|phone| phone.trim().to_owned())
        .filter(|phone| !phone.is_empty());
    if let Some(phone) = phone_number.as_deref() {
        validate_phone(phone)
            .map_err(|_| ServiceError::InvalidInput("invalid phone number".into()))?;
    }

    let _gate = state.lock(room_id).await;
    let mut access = load_access(state, caller, room_id).await?;
    access.room.ensure_active()?;
    let is_admin = access.authority.is_some();
    if !is_admin && phone_number.is_none() {
        return Err(ServiceError::InvalidInput(
            "a phone number is required to suggest a player".into(),
        ));
    }
    access.room.ensure_side_has_room(payload.team)?;

    let player = Player {
        id: Uuid::new_v4(),
        name,
        is_guest: caller.identity().is_none(),
        team: payload.team,
        added_at: SystemTime::now(),
        phone_number,
        status: if is_admin {
            PlayerStatus::Confirmed
        } else {
            PlayerStatus::Suggested
        },
        level: if is_admin {
            Some(payload.level.unwrap_or(DEFAULT_LEVEL))
        } else {
            payload.level
        },
    };
    info!(%room_id, player_id = %player.id, status = ?player.status, "player added");
    access.room.players.push(player);
    save_and_publish(state, &access.room).await?;
    Ok(access.view())
}

/// Drop a player, which is also how a suggestion is rejected.
pub async fn remove_player(
    state: &SharedState,
    caller: &Caller,
    room_id: Uuid,
    player_id: Uuid,
) -> Result<RoomView, ServiceError> {
    let _gate = state.lock(room_id).await;
    let mut access = load_access(state, caller, room_id).await?;
    access.require_admin()?;
    access.room.ensure_active()?;
    access.room.player_mut(player_id)?;

    access.room.players.retain(|player| player.id != player_id);
    save_and_publish(state, &access.room).await?;
    info!(%room_id, %player_id, "player removed");
    Ok(access.view())
}

/// Change a player's status, typically confirming a suggestion, with an optional level.
pub async fn update_player_status(
    state: &SharedState,
    caller: &Caller,
    room_id: Uuid,
    player_id: Uuid,
    payload: UpdatePlayerStatusRequest,
) -> Result<RoomView, ServiceError> {
    if let Some(level) = payload.level {
        validate_level(level)?;
    }

    let _gate = state.lock(room_id).await;
    let mut access = load_access(state, caller, room_id).await?;
    access.require_admin()?;
    access.room.ensure_active()?;

    let player = access.room.player_mut(player_id)?;
    player.status = payload.status;
    if let Some(level) = payload.level {
        player.level = Some(level);
    } else if payload.status == PlayerStatus::Confirmed && player.level.is_none() {
        player.level = Some(DEFAULT_LEVEL);
    }

    save_and_publish(state, &access.room).await?;
    info!(%room_id, %player_id, status = ?payload.status, "player status updated");
    Ok(access.view())
}

pub async fn update_pitch_price(
    state: &SharedState,
    caller: &Caller,
    room_id: Uuid,
    payload: UpdatePriceRequest,
) -> Result<RoomView, ServiceError> {
    validate_price(payload.pitch_price)?;

    let _gate = state.lock(room_id).await;
    let mut access = load_access(state, caller, room_id).await?;
    access.require_admin()?;
    access.room.ensure_active()?;

    access.room.pitch_price = payload.pitch_price;
    save_and_publish(state, &access.room).await?;
    info!(%room_id, pitch_price = payload.pitch_price, "pitch price updated");
    Ok(access.view())
}

/// Current cost per side and per player.
pub async fn price_split(state: &SharedState, room_id: Uuid) -> Result<PriceSplitView, ServiceError> {
    let room = load_room(state, room_id).await?;
    Ok(PriceSplitView::for_room(&room))
}
