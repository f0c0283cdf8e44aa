//! Recocho rooms: code generation, admin authority and team capacity rules.
//!
//! Authority is capability based. Whoever knows the admin code, the recovery pin, or can
//! present a device ownership claim is treated as the room admin; none of these are
//! cryptographic proofs.

use std::{collections::HashSet, time::SystemTime};

use rand::Rng;
use uuid::Uuid;

use crate::{
    dao::models::{PlayerEntity, PlayerStatus, RoomEntity, RoomStatus, TeamSide},
    error::ServiceError,
    identity::Identity,
};

/// Symbols used for public and admin room codes.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Length of every generated code.
pub const CODE_LENGTH: usize = 6;
/// Smallest and largest allowed players per side.
pub const TEAM_SIZE_RANGE: std::ops::RangeInclusive<u8> = 5..=11;
/// Allowed skill levels.
pub const LEVEL_RANGE: std::ops::RangeInclusive<u8> = 1..=10;
/// Level assumed when an admin adds a player without one.
pub const DEFAULT_LEVEL: u8 = 5;
/// Creator name shown for anonymous rooms without a creator name.
pub const GUEST_CREATOR: &str = "Guest";
/// Prefix separating typed guest names from identity uids in `created_by`.
const GUEST_TAG: &str = "guest:";

/// `created_by` value of a room opened by a guest under `name`.
pub fn guest_creator(name: &str) -> String {
    format!("{GUEST_TAG}{name}")
}

/// Generate one random code from [`CODE_ALPHABET`].
pub fn generate_code<R: Rng>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Generate a `(code, admin_code)` pair that differ from each other and from `taken`.
///
/// Returns `None` when every one of the `attempts` draws collided.
pub fn generate_code_pair<R: Rng>(
    rng: &mut R,
    taken: &HashSet<String>,
    attempts: usize,
) -> Option<(String, String)> {
    let code = (0..attempts)
        .map(|_| generate_code(&mut *rng))
        .find(|candidate| !taken.contains(candidate))?;
    let admin_code = (0..attempts)
        .map(|_| generate_code(&mut *rng))
        .find(|candidate| *candidate != code && !taken.contains(candidate))?;
    Some((code, admin_code))
}

/// Normalise a user-typed code for lookup.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Player listed on one side of a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub is_guest: bool,
    pub team: TeamSide,
    pub added_at: SystemTime,
    pub phone_number: Option<String>,
    pub status: PlayerStatus,
    pub level: Option<u8>,
}

/// Code-addressed pickup game with two sides and a shared pitch price.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: Uuid,
    pub code: String,
    pub admin_code: String,
    pub recovery_pin: Option<String>,
    pub location: Option<String>,
    pub created_at: SystemTime,
    pub team_size: u8,
    pub pitch_price: f64,
    pub players: Vec<Player>,
    pub created_by: String,
    pub status: RoomStatus,
}

/// Proofs a caller presents besides their identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomClaim {
    pub admin_code: Option<String>,
    pub recovery_pin: Option<String>,
    /// Rooms this device recorded as created or administered locally. Spoofable.
    pub owned_rooms: Vec<Uuid>,
}

/// Which proof granted admin authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityGrant {
    Creator,
    AdminCode,
    DeviceClaim,
    Superuser,
    RecoveryPin,
}

/// Decide whether the caller may mutate `room`.
pub fn resolve_admin_authority(
    room: &Room,
    identity: Option<&Identity>,
    claim: &RoomClaim,
    superuser_email: &str,
) -> Option<AuthorityGrant> {
    if identity.is_some_and(|who| room.creator_uid() == Some(who.uid.as_str())) {
        return Some(AuthorityGrant::Creator);
    }
    if claim
        .admin_code
        .as_deref()
        .is_some_and(|code| normalize_code(code) == room.admin_code)
    {
        return Some(AuthorityGrant::AdminCode);
    }
    if claim.owned_rooms.contains(&room.id) {
        return Some(AuthorityGrant::DeviceClaim);
    }
    if identity.is_some_and(|who| who.is_superuser(superuser_email)) {
        return Some(AuthorityGrant::Superuser);
    }
    match (&room.recovery_pin, &claim.recovery_pin) {
        (Some(stored), Some(given)) if stored == given.trim() => Some(AuthorityGrant::RecoveryPin),
        _ => None,
    }
}

/// Validate an operator-chosen recovery pin (4 to 8 digits).
pub fn validate_recovery_pin(pin: &str) -> Result<(), ServiceError> {
    if (4..=8).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(
            "recovery pin must be 4 to 8 digits".into(),
        ))
    }
}

pub fn validate_team_size(team_size: u8) -> Result<(), ServiceError> {
    if TEAM_SIZE_RANGE.contains(&team_size) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(format!(
            "team size must be between {} and {}",
            TEAM_SIZE_RANGE.start(),
            TEAM_SIZE_RANGE.end()
        )))
    }
}

pub fn validate_price(price: f64) -> Result<(), ServiceError> {
    if price.is_finite() && price >= 0.0 {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(
            "pitch price must be a non-negative number".into(),
        ))
    }
}

pub fn validate_level(level: u8) -> Result<(), ServiceError> {
    if LEVEL_RANGE.contains(&level) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput("level must be between 1 and 10".into()))
    }
}

impl Room {
    pub fn is_active(&self) -> bool {
        self.status == RoomStatus::Active
    }

    /// Uid of the signed-in creator; `None` for guest rooms.
    pub fn creator_uid(&self) -> Option<&str> {
        (!self.created_by.starts_with(GUEST_TAG)).then_some(self.created_by.as_str())
    }

    /// Creator as displayed: the uid, or the guest's typed name.
    pub fn creator_label(&self) -> &str {
        self.created_by
            .strip_prefix(GUEST_TAG)
            .unwrap_or(&self.created_by)
    }

    /// Players listed on `side`, confirmed and suggested alike.
    pub fn side(&self, side: TeamSide) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(move |p| p.team == side)
    }

    pub fn side_len(&self, side: TeamSide) -> usize {
        self.side(side).count()
    }

    /// Fail when `side` already lists `team_size` players.
    ///
    /// Suggested players hold a slot until an admin rejects them.
    pub fn ensure_side_has_room(&self, side: TeamSide) -> Result<(), ServiceError> {
        if self.side_len(side) >= usize::from(self.team_size) {
            return Err(ServiceError::InvalidState(format!(
                "team {side:?} is full ({} players)",
                self.team_size
            )));
        }
        Ok(())
    }

    pub fn ensure_active(&self) -> Result<(), ServiceError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ServiceError::InvalidState(format!(
                "room `{}` is finished",
                self.code
            )))
        }
    }

    pub fn player_mut(&mut self, player_id: Uuid) -> Result<&mut Player, ServiceError> {
        self.players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            is_guest: value.is_guest,
            team: value.team,
            added_at: value.added_at,
            phone_number: value.phone_number,
            status: value.status,
            level: value.level,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            is_guest: value.is_guest,
            team: value.team,
            added_at: value.added_at,
            phone_number: value.phone_number,
            status: value.status,
            level: value.level,
        }
    }
}

impl From<RoomEntity> for Room {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id,
            code: value.code,
            admin_code: value.admin_code,
            recovery_pin: value.recovery_pin,
            location: value.location,
            created_at: value.created_at,
            team_size: value.team_size,
            pitch_price: value.pitch_price,
            players: value.players.into_iter().map(Into::into).collect(),
            created_by: value.created_by,
            status: value.status,
        }
    }
}

impl From<Room> for RoomEntity {
    fn from(value: Room) -> Self {
        Self {
            id: value.id,
            code: value.code,
            admin_code: value.admin_code,
            recovery_pin: value.recovery_pin,
            location: value.location,
            created_at: value.created_at,
            team_size: value.team_size,
            pitch_price: value.pitch_price,
            players: value.players.into_iter().map(Into::into).collect(),
            created_by: value.created_by,
            status: value.status,
        }
    }
}
