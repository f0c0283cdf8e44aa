//! DTOs of the recocho room routes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::{PlayerStatus, RoomStatus, TeamSide},
    dto::{
        format_system_time,
        validation::{validate_code, validate_phone},
    },
    state::{
        pricing::{PriceSplit, split},
        room::{AuthorityGrant, Player, Room},
    },
};

/// Payload used to open a new room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateRoomRequest {
    /// Players per side, 5 to 11.
    #[validate(range(min = 5, max = 11))]
    pub team_size: u8,
    #[validate(range(min = 0.0))]
    pub pitch_price: f64,
    /// Tag recorded as creator for anonymous callers.
    #[serde(default)]
    #[validate(length(min = 1, max = 60))]
    pub creator_name: Option<String>,
    /// Optional 4 to 8 digit pin that restores admin authority.
    #[serde(default)]
    pub recovery_pin: Option<String>,
    #[serde(default)]
    #[validate(length(max = 120))]
    pub location: Option<String>,
}

/// Payload used to open a room by code.
#[derive(Debug, Deserialize, ToSchema)]
pub struct JoinRoomRequest {
    /// Public or admin code, case-insensitive.
    pub code: String,
}

impl Validate for JoinRoomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_code(&self.code) {
            errors.add("code", e);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Payload used to add or suggest a player.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AddPlayerRequest {
    pub name: String,
    pub team: TeamSide,
    /// Required when the caller is not a room admin.
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub level: Option<u8>,
}

impl Validate for AddPlayerRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name_len = self.name.trim().chars().count();
        if name_len == 0 || name_len > 60 {
            let mut err = validator::ValidationError::new("length");
            err.message = Some("Name must be 1 to 60 characters".into());
            errors.add("name", err);
        }

        if let Some(ref phone) = self.phone_number {
            if let Err(e) = validate_phone(phone) {
                errors.add("phone_number", e);
            }
        }

        if let Some(level) = self.level {
            if !(1..=10).contains(&level) {
                let mut err = validator::ValidationError::new("range");
                err.message = Some("Level must be between 1 and 10".into());
                errors.add("level", err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Confirm (or demote) a listed player, optionally overriding the level.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdatePlayerStatusRequest {
    pub status: PlayerStatus,
    #[serde(default)]
    #[validate(range(min = 1, max = 10))]
    pub level: Option<u8>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UpdatePriceRequest {
    #[validate(range(min = 0.0))]
    pub pitch_price: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerView {
    pub id: Uuid,
    pub name: String,
    pub is_guest: bool,
    pub team: TeamSide,
    pub added_at: String,
    pub status: PlayerStatus,
    pub level: Option<u8>,
    /// Contact number of suggested players, visible to admins only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

impl PlayerView {
    fn new(player: &Player, reveal_contact: bool) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            is_guest: player.is_guest,
            team: player.team,
            added_at: format_system_time(player.added_at),
            status: player.status,
            level: player.level,
            phone_number: player.phone_number.clone().filter(|_| reveal_contact),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct PriceSplitView {
    pub per_team: f64,
    pub per_player_a: f64,
    pub per_player_b: f64,
    pub team_a: usize,
    pub team_b: usize,
}

impl PriceSplitView {
    pub fn for_room(room: &Room) -> Self {
        let team_a = room.side_len(TeamSide::A);
        let team_b = room.side_len(TeamSide::B);
        let PriceSplit {
            per_team,
            per_player_a,
            per_player_b,
        } = split(room.pitch_price, team_a, team_b);
        Self {
            per_team,
            per_player_a,
            per_player_b,
            team_a,
            team_b,
        }
    }
}

/// Room as seen by one caller. Secrets are present only for admins.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomView {
    pub id: Uuid,
    pub code: String,
    pub status: RoomStatus,
    pub created_at: String,
    pub created_by: String,
    pub team_size: u8,
    pub pitch_price: f64,
    pub location: Option<String>,
    pub players: Vec<PlayerView>,
    pub split: PriceSplitView,
    pub is_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_pin: Option<String>,
}

impl RoomView {
    pub fn new(room: &Room, authority: Option<AuthorityGrant>) -> Self {
        let is_admin = authority.is_some();
        Self {
            id: room.id,
            code: room.code.clone(),
            status: room.status,
            created_at: format_system_time(room.created_at),
            created_by: room.creator_label().to_owned(),
            team_size: room.team_size,
            pitch_price: room.pitch_price,
            location: room.location.clone(),
            players: room
                .players
                .iter()
                .map(|player| PlayerView::new(player, is_admin))
                .collect(),
            split: PriceSplitView::for_room(room),
            is_admin,
            admin_code: is_admin.then(|| room.admin_code.clone()),
            recovery_pin: room.recovery_pin.clone().filter(|_| is_admin),
        }
    }

    /// View without any admin material, as broadcast on the rooms stream.
    pub fn public(room: &Room) -> Self {
        Self::new(room, None)
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn room() -> Room {
        Room {
            id: Uuid::new_v4(),
            code: "PUB123".into(),
            admin_code: "ADM456".into(),
            recovery_pin: Some("2468".into()),
            location: Some("Cancha 3".into()),
            created_at: SystemTime::UNIX_EPOCH,
            team_size: 5,
            pitch_price: 90_000.0,
            players: vec![Player {
                id: Uuid::new_v4(),
                name: "Luis".into(),
                is_guest: true,
                team: TeamSide::A,
                added_at: SystemTime::UNIX_EPOCH,
                phone_number: Some("3001234567".into()),
                status: PlayerStatus::Suggested,
                level: None,
            }],
            created_by: "Guest".into(),
            status: RoomStatus::Active,
        }
    }

    #[test]
    fn public_view_hides_secrets() {
        let view = RoomView::public(&room());
        assert!(!view.is_admin);
        assert_eq!(view.admin_code, None);
        assert_eq!(view.recovery_pin, None);
        assert_eq!(view.players[0].phone_number, None);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("admin_code").is_none());
        assert!(json.get("recovery_pin").is_none());
    }

    #[test]
    fn admin_view_reveals_secrets() {
        let view = RoomView::new(&room(), Some(AuthorityGrant::AdminCode));
        assert!(view.is_admin);
        assert_eq!(view.admin_code.as_deref(), Some("ADM456"));
        assert_eq!(view.recovery_pin.as_deref(), Some("2468"));
        assert_eq!(view.players[0].phone_number.as_deref(), Some("3001234567"));
    }

    #[test]
    fn split_counts_listed_players() {
        let view = RoomView::public(&room());
        assert_eq!(view.split.team_a, 1);
        assert_eq!(view.split.per_player_a, 45_000.0);
        assert_eq!(view.split.per_player_b, 0.0);
    }

    #[test]
    fn add_player_validation() {
        let ok = AddPlayerRequest {
            name: "Ana".into(),
            team: TeamSide::B,
            phone_number: Some("+57 300 123 4567".into()),
            level: Some(7),
        };
        assert!(ok.validate().is_ok());

        let bad = AddPlayerRequest {
            name: " ".into(),
            team: TeamSide::A,
            phone_number: Some("12".into()),
            level: Some(11),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("phone_number"));
        assert!(fields.contains_key("level"));
    }
}
