use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Household group persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupEntity {
    /// Primary key of the group.
    pub id: Uuid,
    /// Identity reference of the group owner.
    pub owner_id: String,
    /// Human readable group name.
    pub name: String,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Identity references of users allowed to view the group.
    #[serde(default)]
    pub member_uids: Vec<String>,
    /// Six-character code resolved through the invites indirection.
    #[serde(default)]
    pub invite_code: Option<String>,
}

/// Roster entry scoped to a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberEntity {
    /// Time-derived identifier, unique within the group.
    pub id: String,
    pub name: String,
    pub created_at: SystemTime,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_exempt: bool,
}

/// Payment record stored under its composite `{member_id}_{year}-{month}` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentEntity {
    /// RFC 3339 timestamp of the payment.
    pub date: String,
    /// Member name captured when the payment was recorded.
    pub name: String,
}

/// Lifecycle of a join request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Join request scoped to a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestEntity {
    pub id: String,
    pub name: String,
    pub created_at: SystemTime,
    pub status: RequestStatus,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Lifecycle of a recocho room.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Active,
    Finished,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Active => "active",
            RoomStatus::Finished => "finished",
        }
    }
}

/// Side of the pitch a player is listed on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
pub enum TeamSide {
    A,
    B,
}

/// Whether a player was confirmed by an admin or only proposed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Confirmed,
    Suggested,
}

/// Player listed in a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    pub id: Uuid,
    pub name: String,
    pub is_guest: bool,
    pub team: TeamSide,
    pub added_at: SystemTime,
    #[serde(default)]
    pub phone_number: Option<String>,
    pub status: PlayerStatus,
    #[serde(default)]
    pub level: Option<u8>,
}

/// Recocho room persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomEntity {
    pub id: Uuid,
    /// Public join code.
    pub code: String,
    /// Code granting admin authority to whoever presents it.
    pub admin_code: String,
    /// Operator-chosen numeric pin, stored in clear.
    #[serde(default)]
    pub recovery_pin: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub created_at: SystemTime,
    pub team_size: u8,
    pub pitch_price: f64,
    pub players: Vec<PlayerEntity>,
    /// Creator uid, or the guest tag supplied at creation.
    pub created_by: String,
    pub status: RoomStatus,
}
