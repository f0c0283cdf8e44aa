use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::dao::models::{
    GroupEntity, MemberEntity, PaymentEntity, PlayerEntity, PlayerStatus, RequestEntity,
    RequestStatus, RoomEntity, RoomStatus, TeamSide,
};

fn parse_id(collection: &'static str, id: String) -> Result<Uuid, MongoDaoError> {
    Uuid::parse_str(&id).map_err(|source| MongoDaoError::InvalidId {
        collection,
        id,
        source,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDocument {
    #[serde(rename = "_id")]
    id: String,
    owner_id: String,
    name: String,
    created_at: DateTime,
    #[serde(default)]
    member_uids: Vec<String>,
    #[serde(default)]
    invite_code: Option<String>,
}

impl From<GroupEntity> for GroupDocument {
    fn from(value: GroupEntity) -> Self {
        Self {
            id: value.id.to_string(),
            owner_id: value.owner_id,
            name: value.name,
            created_at: DateTime::from_system_time(value.created_at),
            member_uids: value.member_uids,
            invite_code: value.invite_code,
        }
    }
}

impl TryFrom<GroupDocument> for GroupEntity {
    type Error = MongoDaoError;

    fn try_from(value: GroupDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id("groups", value.id)?,
            owner_id: value.owner_id,
            name: value.name,
            created_at: value.created_at.to_system_time(),
            member_uids: value.member_uids,
            invite_code: value.invite_code,
        })
    }
}

/// `code -> group` pointer; the code is the primary key so claims are insert-if-absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteDocument {
    #[serde(rename = "_id")]
    pub code: String,
    pub group_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberDocument {
    group_id: String,
    member_id: String,
    name: String,
    created_at: DateTime,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    is_exempt: bool,
}

impl From<(Uuid, MemberEntity)> for MemberDocument {
    fn from((group_id, value): (Uuid, MemberEntity)) -> Self {
        Self {
            group_id: group_id.to_string(),
            member_id: value.id,
            name: value.name,
            created_at: DateTime::from_system_time(value.created_at),
            user_id: value.user_id,
            is_exempt: value.is_exempt,
        }
    }
}

impl From<MemberDocument> for MemberEntity {
    fn from(value: MemberDocument) -> Self {
        Self {
            id: value.member_id,
            name: value.name,
            created_at: value.created_at.to_system_time(),
            user_id: value.user_id,
            is_exempt: value.is_exempt,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDocument {
    group_id: String,
    pub key: String,
    date: String,
    #[serde(default)]
    name: String,
}

impl PaymentDocument {
    pub fn new(group_id: Uuid, key: String, payment: PaymentEntity) -> Self {
        Self {
            group_id: group_id.to_string(),
            key,
            date: payment.date,
            name: payment.name,
        }
    }
}

impl From<PaymentDocument> for (String, PaymentEntity) {
    fn from(value: PaymentDocument) -> Self {
        (
            value.key,
            PaymentEntity {
                date: value.date,
                name: value.name,
            },
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDocument {
    group_id: String,
    request_id: String,
    name: String,
    created_at: DateTime,
    status: RequestStatus,
    #[serde(default)]
    user_id: Option<String>,
}

impl From<(Uuid, RequestEntity)> for RequestDocument {
    fn from((group_id, value): (Uuid, RequestEntity)) -> Self {
        Self {
            group_id: group_id.to_string(),
            request_id: value.id,
            name: value.name,
            created_at: DateTime::from_system_time(value.created_at),
            status: value.status,
            user_id: value.user_id,
        }
    }
}

impl From<RequestDocument> for RequestEntity {
    fn from(value: RequestDocument) -> Self {
        Self {
            id: value.request_id,
            name: value.name,
            created_at: value.created_at.to_system_time(),
            status: value.status,
            user_id: value.user_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerDocument {
    id: String,
    name: String,
    is_guest: bool,
    team: TeamSide,
    added_at: DateTime,
    #[serde(default)]
    phone_number: Option<String>,
    status: PlayerStatus,
    #[serde(default)]
    level: Option<u8>,
}

impl From<PlayerEntity> for PlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id.to_string(),
            name: value.name,
            is_guest: value.is_guest,
            team: value.team,
            added_at: DateTime::from_system_time(value.added_at),
            phone_number: value.phone_number,
            status: value.status,
            level: value.level,
        }
    }
}

impl TryFrom<PlayerDocument> for PlayerEntity {
    type Error = MongoDaoError;

    fn try_from(value: PlayerDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id("recochos.players", value.id)?,
            name: value.name,
            is_guest: value.is_guest,
            team: value.team,
            added_at: value.added_at.to_system_time(),
            phone_number: value.phone_number,
            status: value.status,
            level: value.level,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDocument {
    #[serde(rename = "_id")]
    id: String,
    code: String,
    admin_code: String,
    #[serde(default)]
    recovery_pin: Option<String>,
    #[serde(default)]
    location: Option<String>,
    created_at: DateTime,
    team_size: u8,
    pitch_price: f64,
    #[serde(default)]
    players: Vec<PlayerDocument>,
    created_by: String,
    status: RoomStatus,
}

impl From<RoomEntity> for RoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id.to_string(),
            code: value.code,
            admin_code: value.admin_code,
            recovery_pin: value.recovery_pin,
            location: value.location,
            created_at: DateTime::from_system_time(value.created_at),
            team_size: value.team_size,
            pitch_price: value.pitch_price,
            players: value.players.into_iter().map(Into::into).collect(),
            created_by: value.created_by,
            status: value.status,
        }
    }
}

impl TryFrom<RoomDocument> for RoomEntity {
    type Error = MongoDaoError;

    fn try_from(value: RoomDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_id("recochos", value.id)?,
            code: value.code,
            admin_code: value.admin_code,
            recovery_pin: value.recovery_pin,
            location: value.location,
            created_at: value.created_at.to_system_time(),
            team_size: value.team_size,
            pitch_price: value.pitch_price,
            players: value
                .players
                .into_iter()
                .map(PlayerEntity::try_from)
                .collect::<Result<_, _>>()?,
            created_by: value.created_by,
            status: value.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn room_document_uses_string_ids_and_lowercase_status() {
        let entity = RoomEntity {
            id: Uuid::new_v4(),
            code: "ABC123".into(),
            admin_code: "XYZ789".into(),
            recovery_pin: Some("1234".into()),
            location: None,
            created_at: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            team_size: 7,
            pitch_price: 90_000.0,
            players: Vec::new(),
            created_by: "uid".into(),
            status: RoomStatus::Active,
        };

        let document = RoomDocument::from(entity.clone());
        let json = serde_json::to_value(&document).unwrap();
        assert_eq!(json["_id"], entity.id.to_string());
        assert_eq!(json["status"], "active");

        assert_eq!(RoomEntity::try_from(document).unwrap(), entity);
    }

    #[test]
    fn invalid_room_id_is_reported() {
        let document = RoomDocument {
            id: "not-a-uuid".into(),
            code: "ABC123".into(),
            admin_code: "XYZ789".into(),
            recovery_pin: None,
            location: None,
            created_at: DateTime::now(),
            team_size: 5,
            pitch_price: 0.0,
            players: Vec::new(),
            created_by: "Guest".into(),
            status: RoomStatus::Active,
        };
        assert!(matches!(
            RoomEntity::try_from(document),
            Err(MongoDaoError::InvalidId { .. })
        ));
    }
}
