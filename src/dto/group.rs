use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::{
    dto::{format_system_time, validation::validate_code},
    state::ledger::Group,
};

#[derive(Debug, Deserialize, ToSchema, Validate)]
/// Payload used to create a household group.
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
/// Payload used to join a group through its invite code.
pub struct JoinGroupRequest {
    /// Six-character invite code, case-insensitive.
    pub code: String,
}

impl Validate for JoinGroupRequest {
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

#[derive(Debug, Serialize, ToSchema)]
/// Group as listed to a caller with access.
pub struct GroupSummary {
    pub id: Uuid,
    pub name: String,
    pub owner_id: String,
    pub created_at: String,
    pub member_count: usize,
    /// Whether the caller may mutate the ledger.
    pub is_admin: bool,
    /// Only revealed to group admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_code: Option<String>,
}

impl GroupSummary {
    pub fn new(group: Group, is_admin: bool) -> Self {
        Self {
            id: group.id,
            member_count: group.member_uids.len(),
            invite_code: group.invite_code.filter(|_| is_admin),
            name: group.name,
            owner_id: group.owner_id,
            created_at: format_system_time(group.created_at),
            is_admin,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// What a visitor learns about a group from its invite code.
pub struct InvitePreview {
    pub group_id: Uuid,
    pub name: String,
}

impl From<Group> for InvitePreview {
    fn from(value: Group) -> Self {
        Self {
            group_id: value.id,
            name: value.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    fn group() -> Group {
        Group {
            id: Uuid::new_v4(),
            owner_id: "owner".into(),
            name: "Casa".into(),
            created_at: SystemTime::UNIX_EPOCH,
            member_uids: vec!["a".into(), "b".into()],
            invite_code: Some("ABC123".into()),
        }
    }

    #[test]
    fn invite_code_only_for_admins() {
        assert_eq!(
            GroupSummary::new(group(), true).invite_code.as_deref(),
            Some("ABC123")
        );
        assert_eq!(GroupSummary::new(group(), false).invite_code, None);
        assert_eq!(GroupSummary::new(group(), false).member_count, 2);
    }

    #[test]
    fn join_request_checks_code_shape() {
        assert!(JoinGroupRequest { code: "abc123".into() }.validate().is_ok());
        assert!(JoinGroupRequest { code: "abc12".into() }.validate().is_err());
        assert!(JoinGroupRequest { code: "abc-12".into() }.validate().is_err());
    }
}
