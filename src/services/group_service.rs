//! Household groups: creation, invite codes and access checks shared by the ledger.

use std::time::SystemTime;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::group::{CreateGroupRequest, GroupSummary, InvitePreview, JoinGroupRequest},
    error::ServiceError,
    identity::Caller,
    state::{
        SharedState,
        ledger::Group,
        room::{generate_code, normalize_code},
        roster::sanitize_name,
    },
};

/// Fetch a group or fail with `NotFound`.
pub async fn load_group(state: &SharedState, group_id: Uuid) -> Result<Group, ServiceError> {
    let store = state.require_store().await?;
    store
        .find_group(group_id)
        .await?
        .map(Group::from)
        .ok_or_else(|| ServiceError::NotFound(format!("group `{group_id}` not found")))
}

/// Owner or superuser.
pub fn is_admin(state: &SharedState, caller: &Caller, group: &Group) -> bool {
    caller.identity().is_some_and(|identity| identity.uid == group.owner_id)
        || caller.is_superuser(&state.config().superuser_email)
}

/// Load the group and check the caller may read its ledger.
pub async fn ensure_viewer(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
) -> Result<Group, ServiceError> {
    let identity = caller.require_identity()?;
    let group = load_group(state, group_id).await?;
    if group.has_access(&identity.uid) || caller.is_superuser(&state.config().superuser_email) {
        Ok(group)
    } else {
        Err(ServiceError::Unauthorized("no access to this group".into()))
    }
}

/// Load the group and check the caller may mutate its ledger.
pub async fn ensure_admin(
    state: &SharedState,
    caller: &Caller,
    group_id: Uuid,
) -> Result<Group, ServiceError> {
    caller.require_identity()?;
    let group = load_group(state, group_id).await?;
    if is_admin(state, caller, &group) {
        Ok(group)
    } else {
        Err(ServiceError::Unauthorized(
            "only the group owner can manage the ledger".into(),
        ))
    }
}

/// Create a group owned by the caller and reserve a fresh invite code for it.
pub async fn create_group(
    state: &SharedState,
    caller: &Caller,
    payload: CreateGroupRequest,
) -> Result<GroupSummary, ServiceError> {
    let identity = caller.require_identity()?;
    let name = sanitize_name(&payload.name)?;
    let store = state.require_store().await?;
    let group_id = Uuid::new_v4();

    let mut invite_code = None;
    for _ in 0..state.config().code_attempts {
        let candidate = generate_code(&mut rand::rng());
        if store.claim_invite(candidate.clone(), group_id).await? {
            invite_code = Some(candidate);
            break;
        }
        warn!(%group_id, "invite code collision; drawing another");
    }
    let Some(invite_code) = invite_code else {
        return Err(ServiceError::Capacity(
            "could not allocate a unique invite code".into(),
        ));
    };

    let group = Group {
        id: group_id,
        owner_id: identity.uid.clone(),
        name,
        created_at: SystemTime::now(),
        member_uids: Vec::new(),
        invite_code: Some(invite_code.clone()),
    };
    if let Err(err) = store.save_group(group.clone().into()).await {
        // an invite must never point at a missing group
        if let Err(release_err) = store.release_invite(invite_code, group_id).await {
            warn!(%group_id, error = %release_err, "failed to release invite code");
        }
        return Err(err.into());
    }
    info!(%group_id, owner = %group.owner_id, "group created");

    Ok(GroupSummary::new(group, true))
}

/// Groups the caller owns or was invited to; every group for the superuser.
pub async fn list_groups(
    state: &SharedState,
    caller: &Caller,
) -> Result<Vec<GroupSummary>, ServiceError> {
    let identity = caller.require_identity()?;
    let store = state.require_store().await?;
    let filter = if caller.is_superuser(&state.config().superuser_email) {
        None
    } else {
        Some(identity.uid.clone())
    };

    let mut groups: Vec<Group> = store
        .list_groups(filter)
        .await?
        .into_iter()
        .map(Group::from)
        .collect();
    groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(groups
        .into_iter()
        .map(|group| {
            let admin = is_admin(state, caller, &group);
            GroupSummary::new(group, admin)
        })
        .collect())
}

/// Preview the group behind an invite code without joining it.
pub async fn resolve_invite(state: &SharedState, code: &str) -> Result<InvitePreview, ServiceError> {
    let group = find_by_invite(state, code).await?;
    Ok(group.into())
}

/// Add the caller to the viewers of the group behind an invite code.
pub async fn join_group_by_code(
    state: &SharedState,
    caller: &Caller,
    payload: JoinGroupRequest,
) -> Result<GroupSummary, ServiceError> {
    let identity = caller.require_identity()?;
    let group = find_by_invite(state, &payload.code).await?;

    if !group.has_access(&identity.uid) {
        let store = state.require_store().await?;
        if !store
            .add_group_member_uid(group.id, identity.uid.clone())
            .await?
        {
            return Err(ServiceError::NotFound(format!(
                "group `{}` not found",
                group.id
            )));
        }
        info!(group_id = %group.id, uid = %identity.uid, "user joined group");
    }

    let group = load_group(state, group.id).await?;
    let admin = is_admin(state, caller, &group);
    Ok(GroupSummary::new(group, admin))
}

async fn find_by_invite(state: &SharedState, code: &str) -> Result<Group, ServiceError> {
    let code = normalize_code(code);
    let store = state.require_store().await?;
    let group_id = store
        .resolve_invite(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("invite code `{code}` not found")))?;
    load_group(state, group_id).await
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io, sync::Arc};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            memory::MemoryStore,
            models::{GroupEntity, MemberEntity, PaymentEntity, RequestEntity, RoomEntity},
            storage::{StorageError, StorageResult},
            store::{GroupDataStore, RoomAdmission, RoomStore, StoreHealth},
        },
        identity::Identity,
        state::AppState,
    };

    fn caller(uid: &str, email: &str) -> Caller {
        Caller::authenticated(Identity {
            uid: uid.into(),
            email: email.into(),
            display_name: None,
        })
    }

    async fn state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state.set_store(Arc::new(MemoryStore::new())).await;
        state
    }

    #[tokio::test]
    async fn invite_flow_grants_read_access() {
        let state = state().await;
        let owner = caller("owner", "owner@example.com");
        let guest = caller("guest", "guest@example.com");

        let created = create_group(&state, &owner, CreateGroupRequest { name: " Casa ".into() })
            .await
            .unwrap();
        assert_eq!(created.name, "Casa");
        let code = created.invite_code.clone().unwrap();

        assert!(matches!(
            ensure_viewer(&state, &guest, created.id).await,
            Err(ServiceError::Unauthorized(_))
        ));

        let preview = resolve_invite(&state, &code.to_lowercase()).await.unwrap();
        assert_eq!(preview.group_id, created.id);

        let joined = join_group_by_code(&state, &guest, JoinGroupRequest { code: code.clone() })
            .await
            .unwrap();
        assert!(!joined.is_admin);
        assert_eq!(joined.invite_code, None);
        assert!(ensure_viewer(&state, &guest, created.id).await.is_ok());
        assert!(ensure_admin(&state, &guest, created.id).await.is_err());

        // joining twice is a no-op
        join_group_by_code(&state, &guest, JoinGroupRequest { code })
            .await
            .unwrap();
        let group = load_group(&state, created.id).await.unwrap();
        assert_eq!(group.member_uids, vec!["guest".to_string()]);

        let listed = list_groups(&state, &guest).await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn superuser_sees_and_manages_everything() {
        let state = state().await;
        let owner = caller("owner", "owner@example.com");
        let root = caller("root", "DARWIN47@elprivado.app");

        let created = create_group(&state, &owner, CreateGroupRequest { name: "A".into() })
            .await
            .unwrap();
        assert!(ensure_admin(&state, &root, created.id).await.is_ok());

        let listed = list_groups(&state, &root).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_admin);
        assert!(listed[0].invite_code.is_some());
    }

    #[tokio::test]
    async fn guests_and_unknown_codes_are_rejected() {
        let state = state().await;
        assert!(matches!(
            create_group(&state, &Caller::guest(), CreateGroupRequest { name: "A".into() }).await,
            Err(ServiceError::Unauthorized(_))
        ));
        assert!(matches!(
            resolve_invite(&state, "ZZZZZZ").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    /// Memory store whose group writes fail, recording every invite it hands out.
    #[derive(Clone, Default)]
    struct GroupWritesFail {
        inner: MemoryStore,
        claimed: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl GroupDataStore for GroupWritesFail {
        fn save_group(&self, _group: GroupEntity) -> BoxFuture<'static, StorageResult<()>> {
            Box::pin(async {
                Err(StorageError::unavailable(
                    "group write rejected".into(),
                    io::Error::other("write failed"),
                ))
            })
        }
        fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>> {
            self.inner.find_group(id)
        }
        fn list_groups(
            &self,
            uid: Option<String>,
        ) -> BoxFuture<'static, StorageResult<Vec<GroupEntity>>> {
            self.inner.list_groups(uid)
        }
        fn add_group_member_uid(
            &self,
            id: Uuid,
            uid: String,
        ) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.add_group_member_uid(id, uid)
        }
        fn claim_invite(
            &self,
            code: String,
            group_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<bool>> {
            self.claimed.lock().unwrap().push(code.clone());
            self.inner.claim_invite(code, group_id)
        }
        fn release_invite(
            &self,
            code: String,
            group_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.release_invite(code, group_id)
        }
        fn resolve_invite(&self, code: String) -> BoxFuture<'static, StorageResult<Option<Uuid>>> {
            self.inner.resolve_invite(code)
        }
        fn list_members(
            &self,
            group_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<MemberEntity>>> {
            self.inner.list_members(group_id)
        }
        fn save_member(
            &self,
            group_id: Uuid,
            member: MemberEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_member(group_id, member)
        }
        fn delete_member(
            &self,
            group_id: Uuid,
            member_id: String,
        ) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_member(group_id, member_id)
        }
        fn list_payments(
            &self,
            group_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<HashMap<String, PaymentEntity>>> {
            self.inner.list_payments(group_id)
        }
        fn save_payment(
            &self,
            group_id: Uuid,
            key: String,
            payment: PaymentEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_payment(group_id, key, payment)
        }
        fn delete_payment(
            &self,
            group_id: Uuid,
            key: String,
        ) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_payment(group_id, key)
        }
        fn list_requests(
            &self,
            group_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<RequestEntity>>> {
            self.inner.list_requests(group_id)
        }
        fn save_request(
            &self,
            group_id: Uuid,
            request: RequestEntity,
        ) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_request(group_id, request)
        }
        fn delete_request(
            &self,
            group_id: Uuid,
            request_id: String,
        ) -> BoxFuture<'static, StorageResult<bool>> {
            self.inner.delete_request(group_id, request_id)
        }
    }

    impl RoomStore for GroupWritesFail {
        fn insert_room(
            &self,
            room: RoomEntity,
            max_active: usize,
        ) -> BoxFuture<'static, StorageResult<RoomAdmission>> {
            self.inner.insert_room(room, max_active)
        }
        fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.save_room(room)
        }
        fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            self.inner.find_room(id)
        }
        fn find_active_room_by_code(
            &self,
            code: String,
        ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            self.inner.find_active_room_by_code(code)
        }
        fn find_active_room_by_admin_code(
            &self,
            admin_code: String,
        ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            self.inner.find_active_room_by_admin_code(admin_code)
        }
        fn list_active_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
            self.inner.list_active_rooms()
        }
        fn list_rooms_created_by(
            &self,
            creator: String,
            limit: usize,
        ) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
            self.inner.list_rooms_created_by(creator, limit)
        }
    }

    impl StoreHealth for GroupWritesFail {
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.try_reconnect()
        }
    }

    #[tokio::test]
    async fn failed_group_write_releases_the_invite() {
        let state = AppState::new(AppConfig::default());
        let store = GroupWritesFail::default();
        state.set_store(Arc::new(store.clone())).await;
        let owner = caller("owner", "owner@example.com");

        assert!(matches!(
            create_group(&state, &owner, CreateGroupRequest { name: "Casa".into() }).await,
            Err(ServiceError::Unavailable(_))
        ));

        let claimed = store.claimed.lock().unwrap().clone();
        assert_eq!(claimed.len(), 1);
        assert_eq!(store.inner.resolve_invite(claimed[0].clone()).await.unwrap(), None);
        assert!(matches!(
            resolve_invite(&state, &claimed[0]).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(store.inner.list_groups(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn release_keeps_codes_held_by_other_groups() {
        let store = MemoryStore::new();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(store.claim_invite("AB12CD".into(), first).await.unwrap());

        assert!(!store.release_invite("AB12CD".into(), second).await.unwrap());
        assert_eq!(store.resolve_invite("AB12CD".into()).await.unwrap(), Some(first));
        assert!(store.release_invite("AB12CD".into(), first).await.unwrap());
        assert_eq!(store.resolve_invite("AB12CD".into()).await.unwrap(), None);
    }
}
