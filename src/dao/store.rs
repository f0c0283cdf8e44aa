//! Persistence collaborators injected into the services.
//!
//! Every method returns a `'static` boxed future so implementations can be held as
//! `Arc<dyn Backend>` and cloned into spawned tasks.

use std::collections::HashMap;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{GroupEntity, MemberEntity, PaymentEntity, RequestEntity, RoomEntity},
    storage::StorageResult,
};

/// Outcome of the room admission primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAdmission {
    /// The room was stored as active.
    Admitted,
    /// The active-room ceiling was already reached; nothing was written.
    CapacityReached,
    /// Another active room already uses one of the codes; nothing was written.
    CodeConflict,
}

/// Groups, the invite-code indirection and the per-group ledger collections.
pub trait GroupDataStore: Send + Sync {
    fn save_group(&self, group: GroupEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>>;
    /// Groups owned by or shared with `uid`; every group when `uid` is `None`.
    fn list_groups(&self, uid: Option<String>)
    -> BoxFuture<'static, StorageResult<Vec<GroupEntity>>>;
    /// Add `uid` to the group's viewers. Returns `false` when the group does not exist.
    fn add_group_member_uid(
        &self,
        id: Uuid,
        uid: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Insert-if-absent of `code -> group_id`. Returns `false` when the code is taken.
    fn claim_invite(&self, code: String, group_id: Uuid)
    -> BoxFuture<'static, StorageResult<bool>>;
    /// Drop the claim `group_id` holds on `code`. A code held by another group is kept.
    fn release_invite(&self, code: String, group_id: Uuid)
    -> BoxFuture<'static, StorageResult<bool>>;
    fn resolve_invite(&self, code: String) -> BoxFuture<'static, StorageResult<Option<Uuid>>>;

    fn list_members(&self, group_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MemberEntity>>>;
    /// Upsert by member id.
    fn save_member(
        &self,
        group_id: Uuid,
        member: MemberEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_member(
        &self,
        group_id: Uuid,
        member_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;

    /// Every payment record of the group keyed by composite key.
    fn list_payments(
        &self,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, PaymentEntity>>>;
    /// Upsert by composite key; writing twice leaves one record.
    fn save_payment(
        &self,
        group_id: Uuid,
        key: String,
        payment: PaymentEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_payment(&self, group_id: Uuid, key: String)
    -> BoxFuture<'static, StorageResult<bool>>;

    fn list_requests(
        &self,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RequestEntity>>>;
    fn save_request(
        &self,
        group_id: Uuid,
        request: RequestEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    fn delete_request(
        &self,
        group_id: Uuid,
        request_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
}

/// Recocho rooms.
pub trait RoomStore: Send + Sync {
    /// Store `room` as active unless `max_active` active rooms already exist or one of its
    /// codes collides with an active room.
    fn insert_room(
        &self,
        room: RoomEntity,
        max_active: usize,
    ) -> BoxFuture<'static, StorageResult<RoomAdmission>>;
    /// Overwrite an existing room.
    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    fn find_active_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    fn find_active_room_by_admin_code(
        &self,
        admin_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    fn list_active_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>>;
    /// Rooms created by `creator` in any status, newest first.
    fn list_rooms_created_by(
        &self,
        creator: String,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>>;
}

/// Liveness hooks used by the storage supervisor.
pub trait StoreHealth: Send + Sync {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Everything the services need from a storage backend.
pub trait Backend: GroupDataStore + RoomStore + StoreHealth {}

impl<T> Backend for T where T: GroupDataStore + RoomStore + StoreHealth {}
