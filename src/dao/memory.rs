//! In-process backend used by tests and as the default when no database is configured.

use std::{
    collections::HashMap,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::dao::{
    models::{GroupEntity, MemberEntity, PaymentEntity, RequestEntity, RoomEntity, RoomStatus},
    storage::{StorageError, StorageResult},
    store::{GroupDataStore, RoomAdmission, RoomStore, StoreHealth},
};

/// Shared-nothing store backed by concurrent maps. Cloning shares the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    groups: DashMap<Uuid, GroupEntity>,
    invites: DashMap<String, Uuid>,
    members: DashMap<Uuid, HashMap<String, MemberEntity>>,
    payments: DashMap<Uuid, HashMap<String, PaymentEntity>>,
    requests: DashMap<Uuid, HashMap<String, RequestEntity>>,
    rooms: DashMap<Uuid, RoomEntity>,
    /// Serialises count-then-insert so admission is atomic.
    admission: Mutex<()>,
    offline: AtomicBool,
}

impl MemoryInner {
    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::Acquire) {
            return Err(StorageError::unavailable(
                "memory store is offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "offline"),
            ));
        }
        Ok(())
    }

    fn active_rooms(&self) -> Vec<RoomEntity> {
        self.rooms
            .iter()
            .filter(|room| room.status == RoomStatus::Active)
            .map(|room| room.value().clone())
            .collect()
    }

    fn find_active_room(&self, matches: impl Fn(&RoomEntity) -> bool) -> Option<RoomEntity> {
        self.rooms
            .iter()
            .find(|room| room.status == RoomStatus::Active && matches(room.value()))
            .map(|room| room.value().clone())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the backend were unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::Release);
    }

    fn run<T, F>(&self, op: F) -> BoxFuture<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(&MemoryInner) -> T + Send + 'static,
    {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            Ok(op(&inner))
        })
    }
}

impl GroupDataStore for MemoryStore {
    fn save_group(&self, group: GroupEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.groups.insert(group.id, group);
        })
    }

    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>> {
        self.run(move |inner| inner.groups.get(&id).map(|group| group.value().clone()))
    }

    fn list_groups(
        &self,
        uid: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupEntity>>> {
        self.run(move |inner| {
            inner
                .groups
                .iter()
                .filter(|group| match uid.as_deref() {
                    Some(uid) => {
                        group.owner_id == uid || group.member_uids.iter().any(|m| m == uid)
                    }
                    None => true,
                })
                .map(|group| group.value().clone())
                .collect()
        })
    }

    fn add_group_member_uid(
        &self,
        id: Uuid,
        uid: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(move |inner| match inner.groups.get_mut(&id) {
            Some(mut group) => {
                if !group.member_uids.contains(&uid) {
                    group.member_uids.push(uid);
                }
                true
            }
            None => false,
        })
    }

    fn claim_invite(
        &self,
        code: String,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(move |inner| match inner.invites.entry(code) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(group_id);
                true
            }
        })
    }

    fn release_invite(
        &self,
        code: String,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(move |inner| {
            inner
                .invites
                .remove_if(&code, |_, owner| *owner == group_id)
                .is_some()
        })
    }

    fn resolve_invite(&self, code: String) -> BoxFuture<'static, StorageResult<Option<Uuid>>> {
        self.run(move |inner| inner.invites.get(&code).map(|id| *id))
    }

    fn list_members(&self, group_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MemberEntity>>> {
        self.run(move |inner| {
            inner
                .members
                .get(&group_id)
                .map(|members| members.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    fn save_member(
        &self,
        group_id: Uuid,
        member: MemberEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner
                .members
                .entry(group_id)
                .or_default()
                .insert(member.id.clone(), member);
        })
    }

    fn delete_member(
        &self,
        group_id: Uuid,
        member_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(move |inner| {
            inner
                .members
                .get_mut(&group_id)
                .is_some_and(|mut members| members.remove(&member_id).is_some())
        })
    }

    fn list_payments(
        &self,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, PaymentEntity>>> {
        self.run(move |inner| {
            inner
                .payments
                .get(&group_id)
                .map(|payments| payments.value().clone())
                .unwrap_or_default()
        })
    }

    fn save_payment(
        &self,
        group_id: Uuid,
        key: String,
        payment: PaymentEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.payments.entry(group_id).or_default().insert(key, payment);
        })
    }

    fn delete_payment(
        &self,
        group_id: Uuid,
        key: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(move |inner| {
            inner
                .payments
                .get_mut(&group_id)
                .is_some_and(|mut payments| payments.remove(&key).is_some())
        })
    }

    fn list_requests(
        &self,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RequestEntity>>> {
        self.run(move |inner| {
            inner
                .requests
                .get(&group_id)
                .map(|requests| requests.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    fn save_request(
        &self,
        group_id: Uuid,
        request: RequestEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner
                .requests
                .entry(group_id)
                .or_default()
                .insert(request.id.clone(), request);
        })
    }

    fn delete_request(
        &self,
        group_id: Uuid,
        request_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        self.run(move |inner| {
            inner
                .requests
                .get_mut(&group_id)
                .is_some_and(|mut requests| requests.remove(&request_id).is_some())
        })
    }
}

impl RoomStore for MemoryStore {
    fn insert_room(
        &self,
        room: RoomEntity,
        max_active: usize,
    ) -> BoxFuture<'static, StorageResult<RoomAdmission>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            let _admission = inner.admission.lock().await;

            let active = inner.active_rooms();
            if active.len() >= max_active {
                return Ok(RoomAdmission::CapacityReached);
            }
            let collides = active.iter().any(|other| {
                [&other.code, &other.admin_code]
                    .into_iter()
                    .any(|taken| *taken == room.code || *taken == room.admin_code)
            });
            if collides {
                return Ok(RoomAdmission::CodeConflict);
            }

            inner.rooms.insert(room.id, room);
            Ok(RoomAdmission::Admitted)
        })
    }

    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.run(move |inner| {
            inner.rooms.insert(room.id, room);
        })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.run(move |inner| inner.rooms.get(&id).map(|room| room.value().clone()))
    }

    fn find_active_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.run(move |inner| inner.find_active_room(|room| room.code == code))
    }

    fn find_active_room_by_admin_code(
        &self,
        admin_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        self.run(move |inner| inner.find_active_room(|room| room.admin_code == admin_code))
    }

    fn list_active_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        self.run(|inner| inner.active_rooms())
    }

    fn list_rooms_created_by(
        &self,
        creator: String,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        self.run(move |inner| {
            let mut rooms: Vec<RoomEntity> = inner
                .rooms
                .iter()
                .filter(|room| room.created_by == creator)
                .map(|room| room.value().clone())
                .collect();
            rooms.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            rooms.truncate(limit);
            rooms
        })
    }
}

impl StoreHealth for MemoryStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.run(|_| ())
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.run(|_| ())
    }
}
