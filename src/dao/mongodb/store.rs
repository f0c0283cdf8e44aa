use std::{collections::HashMap, sync::Arc};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        GroupDocument, InviteDocument, MemberDocument, PaymentDocument, RequestDocument,
        RoomDocument,
    },
};
use crate::dao::{
    models::{
        GroupEntity, MemberEntity, PaymentEntity, RequestEntity, RoomEntity, RoomStatus,
    },
    storage::StorageResult,
    store::{GroupDataStore, RoomAdmission, RoomStore, StoreHealth},
};

const GROUPS: &str = "groups";
const INVITES: &str = "invites";
const MEMBERS: &str = "members";
const PAYMENTS: &str = "payments";
const REQUESTS: &str = "requests";
const ROOMS: &str = "recochos";

#[derive(Clone)]
pub struct MongoStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        info!("MongoDB connection re-established");
        Ok(())
    }
}

fn active_filter(field: &str, value: String) -> Document {
    doc! { field: value, "status": RoomStatus::Active.as_str() }
}

fn unique_index(keys: Document, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(Some(name.to_owned()))
                .unique(Some(true))
                .build(),
        )
        .build()
}

/// Unique among active rooms only, so finished rooms may share codes with new ones.
fn active_unique_index(field: &str, name: &str) -> IndexModel {
    IndexModel::builder()
        .keys(doc! { field: 1 })
        .options(
            IndexOptions::builder()
                .name(Some(name.to_owned()))
                .unique(Some(true))
                .partial_filter_expression(Some(doc! { "status": RoomStatus::Active.as_str() }))
                .build(),
        )
        .build()
}

impl MongoStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;
        let indexes = [
            (
                MEMBERS,
                "group_id,member_id",
                unique_index(doc! {"group_id": 1, "member_id": 1}, "member_key_idx"),
            ),
            (
                PAYMENTS,
                "group_id,key",
                unique_index(doc! {"group_id": 1, "key": 1}, "payment_key_idx"),
            ),
            (
                REQUESTS,
                "group_id,request_id",
                unique_index(doc! {"group_id": 1, "request_id": 1}, "request_key_idx"),
            ),
            (ROOMS, "code", active_unique_index("code", "active_code_idx")),
            (
                ROOMS,
                "admin_code",
                active_unique_index("admin_code", "active_admin_code_idx"),
            ),
        ];

        for (collection, index, model) in indexes {
            database
                .collection::<Document>(collection)
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index,
                    source,
                })?;
        }

        let created_by = IndexModel::builder()
            .keys(doc! {"created_by": 1, "created_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("room_creator_idx".to_owned()))
                    .build(),
            )
            .build();
        database
            .collection::<Document>(ROOMS)
            .create_index(created_by)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: ROOMS,
                index: "created_by,created_at",
                source,
            })?;

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<T>(name)
    }

    async fn save_group(&self, group: GroupEntity) -> MongoResult<()> {
        let id = group.id.to_string();
        let document = GroupDocument::from(group);
        self.collection::<GroupDocument>(GROUPS)
            .await
            .replace_one(doc! {"_id": id}, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: GROUPS,
                source,
            })?;
        Ok(())
    }

    async fn find_group(&self, id: Uuid) -> MongoResult<Option<GroupEntity>> {
        let document = self
            .collection::<GroupDocument>(GROUPS)
            .await
            .find_one(doc! {"_id": id.to_string()})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: GROUPS,
                source,
            })?;
        document.map(GroupEntity::try_from).transpose()
    }

    async fn list_groups(&self, uid: Option<String>) -> MongoResult<Vec<GroupEntity>> {
        let filter = match uid {
            Some(uid) => doc! {"$or": [{"owner_id": uid.as_str()}, {"member_uids": uid.as_str()}]},
            None => doc! {},
        };
        let documents: Vec<GroupDocument> = self
            .collection::<GroupDocument>(GROUPS)
            .await
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: GROUPS,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: GROUPS,
                source,
            })?;
        documents.into_iter().map(GroupEntity::try_from).collect()
    }

    async fn add_group_member_uid(&self, id: Uuid, uid: String) -> MongoResult<bool> {
        let result = self
            .collection::<GroupDocument>(GROUPS)
            .await
            .update_one(
                doc! {"_id": id.to_string()},
                doc! {"$addToSet": {"member_uids": uid}},
            )
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: GROUPS,
                source,
            })?;
        Ok(result.matched_count > 0)
    }

    async fn claim_invite(&self, code: String, group_id: Uuid) -> MongoResult<bool> {
        let document = InviteDocument {
            code,
            group_id: group_id.to_string(),
        };
        match self
            .collection::<InviteDocument>(INVITES)
            .await
            .insert_one(&document)
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_duplicate_key(&err) => Ok(false),
            Err(source) => Err(MongoDaoError::Write {
                collection: INVITES,
                source,
            }),
        }
    }

    async fn release_invite(&self, code: String, group_id: Uuid) -> MongoResult<bool> {
        let result = self
            .collection::<InviteDocument>(INVITES)
            .await
            .delete_one(doc! {"_id": code, "group_id": group_id.to_string()})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: INVITES,
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn resolve_invite(&self, code: String) -> MongoResult<Option<Uuid>> {
        let document = self
            .collection::<InviteDocument>(INVITES)
            .await
            .find_one(doc! {"_id": code})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: INVITES,
                source,
            })?;
        document
            .map(|invite| {
                Uuid::parse_str(&invite.group_id).map_err(|source| MongoDaoError::InvalidId {
                    collection: INVITES,
                    id: invite.group_id,
                    source,
                })
            })
            .transpose()
    }

    async fn list_scoped<T>(&self, collection: &'static str, group_id: Uuid) -> MongoResult<Vec<T>>
    where
        T: serde::de::DeserializeOwned + Unpin + Send + Sync,
    {
        self.collection::<T>(collection)
            .await
            .find(doc! {"group_id": group_id.to_string()})
            .await
            .map_err(|source| MongoDaoError::Read { collection, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read { collection, source })
    }

    async fn delete_scoped(
        &self,
        collection: &'static str,
        group_id: Uuid,
        field: &str,
        value: String,
    ) -> MongoResult<bool> {
        let result = self
            .collection::<Document>(collection)
            .await
            .delete_one(doc! {"group_id": group_id.to_string(), field: value})
            .await
            .map_err(|source| MongoDaoError::Write { collection, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn save_member(&self, group_id: Uuid, member: MemberEntity) -> MongoResult<()> {
        let filter = doc! {"group_id": group_id.to_string(), "member_id": member.id.as_str()};
        let document = MemberDocument::from((group_id, member));
        self.collection::<MemberDocument>(MEMBERS)
            .await
            .replace_one(filter, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: MEMBERS,
                source,
            })?;
        Ok(())
    }

    async fn save_payment(
        &self,
        group_id: Uuid,
        key: String,
        payment: PaymentEntity,
    ) -> MongoResult<()> {
        let filter = doc! {"group_id": group_id.to_string(), "key": key.as_str()};
        let document = PaymentDocument::new(group_id, key, payment);
        self.collection::<PaymentDocument>(PAYMENTS)
            .await
            .replace_one(filter, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: PAYMENTS,
                source,
            })?;
        Ok(())
    }

    async fn save_request(&self, group_id: Uuid, request: RequestEntity) -> MongoResult<()> {
        let filter = doc! {"group_id": group_id.to_string(), "request_id": request.id.as_str()};
        let document = RequestDocument::from((group_id, request));
        self.collection::<RequestDocument>(REQUESTS)
            .await
            .replace_one(filter, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: REQUESTS,
                source,
            })?;
        Ok(())
    }

    /// Count-then-insert. Two concurrent callers may both pass the count; the partial
    /// unique indexes still reject duplicate codes.
    async fn insert_room(&self, room: RoomEntity, max_active: usize) -> MongoResult<RoomAdmission> {
        let rooms = self.collection::<RoomDocument>(ROOMS).await;
        let active = rooms
            .count_documents(doc! {"status": RoomStatus::Active.as_str()})
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: ROOMS,
                source,
            })?;
        if active >= max_active as u64 {
            return Ok(RoomAdmission::CapacityReached);
        }

        let collision = rooms
            .count_documents(doc! {
                "status": RoomStatus::Active.as_str(),
                "$or": [
                    {"code": {"$in": [room.code.as_str(), room.admin_code.as_str()]}},
                    {"admin_code": {"$in": [room.code.as_str(), room.admin_code.as_str()]}},
                ],
            })
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: ROOMS,
                source,
            })?;
        if collision > 0 {
            return Ok(RoomAdmission::CodeConflict);
        }

        match rooms.insert_one(&RoomDocument::from(room)).await {
            Ok(_) => Ok(RoomAdmission::Admitted),
            Err(err) if is_duplicate_key(&err) => {
                warn!(error = %err, "room code collided at insert time");
                Ok(RoomAdmission::CodeConflict)
            }
            Err(source) => Err(MongoDaoError::Write {
                collection: ROOMS,
                source,
            }),
        }
    }

    async fn save_room(&self, room: RoomEntity) -> MongoResult<()> {
        let id = room.id.to_string();
        self.collection::<RoomDocument>(ROOMS)
            .await
            .replace_one(doc! {"_id": id}, &RoomDocument::from(room))
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: ROOMS,
                source,
            })?;
        Ok(())
    }

    async fn find_room_by(&self, filter: Document) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .collection::<RoomDocument>(ROOMS)
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: ROOMS,
                source,
            })?;
        document.map(RoomEntity::try_from).transpose()
    }

    async fn list_rooms_by(
        &self,
        filter: Document,
        limit: Option<usize>,
    ) -> MongoResult<Vec<RoomEntity>> {
        let rooms = self.collection::<RoomDocument>(ROOMS).await;
        let mut find = rooms.find(filter).sort(doc! {"created_at": -1});
        if let Some(limit) = limit {
            find = find.limit(limit as i64);
        }
        let documents: Vec<RoomDocument> = find
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: ROOMS,
                source,
            })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: ROOMS,
                source,
            })?;
        documents.into_iter().map(RoomEntity::try_from).collect()
    }
}

impl GroupDataStore for MongoStore {
    fn save_group(&self, group: GroupEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_group(group).await.map_err(Into::into) })
    }

    fn find_group(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GroupEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_group(id).await.map_err(Into::into) })
    }

    fn list_groups(
        &self,
        uid: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Vec<GroupEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_groups(uid).await.map_err(Into::into) })
    }

    fn add_group_member_uid(
        &self,
        id: Uuid,
        uid: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.add_group_member_uid(id, uid).await.map_err(Into::into) })
    }

    fn claim_invite(
        &self,
        code: String,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.claim_invite(code, group_id).await.map_err(Into::into) })
    }

    fn release_invite(
        &self,
        code: String,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.release_invite(code, group_id).await.map_err(Into::into) })
    }

    fn resolve_invite(&self, code: String) -> BoxFuture<'static, StorageResult<Option<Uuid>>> {
        let store = self.clone();
        Box::pin(async move { store.resolve_invite(code).await.map_err(Into::into) })
    }

    fn list_members(&self, group_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<MemberEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents: Vec<MemberDocument> = store.list_scoped(MEMBERS, group_id).await?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn save_member(
        &self,
        group_id: Uuid,
        member: MemberEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_member(group_id, member).await.map_err(Into::into) })
    }

    fn delete_member(
        &self,
        group_id: Uuid,
        member_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_scoped(MEMBERS, group_id, "member_id", member_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_payments(
        &self,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<HashMap<String, PaymentEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents: Vec<PaymentDocument> = store.list_scoped(PAYMENTS, group_id).await?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn save_payment(
        &self,
        group_id: Uuid,
        key: String,
        payment: PaymentEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .save_payment(group_id, key, payment)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_payment(
        &self,
        group_id: Uuid,
        key: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_scoped(PAYMENTS, group_id, "key", key)
                .await
                .map_err(Into::into)
        })
    }

    fn list_requests(
        &self,
        group_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<RequestEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents: Vec<RequestDocument> = store.list_scoped(REQUESTS, group_id).await?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn save_request(
        &self,
        group_id: Uuid,
        request: RequestEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_request(group_id, request).await.map_err(Into::into) })
    }

    fn delete_request(
        &self,
        group_id: Uuid,
        request_id: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_scoped(REQUESTS, group_id, "request_id", request_id)
                .await
                .map_err(Into::into)
        })
    }
}

impl RoomStore for MongoStore {
    fn insert_room(
        &self,
        room: RoomEntity,
        max_active: usize,
    ) -> BoxFuture<'static, StorageResult<RoomAdmission>> {
        let store = self.clone();
        Box::pin(async move { store.insert_room(room, max_active).await.map_err(Into::into) })
    }

    fn save_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_room(room).await.map_err(Into::into) })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_room_by(doc! {"_id": id.to_string()})
                .await
                .map_err(Into::into)
        })
    }

    fn find_active_room_by_code(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_room_by(active_filter("code", code))
                .await
                .map_err(Into::into)
        })
    }

    fn find_active_room_by_admin_code(
        &self,
        admin_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_room_by(active_filter("admin_code", admin_code))
                .await
                .map_err(Into::into)
        })
    }

    fn list_active_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_rooms_by(doc! {"status": RoomStatus::Active.as_str()}, None)
                .await
                .map_err(Into::into)
        })
    }

    fn list_rooms_created_by(
        &self,
        creator: String,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_rooms_by(doc! {"created_by": creator}, Some(limit))
                .await
                .map_err(Into::into)
        })
    }
}

impl StoreHealth for MongoStore {
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
