pub mod ledger;
pub mod obligation;
pub mod pricing;
pub mod room;
pub mod roster;
mod sse;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, watch};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::store::Backend,
    error::ServiceError,
    identity::IdentityProvider,
    state::roster::MemberIdGenerator,
};

pub use self::sse::SseHub;
use self::sse::SseState;

pub type SharedState = Arc<AppState>;

const GROUP_SSE_CAPACITY: usize = 16;
const ROOMS_SSE_CAPACITY: usize = 32;

/// Central application state: configuration, storage handle and broadcast hubs.
pub struct AppState {
    store: RwLock<Option<Arc<dyn Backend>>>,
    degraded: watch::Sender<bool>,
    config: AppConfig,
    identities: Arc<dyn IdentityProvider>,
    member_ids: MemberIdGenerator,
    sse: SseState,
    /// One gate per group or room so read-modify-write sequences do not interleave.
    gates: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl AppState {
    /// Construct a new [`AppState`] using the token table from `config`.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let identities = Arc::new(config.identity_provider());
        Self::with_identity_provider(config, identities)
    }

    pub fn with_identity_provider(
        config: AppConfig,
        identities: Arc<dyn IdentityProvider>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
            config,
            identities,
            member_ids: MemberIdGenerator::new(),
            sse: SseState::new(GROUP_SSE_CAPACITY, ROOMS_SSE_CAPACITY),
            gates: DashMap::new(),
        })
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn Backend>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// The installed store, or [`ServiceError::Degraded`] while storage is unusable.
    pub async fn require_store(&self) -> Result<Arc<dyn Backend>, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn set_store(&self, store: Arc<dyn Backend>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn identities(&self) -> &dyn IdentityProvider {
        self.identities.as_ref()
    }

    /// Generator for member and join-request identifiers.
    pub fn member_ids(&self) -> &MemberIdGenerator {
        &self.member_ids
    }

    /// Broadcast hub of one group's ledger stream.
    pub fn group_sse(&self, group_id: Uuid) -> SseHub {
        self.sse.group(group_id)
    }

    /// Broadcast hub of the rooms stream.
    pub fn rooms_sse(&self) -> &SseHub {
        self.sse.rooms()
    }

    /// Serialise mutations of the group or room identified by `id`.
    pub async fn lock(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let gate = self.gates.entry(id).or_default().clone();
        gate.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::memory::MemoryStore;

    #[tokio::test]
    async fn starts_degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(matches!(state.require_store().await, Err(ServiceError::Degraded)));

        state.set_store(Arc::new(MemoryStore::new())).await;
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_store().await.is_ok());

        state.update_degraded(true);
        assert!(matches!(state.require_store().await, Err(ServiceError::Degraded)));
    }
}
