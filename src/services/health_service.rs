use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the installed store and report the active-room count alongside the status.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let store = match state.require_store().await {
        Ok(store) => store,
        Err(_) => {
            warn!("storage unavailable (degraded mode)");
            return HealthResponse::degraded();
        }
    };

    if let Err(err) = store.health_check().await {
        warn!(error = %err, "storage health check failed");
        return HealthResponse::degraded();
    }
    match store.list_active_rooms().await {
        Ok(rooms) => HealthResponse::ok(rooms.len()),
        Err(err) => {
            warn!(error = %err, "failed to count active rooms");
            HealthResponse::degraded()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig, dao::memory::MemoryStore, dto::health::HealthStatus, state::AppState,
    };

    #[tokio::test]
    async fn reports_degraded_until_storage_is_installed() {
        let state = AppState::new(AppConfig::default());
        assert_eq!(health_status(&state).await.status, HealthStatus::Degraded);

        let store = MemoryStore::new();
        state.set_store(Arc::new(store.clone())).await;
        let health = health_status(&state).await;
        assert_eq!(health.status, HealthStatus::Ok);
        assert_eq!(health.active_rooms, Some(0));

        store.set_offline(true);
        assert_eq!(health_status(&state).await.status, HealthStatus::Degraded);
    }
}
