use serde::Serialize;
use utoipa::ToSchema;

/// Whether the storage backend is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

/// Body of `/healthcheck`.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Active rooms, when storage answered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_rooms: Option<usize>,
}

impl HealthResponse {
    pub fn ok(active_rooms: usize) -> Self {
        Self {
            status: HealthStatus::Ok,
            active_rooms: Some(active_rooms),
        }
    }

    pub fn degraded() -> Self {
        Self {
            status: HealthStatus::Degraded,
            active_rooms: None,
        }
    }
}
