/// OpenAPI documentation generation.
pub mod documentation;
/// Household groups, invites and access checks.
pub mod group_service;
/// Health check service.
pub mod health_service;
/// Ledger operations: roster, payments and join requests.
pub mod ledger_service;
/// Recocho rooms: admission, authority and roster edits.
pub mod room_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
