/// In-process storage backend.
pub mod memory;
/// Database model definitions.
pub mod models;
/// MongoDB storage backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;
/// Storage error types shared by every backend.
pub mod storage;
/// Persistence traits implemented by the backends.
pub mod store;
