//! Storage module for federation persistence

pub mod accessor;
pub mod federation_storage;

pub use accessor::{
    InMemoryStorage, JsonFileStorage, StorageAccessor, StorageConfig, StorageError,
};
pub use federation_storage::{FederationStorageProvider, StorageKey};
