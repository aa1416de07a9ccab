//! Durable credential storage for the Campus client.
//!
//! This crate provides the key/value backends that hold the client's tokens:
//! - **File**: a JSON map under `~/.campus/credentials.json`, written atomically
//! - **Memory**: process-local storage for ephemeral sessions and tests
//!
//! [`CredentialStore`] is the typed API the rest of the client goes through.

mod credentials;
mod file;
mod keys;
mod memory;
mod traits;

pub use credentials::CredentialStore;
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::StorageBackend;

use client_config_and_utils::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend could not persist or load its data
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default file-backed storage under the given paths.
pub fn create_storage(paths: &Paths) -> StorageResult<Box<dyn StorageBackend>> {
    std::fs::create_dir_all(paths.base_dir())?;
    let storage = FileStorage::open(paths.credentials_file());
    Ok(Box::new(storage))
}

/// Create a CredentialStore over the default file-backed storage.
pub fn create_credential_store(paths: &Paths) -> StorageResult<CredentialStore> {
    let storage = create_storage(paths)?;
    Ok(CredentialStore::new(storage))
}
