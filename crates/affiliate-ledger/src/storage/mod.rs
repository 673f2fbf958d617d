//! Storage layer for the affiliate ledger
//!
//! Persists one [`AccountState`](crate::state::AccountState) document per
//! affiliate: account row, referral rows and the applied-event set.

mod file;
mod memory;
mod traits;

pub use file::FileStore;
pub use memory::InMemoryStore;
pub use traits::{AccountStore, StorageResult};

use std::sync::Arc;

use crate::config::StorageConfig;
use crate::error::StorageError;

/// Build the store selected by configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn AccountStore>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(InMemoryStore::new())),
        StorageConfig::File { path } if path.as_os_str().is_empty() => Err(StorageError::Backend(
            "file storage requires a non-empty `path`".into(),
        )),
        StorageConfig::File { path } => Ok(Arc::new(FileStore::open(path).await?)),
    }
}
