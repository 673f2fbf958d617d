//! Storage trait definitions

use crate::error::StorageError;
use crate::state::AccountState;
use async_trait::async_trait;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable storage for per-account ledger state.
///
/// `save` must replace the whole document atomically: readers observe either
/// the previous or the new state, never a mix.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Load every stored account
    async fn load_all(&self) -> StorageResult<Vec<AccountState>>;

    /// Create or replace an account document
    async fn save(&self, state: &AccountState) -> StorageResult<()>;
}
