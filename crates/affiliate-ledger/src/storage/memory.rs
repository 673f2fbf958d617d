//! In-memory storage implementation

use super::traits::*;
use crate::state::AccountState;
use affiliate_types::AccountId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory account store for development and testing
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    accounts: Arc<RwLock<HashMap<AccountId, AccountState>>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn load_all(&self) -> StorageResult<Vec<AccountState>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().cloned().collect())
    }

    async fn save(&self, state: &AccountState) -> StorageResult<()> {
        let mut accounts = self.accounts.write().await;
        accounts.insert(state.account.id.clone(), state.clone());
        Ok(())
    }
}
