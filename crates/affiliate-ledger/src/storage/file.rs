//! File-backed storage: one JSON document per account

use super::traits::*;
use crate::error::StorageError;
use crate::state::AccountState;
use affiliate_types::AccountId;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Account store writing `<dir>/<account-uuid>.json`.
///
/// Each save writes and fsyncs a sibling temporary file, renames it over the
/// document and fsyncs the directory, so a crash mid-write leaves the
/// previous version intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> StorageResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn document_path(&self, id: &AccountId) -> PathBuf {
        self.dir.join(format!("{}.json", id.as_uuid()))
    }

    /// Flush the directory entry so a completed rename survives power loss.
    #[cfg(unix)]
    async fn sync_dir(&self) -> StorageResult<()> {
        tokio::fs::File::open(&self.dir).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_dir(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl AccountStore for FileStore {
    async fn load_all(&self) -> StorageResult<Vec<AccountState>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut states = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            let state: AccountState = serde_json::from_slice(&bytes).map_err(|e| {
                warn!(path = %path.display(), error = %e, "Unreadable account document");
                StorageError::Serialization(format!("{}: {}", path.display(), e))
            })?;
            states.push(state);
        }

        debug!(dir = %self.dir.display(), accounts = states.len(), "Loaded account documents");
        Ok(states)
    }

    async fn save(&self, state: &AccountState) -> StorageResult<()> {
        let path = self.document_path(&state.account.id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(state)?;

        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        self.sync_dir().await
    }
}
