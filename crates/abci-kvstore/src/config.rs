//! Key/value store configuration.

use crate::error::{KvStoreError, Result};
use serde::{Deserialize, Serialize};

/// Snapshot settings of the key/value store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KvStoreConfig {
    /// Take a snapshot every this many heights; zero disables snapshots.
    pub snapshot_interval: u64,

    /// Size of each snapshot chunk in bytes.
    pub snapshot_chunk_size: usize,

    /// Number of most recent snapshots kept.
    pub snapshot_keep_recent: usize,

    /// Largest chunk count accepted from a snapshot offer.
    pub max_snapshot_chunks: u32,
}

impl Default for KvStoreConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 100,
            snapshot_chunk_size: 64 * 1024,
            snapshot_keep_recent: 2,
            max_snapshot_chunks: 16 * 1024,
        }
    }
}

impl KvStoreConfig {
    /// Creates a configuration with snapshots disabled.
    pub fn without_snapshots() -> Self {
        Self {
            snapshot_interval: 0,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_snapshot_chunks == 0 {
            return Err(KvStoreError::InvalidConfig(
                "max_snapshot_chunks must be positive".into(),
            ));
        }
        if self.snapshot_interval > 0 {
            if self.snapshot_chunk_size == 0 {
                return Err(KvStoreError::InvalidConfig(
                    "snapshot_chunk_size must be positive".into(),
                ));
            }
            if self.snapshot_keep_recent == 0 {
                return Err(KvStoreError::InvalidConfig(
                    "snapshot_keep_recent must be positive".into(),
                ));
            }
        }
        Ok(())
    }
}
