//! Redb table definitions for persistent dentry storage.
//!
//! Every store instance serves one metadata partition; the partition id
//! names both the database file and the tables inside it.

use redb::TableDefinition;
use ridgefs_common::PartitionId;

// Partition-meta keys
pub(crate) const APPLIED_INDEX_KEY: &str = "applied_log_index";
pub(crate) const PENDING_TX_KEY: &str = "pending_tx";

/// Owned table names scoped to one partition.
#[derive(Clone, Debug)]
pub struct TableNames {
    dentries: String,
    meta: String,
}

impl TableNames {
    /// Derive the table names for a partition.
    #[must_use]
    pub fn for_partition(partition_id: PartitionId) -> Self {
        Self {
            dentries: format!("dentries_{partition_id}"),
            meta: format!("partition_meta_{partition_id}"),
        }
    }

    // Key: codec-encoded (fs_id, parent, name, version), Value: bincode-encoded Dentry
    #[must_use]
    pub fn dentries(&self) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
        TableDefinition::new(&self.dentries)
    }

    // Key: meta key string, Value: applied index (8-byte BE) or pending-tx payload
    #[must_use]
    pub fn meta(&self) -> TableDefinition<'_, &'static str, &'static [u8]> {
        TableDefinition::new(&self.meta)
    }
}
