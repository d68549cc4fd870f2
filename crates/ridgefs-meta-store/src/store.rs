//! Persistent row store backed by redb.
//!
//! Owns the database handle and the partition-scoped table definitions.
//! All policy (version visibility, garbage collection, idempotent replay)
//! lives in the dentry engine; this module only hands out transactions
//! and table handles.

use crate::tables::TableNames;
use redb::{Database, ReadTransaction, ReadableTableMetadata, TableDefinition, WriteTransaction};
use ridgefs_common::PartitionId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Error type for dentry store operations
#[derive(Debug, thiserror::Error)]
pub enum MetaStoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid dentry name {name:?}: names must not contain NUL")]
    InvalidName { name: String },
    #[error("corrupt store data: {what}")]
    Corrupt { what: &'static str },
}

impl From<redb::TransactionError> for MetaStoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

pub type MetaStoreResult<T> = Result<T, MetaStoreError>;

/// Configuration for one partition's dentry store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding the database file
    pub data_dir: PathBuf,
    /// Partition this store instance serves
    pub partition_id: PartitionId,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/ridgefs/meta"),
            partition_id: PartitionId::new(0),
        }
    }
}

/// Persistent row store backed by redb.
pub struct RowStore {
    db: Database,
    tables: TableNames,
}

impl RowStore {
    /// Open (or create) the database file for the configured partition.
    pub fn open(config: &StoreConfig) -> MetaStoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let path = config
            .data_dir
            .join(format!("dentry_{}.redb", config.partition_id));
        let db = Database::create(path)?;
        let tables = TableNames::for_partition(config.partition_id);

        // Create the tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables.dentries())?;
            let _t = write_txn.open_table(tables.meta())?;
        }
        write_txn.commit()?;

        Ok(Self { db, tables })
    }

    pub fn begin_read(&self) -> MetaStoreResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    pub fn begin_write(&self) -> MetaStoreResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Dentry-row table definition for this partition.
    #[must_use]
    pub fn dentries(&self) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
        self.tables.dentries()
    }

    /// Partition-meta table definition for this partition.
    #[must_use]
    pub fn meta(&self) -> TableDefinition<'_, &'static str, &'static [u8]> {
        self.tables.meta()
    }

    /// Number of physical dentry rows, staged and tombstone rows included.
    pub fn row_count(&self) -> MetaStoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(self.tables.dentries())?;
        Ok(table.len()?)
    }
}
