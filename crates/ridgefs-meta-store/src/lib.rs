//! RidgeFS Metadata Store - versioned dentry storage
//!
//! This crate implements the per-partition dentry storage engine of the
//! metadata server: a multi-version name index with staged transactions
//! and idempotent replay under the replicated log.

pub mod codec;
pub mod dentry;
pub mod ledger;
pub mod store;
pub mod tables;
pub mod types;

// Re-exports
pub use dentry::{DentryStore, OpStatus};
pub use ledger::AppliedIndexLedger;
pub use store::{MetaStoreError, MetaStoreResult, RowStore, StoreConfig};
pub use tables::TableNames;
pub use types::{Dentry, DentryFlag};
