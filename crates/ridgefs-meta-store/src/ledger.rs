//! Applied-index ledger: replay protection for the log apply path.
//!
//! Every mutating request carries the replicated-log index it was committed
//! at. The ledger records the highest index already applied; a request at
//! or below that index is a re-delivery and must not touch state again.
//! The persistent copy is written in the same transaction as the mutation
//! it stamps, so a crash can never separate the two.

use crate::store::{MetaStoreError, MetaStoreResult, RowStore};
use crate::tables::APPLIED_INDEX_KEY;
use parking_lot::{Mutex, MutexGuard};
use redb::Table;
use ridgefs_common::LogIndex;

/// Highest applied replicated-log index for one partition.
///
/// The in-memory cell answers the replay guard without touching the
/// database; mutating operations hold its lock across their whole apply
/// step, which also serializes writers.
pub struct AppliedIndexLedger {
    last: Mutex<Option<LogIndex>>,
}

impl AppliedIndexLedger {
    /// Load the persisted index, if any, from the partition meta table.
    pub fn load(store: &RowStore) -> MetaStoreResult<Self> {
        let read_txn = store.begin_read()?;
        let table = read_txn.open_table(store.meta())?;
        let last = match table.get(APPLIED_INDEX_KEY)? {
            Some(val) => Some(LogIndex::new(decode_index(val.value())?)),
            None => None,
        };
        Ok(Self {
            last: Mutex::new(last),
        })
    }

    /// Lock the in-memory cell for the duration of one apply step.
    pub fn lock(&self) -> MutexGuard<'_, Option<LogIndex>> {
        self.last.lock()
    }

    /// Whether `index` was already applied and must be dropped.
    #[must_use]
    pub fn already_applied(last: Option<LogIndex>, index: LogIndex) -> bool {
        last.is_some_and(|applied| index <= applied)
    }

    /// Persist `index` through the caller's open meta table, joining the
    /// transaction that applies the mutation itself.
    pub fn record(
        table: &mut Table<'_, &'static str, &'static [u8]>,
        index: LogIndex,
    ) -> MetaStoreResult<()> {
        table.insert(APPLIED_INDEX_KEY, index.get().to_be_bytes().as_slice())?;
        Ok(())
    }
}

fn decode_index(bytes: &[u8]) -> MetaStoreResult<u64> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| MetaStoreError::Corrupt {
        what: "applied index is not 8 bytes",
    })?;
    Ok(u64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use ridgefs_common::PartitionId;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> RowStore {
        let config = StoreConfig {
            data_dir: dir.path().to_path_buf(),
            partition_id: PartitionId::new(1),
        };
        RowStore::open(&config).unwrap()
    }

    #[test]
    fn test_replay_guard_predicate() {
        assert!(!AppliedIndexLedger::already_applied(None, LogIndex::new(0)));
        assert!(AppliedIndexLedger::already_applied(
            Some(LogIndex::new(5)),
            LogIndex::new(5)
        ));
        assert!(AppliedIndexLedger::already_applied(
            Some(LogIndex::new(5)),
            LogIndex::new(4)
        ));
        assert!(!AppliedIndexLedger::already_applied(
            Some(LogIndex::new(5)),
            LogIndex::new(6)
        ));
    }

    #[test]
    fn test_record_and_reload() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let ledger = AppliedIndexLedger::load(&store).unwrap();
        assert_eq!(*ledger.lock(), None);

        let write_txn = store.begin_write().unwrap();
        {
            let mut table = write_txn.open_table(store.meta()).unwrap();
            AppliedIndexLedger::record(&mut table, LogIndex::new(17)).unwrap();
        }
        write_txn.commit().unwrap();

        let reloaded = AppliedIndexLedger::load(&store).unwrap();
        assert_eq!(*reloaded.lock(), Some(LogIndex::new(17)));
    }

    #[test]
    fn test_corrupt_index_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let write_txn = store.begin_write().unwrap();
        {
            let mut table = write_txn.open_table(store.meta()).unwrap();
            table.insert(APPLIED_INDEX_KEY, [1u8, 2, 3].as_slice()).unwrap();
        }
        write_txn.commit().unwrap();

        assert!(matches!(
            AppliedIndexLedger::load(&store),
            Err(MetaStoreError::Corrupt { .. })
        ));
    }
}
