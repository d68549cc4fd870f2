//! Versioned dentry engine.
//!
//! Stores the name -> inode mapping of one metadata partition as a
//! multi-version table: each logical key (fs_id, parent, name) owns a
//! chain of rows keyed by version id, and a read at version `v` observes
//! the newest row with id at most `v`. Delete marks hide a key without
//! rewriting history; cross-partition renames stage rows first and commit
//! or roll back later.
//!
//! Mutating operations are driven by the partition's replicated-log apply
//! loop and carry their log index for replay protection. Reads run on
//! plain snapshots and never block writers.

use crate::codec;
use crate::ledger::AppliedIndexLedger;
use crate::store::{MetaStoreResult, RowStore, StoreConfig};
use crate::tables::PENDING_TX_KEY;
use crate::types::Dentry;
use redb::{ReadableTable, Table};
use ridgefs_common::{FsId, InodeId, LogIndex, TxId};
use std::ops::Bound;
use tracing::{debug, info};

/// Outcome of an engine operation. Storage, codec, and serialization
/// failures travel as `Err(MetaStoreError)` instead; callers treat those
/// as internal errors with no assumption about on-disk effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpStatus {
    /// The operation applied
    Ok,
    /// No row is visible for the target key at the requested version
    NotFound,
    /// An insert collided with a different entity on the same logical key
    Exists,
    /// Dropped: replayed log index, or an insert of an already-live entity
    IdempotentNoop,
}

type DentryTable<'txn> = Table<'txn, &'static [u8], &'static [u8]>;

/// Versioned dentry store for one metadata partition.
pub struct DentryStore {
    store: RowStore,
    ledger: AppliedIndexLedger,
}

impl DentryStore {
    /// Open the partition's database and load its applied-index ledger.
    pub fn open(config: &StoreConfig) -> MetaStoreResult<Self> {
        let store = RowStore::open(config)?;
        let ledger = AppliedIndexLedger::load(&store)?;
        info!(
            partition = %config.partition_id,
            data_dir = %config.data_dir.display(),
            "dentry store opened"
        );
        Ok(Self { store, ledger })
    }

    /// Insert a dentry at its version id.
    ///
    /// Re-inserting the entity already visible at that version reports
    /// `IdempotentNoop`; a different entity under the same logical key
    /// reports `Exists` and writes nothing new.
    pub fn insert(&self, dentry: &Dentry, index: LogIndex) -> MetaStoreResult<OpStatus> {
        let mut applied = self.ledger.lock();
        if AppliedIndexLedger::already_applied(*applied, index) {
            return Ok(OpStatus::IdempotentNoop);
        }
        let write_txn = self.store.begin_write()?;
        let status;
        {
            let mut table = write_txn.open_table(self.store.dentries())?;
            status = match find_visible_compress(
                &mut table,
                dentry.fs_id,
                dentry.parent_id,
                &dentry.name,
                dentry.tx_id,
            )? {
                Some(found) if found.same_entity(dentry) => OpStatus::IdempotentNoop,
                Some(_) => OpStatus::Exists,
                None => {
                    let key = codec::encode_key(
                        dentry.fs_id,
                        dentry.parent_id,
                        &dentry.name,
                        dentry.tx_id,
                    )?;
                    table.insert(key.as_slice(), bincode::serialize(dentry)?.as_slice())?;
                    OpStatus::Ok
                }
            };
            let mut meta = write_txn.open_table(self.store.meta())?;
            AppliedIndexLedger::record(&mut meta, index)?;
        }
        write_txn.commit()?;
        *applied = Some(index);
        Ok(status)
    }

    /// Delete the dentry visible at the request's version id.
    ///
    /// The row removed is whichever version a read at `dentry.tx_id` would
    /// observe; rows staged above that version are left in place.
    pub fn delete(&self, dentry: &Dentry, index: LogIndex) -> MetaStoreResult<OpStatus> {
        let mut applied = self.ledger.lock();
        if AppliedIndexLedger::already_applied(*applied, index) {
            return Ok(OpStatus::IdempotentNoop);
        }
        let write_txn = self.store.begin_write()?;
        let status;
        {
            let mut table = write_txn.open_table(self.store.dentries())?;
            status = match find_visible_compress(
                &mut table,
                dentry.fs_id,
                dentry.parent_id,
                &dentry.name,
                dentry.tx_id,
            )? {
                Some(found) => {
                    let key = codec::encode_key(
                        found.fs_id,
                        found.parent_id,
                        &found.name,
                        found.tx_id,
                    )?;
                    table.remove(key.as_slice())?;
                    OpStatus::Ok
                }
                None => OpStatus::NotFound,
            };
            let mut meta = write_txn.open_table(self.store.meta())?;
            AppliedIndexLedger::record(&mut meta, index)?;
        }
        write_txn.commit()?;
        *applied = Some(index);
        Ok(status)
    }

    /// Look up the dentry visible at `read_version`. A delete mark, or the
    /// absence of any row at or below that version, reads as `None`.
    pub fn get(
        &self,
        fs_id: FsId,
        parent_id: InodeId,
        name: &str,
        read_version: TxId,
    ) -> MetaStoreResult<Option<Dentry>> {
        let read_txn = self.store.begin_read()?;
        let table = read_txn.open_table(self.store.dentries())?;
        visible_row(&table, fs_id, parent_id, name, read_version)
    }

    /// List the entries of one directory visible at `read_version`, in
    /// ascending name order.
    ///
    /// `start_after` resumes a paginated listing strictly after that name;
    /// `limit` caps the result count after delete marks and the
    /// `directories_only` filter are applied.
    pub fn list(
        &self,
        fs_id: FsId,
        parent_id: InodeId,
        start_after: Option<&str>,
        read_version: TxId,
        limit: Option<usize>,
        directories_only: bool,
    ) -> MetaStoreResult<Vec<Dentry>> {
        let read_txn = self.store.begin_read()?;
        let table = read_txn.open_table(self.store.dentries())?;

        let prefix = codec::parent_prefix(fs_id, parent_id);
        let start = match start_after {
            Some(name) if !name.is_empty() => codec::after_name(fs_id, parent_id, name)?,
            _ => prefix.clone(),
        };
        let end = codec::parent_scan_end(&prefix);
        let upper = match end.as_deref() {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };

        let mut entries = Vec::new();
        // Name group already decided, visible or not
        let mut resolved: Option<String> = None;
        for row in table.range::<&[u8]>((Bound::Included(start.as_slice()), upper))? {
            if limit.is_some_and(|n| entries.len() >= n) {
                break;
            }
            let (key, value) = row?;
            let decoded = codec::decode_key(key.value())?;
            if resolved.as_deref() == Some(decoded.name.as_str()) {
                continue;
            }
            if decoded.tx_id > read_version {
                // Staged above the read version; the group's visible row
                // may still follow
                continue;
            }
            resolved = Some(decoded.name);
            let dentry: Dentry = bincode::deserialize(value.value())?;
            if dentry.is_tombstone() {
                continue;
            }
            if directories_only && !dentry.file_type.is_directory() {
                continue;
            }
            entries.push(dentry);
        }
        Ok(entries)
    }

    /// Stage the rows of a distributed transaction and persist its opaque
    /// coordinator payload.
    ///
    /// Staged rows sit in the version chains above the transaction's read
    /// version, invisible to readers until committed. Re-delivery with the
    /// same rows overwrites in place.
    pub fn prepare_tx(
        &self,
        dentries: &[Dentry],
        payload: &[u8],
        index: LogIndex,
    ) -> MetaStoreResult<OpStatus> {
        let mut applied = self.ledger.lock();
        if AppliedIndexLedger::already_applied(*applied, index) {
            return Ok(OpStatus::IdempotentNoop);
        }
        let write_txn = self.store.begin_write()?;
        {
            let mut table = write_txn.open_table(self.store.dentries())?;
            for dentry in dentries {
                let key = codec::encode_key(
                    dentry.fs_id,
                    dentry.parent_id,
                    &dentry.name,
                    dentry.tx_id,
                )?;
                table.insert(key.as_slice(), bincode::serialize(dentry)?.as_slice())?;
            }
            let mut meta = write_txn.open_table(self.store.meta())?;
            meta.insert(PENDING_TX_KEY, payload)?;
            AppliedIndexLedger::record(&mut meta, index)?;
        }
        write_txn.commit()?;
        *applied = Some(index);
        debug!(rows = dentries.len(), log_index = %index, "transaction staged");
        Ok(OpStatus::Ok)
    }

    /// Commit previously staged rows: drop every older version they
    /// supersede and delete the pending-transaction record.
    ///
    /// The whole batch is validated first; if any row was never staged the
    /// commit reports `NotFound` and removes nothing. A staged delete mark
    /// erases its chain entirely, the mark included. Only the key fields of
    /// the request rows are consulted; flags come from the stored rows.
    pub fn commit_tx(&self, dentries: &[Dentry], index: LogIndex) -> MetaStoreResult<OpStatus> {
        let mut applied = self.ledger.lock();
        if AppliedIndexLedger::already_applied(*applied, index) {
            return Ok(OpStatus::IdempotentNoop);
        }
        let write_txn = self.store.begin_write()?;
        let status;
        {
            let mut table = write_txn.open_table(self.store.dentries())?;
            status = commit_rows(&mut table, dentries)?;
            let mut meta = write_txn.open_table(self.store.meta())?;
            if status == OpStatus::Ok {
                meta.remove(PENDING_TX_KEY)?;
            }
            AppliedIndexLedger::record(&mut meta, index)?;
        }
        write_txn.commit()?;
        *applied = Some(index);
        Ok(status)
    }

    /// Roll back previously staged rows: remove exactly those rows and
    /// delete the pending-transaction record. Committed history is left
    /// untouched.
    ///
    /// Validated the same way as [`Self::commit_tx`]: a row that was never
    /// staged fails the whole batch with `NotFound` and removes nothing.
    pub fn rollback_tx(&self, dentries: &[Dentry], index: LogIndex) -> MetaStoreResult<OpStatus> {
        let mut applied = self.ledger.lock();
        if AppliedIndexLedger::already_applied(*applied, index) {
            return Ok(OpStatus::IdempotentNoop);
        }
        let write_txn = self.store.begin_write()?;
        let status;
        {
            let mut table = write_txn.open_table(self.store.dentries())?;
            status = rollback_rows(&mut table, dentries)?;
            let mut meta = write_txn.open_table(self.store.meta())?;
            if status == OpStatus::Ok {
                meta.remove(PENDING_TX_KEY)?;
            }
            AppliedIndexLedger::record(&mut meta, index)?;
        }
        write_txn.commit()?;
        *applied = Some(index);
        Ok(status)
    }

    /// Drop every dentry row and the pending-transaction record.
    ///
    /// The applied-index ledger is preserved: a clear changes the stored
    /// rows, not the partition's position in the replicated log.
    pub fn clear(&self) -> MetaStoreResult<()> {
        let write_txn = self.store.begin_write()?;
        {
            write_txn.delete_table(self.store.dentries())?;
            let _t = write_txn.open_table(self.store.dentries())?;
            let mut meta = write_txn.open_table(self.store.meta())?;
            meta.remove(PENDING_TX_KEY)?;
        }
        write_txn.commit()?;
        info!("dentry table cleared");
        Ok(())
    }

    /// Number of physical rows, staged and delete-mark rows included.
    pub fn size(&self) -> MetaStoreResult<u64> {
        self.store.row_count()
    }

    /// Payload of the staged transaction, if one is pending.
    pub fn pending_tx(&self) -> MetaStoreResult<Option<Vec<u8>>> {
        let read_txn = self.store.begin_read()?;
        let table = read_txn.open_table(self.store.meta())?;
        Ok(table.get(PENDING_TX_KEY)?.map(|v| v.value().to_vec()))
    }
}

/// Load one name group's rows with version id at most `read_version`,
/// newest first.
fn load_chain(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
    fs_id: FsId,
    parent_id: InodeId,
    name: &str,
    read_version: TxId,
) -> MetaStoreResult<Vec<(Vec<u8>, Dentry)>> {
    let start = codec::encode_key(fs_id, parent_id, name, read_version)?;
    let end = codec::after_name(fs_id, parent_id, name)?;
    let mut rows = Vec::new();
    for row in table.range(start.as_slice()..end.as_slice())? {
        let (key, value) = row?;
        let dentry: Dentry = bincode::deserialize(value.value())?;
        rows.push((key.value().to_vec(), dentry));
    }
    Ok(rows)
}

/// Read-only visibility lookup: newest row at or below `read_version`,
/// with delete marks reading as absent.
fn visible_row(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
    fs_id: FsId,
    parent_id: InodeId,
    name: &str,
    read_version: TxId,
) -> MetaStoreResult<Option<Dentry>> {
    let start = codec::encode_key(fs_id, parent_id, name, read_version)?;
    let end = codec::after_name(fs_id, parent_id, name)?;
    let mut rows = table.range(start.as_slice()..end.as_slice())?;
    let Some(row) = rows.next() else {
        return Ok(None);
    };
    let (_, value) = row?;
    let dentry: Dentry = bincode::deserialize(value.value())?;
    if dentry.is_tombstone() {
        return Ok(None);
    }
    Ok(Some(dentry))
}

/// Write-path visibility lookup with chain compression.
///
/// Locates the row a read at `read_version` would observe and removes the
/// strictly older rows it supersedes. A visible delete mark reclaims its
/// whole chain, the mark included, and reports the key absent. Rows above
/// `read_version` are never touched.
fn find_visible_compress(
    table: &mut DentryTable<'_>,
    fs_id: FsId,
    parent_id: InodeId,
    name: &str,
    read_version: TxId,
) -> MetaStoreResult<Option<Dentry>> {
    let chain = load_chain(&*table, fs_id, parent_id, name, read_version)?;
    let Some((_, visible)) = chain.first() else {
        return Ok(None);
    };
    let visible = visible.clone();
    if visible.is_tombstone() {
        for (key, _) in &chain {
            table.remove(key.as_slice())?;
        }
        debug!(
            %fs_id,
            parent = %parent_id,
            name = %name,
            purged = chain.len(),
            "tombstoned chain reclaimed"
        );
        return Ok(None);
    }
    for (key, _) in &chain[1..] {
        table.remove(key.as_slice())?;
    }
    Ok(Some(visible))
}

fn commit_rows(table: &mut DentryTable<'_>, dentries: &[Dentry]) -> MetaStoreResult<OpStatus> {
    // Validate the whole batch before removing anything
    let mut staged = Vec::with_capacity(dentries.len());
    for dentry in dentries {
        let key = codec::encode_key(dentry.fs_id, dentry.parent_id, &dentry.name, dentry.tx_id)?;
        let end = codec::after_name(dentry.fs_id, dentry.parent_id, &dentry.name)?;
        let Some(row) = table.get(key.as_slice())? else {
            return Ok(OpStatus::NotFound);
        };
        let stored: Dentry = bincode::deserialize(row.value())?;
        staged.push((key, end, stored.is_tombstone()));
    }
    for (key, end, is_tombstone) in staged {
        // Rows strictly older than the committed version
        let mut superseded = Vec::new();
        for row in table.range::<&[u8]>((
            Bound::Excluded(key.as_slice()),
            Bound::Excluded(end.as_slice()),
        ))? {
            let (k, _) = row?;
            superseded.push(k.value().to_vec());
        }
        for k in &superseded {
            table.remove(k.as_slice())?;
        }
        if is_tombstone {
            table.remove(key.as_slice())?;
        }
    }
    Ok(OpStatus::Ok)
}

fn rollback_rows(table: &mut DentryTable<'_>, dentries: &[Dentry]) -> MetaStoreResult<OpStatus> {
    let mut staged = Vec::with_capacity(dentries.len());
    for dentry in dentries {
        let key = codec::encode_key(dentry.fs_id, dentry.parent_id, &dentry.name, dentry.tx_id)?;
        if table.get(key.as_slice())?.is_none() {
            return Ok(OpStatus::NotFound);
        }
        staged.push(key);
    }
    for key in &staged {
        table.remove(key.as_slice())?;
    }
    Ok(OpStatus::Ok)
}
