//! Stored types for dentry persistence.
//!
//! Rows are serialized with bincode. The value carries the full dentry,
//! key fields included, so scans can materialize entries without
//! re-deriving them from the row key.

use ridgefs_common::{FileType, FsId, InodeId, TxId};
use serde::{Deserialize, Serialize};

/// Row flag distinguishing live entries from delete marks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DentryFlag {
    /// Live entry
    #[default]
    Normal,
    /// Delete mark: the logical key is absent as of this row's version id
    Tombstone,
}

impl DentryFlag {
    /// Check if this is a delete mark
    #[must_use]
    pub const fn is_tombstone(self) -> bool {
        matches!(self, Self::Tombstone)
    }
}

/// One stored version of a directory entry.
///
/// The logical key is (`fs_id`, `parent_id`, `name`); `tx_id` is the
/// version id of this row within that key's version chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dentry {
    pub fs_id: FsId,
    pub parent_id: InodeId,
    pub name: String,
    /// Version id; for staged rows this is the staging transaction id
    pub tx_id: TxId,
    pub inode_id: InodeId,
    pub file_type: FileType,
    pub flag: DentryFlag,
}

impl Dentry {
    /// Whether `other` names the same entity under the same logical key,
    /// irrespective of version id and flag.
    #[must_use]
    pub fn same_entity(&self, other: &Self) -> bool {
        self.fs_id == other.fs_id
            && self.parent_id == other.parent_id
            && self.name == other.name
            && self.inode_id == other.inode_id
            && self.file_type == other.file_type
    }

    /// Check if this row is a delete mark
    #[must_use]
    pub const fn is_tombstone(&self) -> bool {
        self.flag.is_tombstone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dentry {
        Dentry {
            fs_id: FsId::new(1),
            parent_id: InodeId::new(2),
            name: "notes.txt".to_string(),
            tx_id: TxId::new(3),
            inode_id: InodeId::new(4),
            file_type: FileType::File,
            flag: DentryFlag::Normal,
        }
    }

    #[test]
    fn test_bincode_roundtrip() {
        let dentry = sample();
        let bytes = bincode::serialize(&dentry).unwrap();
        let decoded: Dentry = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, dentry);
    }

    #[test]
    fn test_same_entity_ignores_version_and_flag() {
        let a = sample();
        let mut b = sample();
        b.tx_id = TxId::new(9);
        b.flag = DentryFlag::Tombstone;
        assert!(a.same_entity(&b));

        let mut c = sample();
        c.inode_id = InodeId::new(5);
        assert!(!a.same_entity(&c));

        let mut d = sample();
        d.file_type = FileType::Directory;
        assert!(!a.same_entity(&d));
    }
}
