//! Core type definitions for RidgeFS
//!
//! This module defines the fundamental identifiers shared by the metadata
//! server components: filesystems, inodes, transaction versions, and the
//! replicated-log positions that drive state machine application.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Unique identifier for a filesystem
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From, Into,
    Display,
)]
#[display("{_0}")]
pub struct FsId(u32);

impl FsId {
    /// Create from a raw filesystem id
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw filesystem id
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Unique identifier for an inode within a filesystem
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From, Into,
    Display,
)]
#[display("{_0}")]
pub struct InodeId(u64);

impl InodeId {
    /// Create from a raw inode number
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw inode number
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Transaction id, also used as the version id of a stored row
///
/// Version ids are assigned by the transaction coordinator and increase
/// monotonically per partition; a read at version `v` observes the newest
/// row with id at most `v`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From, Into,
    Display,
)]
#[display("{_0}")]
pub struct TxId(u64);

impl TxId {
    /// Create from a raw transaction id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw transaction id
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Position of a request in the replicated log
///
/// Every mutating request carries the log index it was committed at;
/// storage uses it to drop re-delivered requests during replay.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From, Into,
    Display,
)]
#[display("{_0}")]
pub struct LogIndex(u64);

impl LogIndex {
    /// Create from a raw log index
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Get the raw log index
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Unique identifier for a metadata partition
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, From, Into,
    Display,
)]
#[display("{_0}")]
pub struct PartitionId(u32);

impl PartitionId {
    /// Create from a raw partition id
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw partition id
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Type of the filesystem object a directory entry points to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// Regular file
    #[default]
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
}

impl FileType {
    /// Check if this is a directory
    #[must_use]
    pub const fn is_directory(self) -> bool {
        matches!(self, Self::Directory)
    }
}
