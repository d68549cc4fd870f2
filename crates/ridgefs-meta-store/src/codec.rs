//! Composite key codec for dentry rows.
//!
//! Every stored row is keyed by logical identity plus version id:
//!
//! ```text
//! [fs_id: u32 BE][parent: u64 BE][name bytes][0x00][!version: u64 BE]
//! ```
//!
//! Under a fixed (fs_id, parent) prefix, keys sort by name ascending and
//! then by version id descending (the version is stored bitwise-inverted),
//! so a forward scan reaches the newest version of each name first. Names
//! must not contain NUL; the terminator keeps name boundaries unambiguous
//! under lexicographic byte order.

use crate::store::{MetaStoreError, MetaStoreResult};
use ridgefs_common::{FsId, InodeId, TxId};

/// Length of the (fs_id, parent) scan prefix.
pub const PREFIX_LEN: usize = 4 + 8;
/// Byte separating the name from the version tag.
const NAME_TERMINATOR: u8 = 0x00;
/// Shortest well-formed key: prefix, empty name, terminator, version tag.
const MIN_KEY_LEN: usize = PREFIX_LEN + 1 + 8;

/// Decoded form of a dentry row key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DentryKey {
    pub fs_id: FsId,
    pub parent_id: InodeId,
    pub name: String,
    pub tx_id: TxId,
}

/// Encode the row key for one dentry version.
pub fn encode_key(
    fs_id: FsId,
    parent_id: InodeId,
    name: &str,
    tx_id: TxId,
) -> MetaStoreResult<Vec<u8>> {
    let name_bytes = validated_name(name)?;
    let mut key = Vec::with_capacity(PREFIX_LEN + name_bytes.len() + 1 + 8);
    key.extend_from_slice(&fs_id.get().to_be_bytes());
    key.extend_from_slice(&parent_id.get().to_be_bytes());
    key.extend_from_slice(name_bytes);
    key.push(NAME_TERMINATOR);
    key.extend_from_slice(&(!tx_id.get()).to_be_bytes());
    Ok(key)
}

/// Decode a stored row key. Failure means the table holds corrupt data.
pub fn decode_key(key: &[u8]) -> MetaStoreResult<DentryKey> {
    if key.len() < MIN_KEY_LEN {
        return Err(MetaStoreError::Corrupt {
            what: "dentry key shorter than its fixed fields",
        });
    }
    let terminator = key.len() - 9;
    if key[terminator] != NAME_TERMINATOR {
        return Err(MetaStoreError::Corrupt {
            what: "dentry key missing name terminator",
        });
    }
    let name_bytes = &key[PREFIX_LEN..terminator];
    if name_bytes.contains(&NAME_TERMINATOR) {
        return Err(MetaStoreError::Corrupt {
            what: "dentry key name contains NUL",
        });
    }
    let name = std::str::from_utf8(name_bytes)
        .map_err(|_| MetaStoreError::Corrupt {
            what: "dentry key name is not valid UTF-8",
        })?
        .to_string();
    Ok(DentryKey {
        fs_id: FsId::new(be_u32(&key[0..4])),
        parent_id: InodeId::new(be_u64(&key[4..PREFIX_LEN])),
        name,
        tx_id: TxId::new(!be_u64(&key[terminator + 1..])),
    })
}

/// Scan prefix covering every row under one parent directory.
#[must_use]
pub fn parent_prefix(fs_id: FsId, parent_id: InodeId) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(PREFIX_LEN);
    prefix.extend_from_slice(&fs_id.get().to_be_bytes());
    prefix.extend_from_slice(&parent_id.get().to_be_bytes());
    prefix
}

/// Exclusive upper bound for a whole-parent scan, or `None` when the
/// prefix has no successor and the scan runs to the end of the table.
#[must_use]
pub fn parent_scan_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    for byte in end.iter_mut().rev() {
        if *byte < u8::MAX {
            *byte += 1;
            return Some(end);
        }
        *byte = 0;
    }
    None
}

/// Exclusive upper bound of one name group. Also serves as the resume
/// position for a listing cursor: strictly after every version of `name`.
pub fn after_name(fs_id: FsId, parent_id: InodeId, name: &str) -> MetaStoreResult<Vec<u8>> {
    let name_bytes = validated_name(name)?;
    let mut key = Vec::with_capacity(PREFIX_LEN + name_bytes.len() + 1);
    key.extend_from_slice(&fs_id.get().to_be_bytes());
    key.extend_from_slice(&parent_id.get().to_be_bytes());
    key.extend_from_slice(name_bytes);
    key.push(NAME_TERMINATOR + 1);
    Ok(key)
}

fn validated_name(name: &str) -> MetaStoreResult<&[u8]> {
    let bytes = name.as_bytes();
    if bytes.contains(&NAME_TERMINATOR) {
        return Err(MetaStoreError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(bytes)
}

// Callers length-check before slicing.
fn be_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_be_bytes(buf)
}

fn be_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}
