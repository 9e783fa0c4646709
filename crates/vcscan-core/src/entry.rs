//! Scanned file entries and repository metadata.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File mode the list command reports for symbolic links.
pub const SYMLINK_MODE: &str = "120000";

/// SHA-1 blob hash, computed the way git hashes object contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobHash(pub [u8; 20]);

impl BlobHash {
    /// Create a new BlobHash from raw bytes.
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a 40-digit hex string.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 40 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 20];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl std::fmt::Display for BlobHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A file found by a scan.
///
/// `hash` is the 40-hex-digit blob hash, or an empty string when the file
/// could not be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Content hash (empty = unknown).
    pub hash: String,
    /// File mode as reported by the list command (tracked files only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl FileEntry {
    /// Create a new entry.
    pub fn new(path: impl Into<PathBuf>, hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
            mode: None,
        }
    }

    /// Attach a file mode.
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// Whether the entry carries a usable hash.
    pub fn has_hash(&self) -> bool {
        !self.hash.is_empty()
    }

    /// Whether the list command reported this entry as a symlink.
    pub fn is_symlink(&self) -> bool {
        self.mode.as_deref() == Some(SYMLINK_MODE)
    }
}

/// A submodule declared in a repository's `.gitmodules` file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Submodule {
    /// Path relative to the repository root.
    pub path: String,
    /// Remote URL.
    pub url: String,
}

/// Branch, commit and origin of a working tree.
///
/// Fields are empty strings when the repository has no commits yet or no
/// origin remote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathInfo {
    pub branch: String,
    pub commit_hash: String,
    pub origin_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_hash_hex_roundtrip() {
        let hex = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";
        let hash = BlobHash::from_hex(hex).unwrap();
        assert_eq!(hash.to_hex(), hex);
        assert_eq!(hash.to_string(), hex);
    }

    #[test]
    fn test_blob_hash_rejects_bad_hex() {
        assert!(BlobHash::from_hex("abc").is_none());
        assert!(BlobHash::from_hex(&"z".repeat(40)).is_none());
    }

    #[test]
    fn test_symlink_mode() {
        let entry = FileEntry::new("/repo/link", "").with_mode(SYMLINK_MODE);
        assert!(entry.is_symlink());
        assert!(!entry.has_hash());
        assert!(!FileEntry::new("/repo/file", "abc").is_symlink());
    }
}
