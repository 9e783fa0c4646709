//! Git blob hashing.
//!
//! Replicates `git hash-object`: SHA-1 over `"blob <size>\0"` followed by
//! the content. Symlinks are hashed over their textual target, never the
//! file they point to.

use std::fs::Metadata;
use std::path::Path;

use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;

use vcscan_core::BlobHash;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Hash an in-memory blob.
pub fn hash_blob(content: &[u8]) -> BlobHash {
    let mut hasher = blob_hasher(content.len() as u64);
    hasher.update(content);
    finish(hasher)
}

/// Hash the object at `path`, described by its `lstat` metadata.
///
/// Returns an empty string when the object cannot be read.
pub async fn hash_object(metadata: &Metadata, path: &Path) -> String {
    let hash = if metadata.file_type().is_symlink() {
        hash_symlink(path).await
    } else {
        hash_file(metadata.len(), path).await
    };
    hash.map(|h| h.to_hex()).unwrap_or_default()
}

async fn hash_symlink(path: &Path) -> Option<BlobHash> {
    let target = tokio::fs::read_link(path).await.ok()?;
    Some(hash_blob(target.as_os_str().as_encoded_bytes()))
}

async fn hash_file(size: u64, path: &Path) -> Option<BlobHash> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let mut hasher = blob_hasher(size);
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).await.ok()?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Some(finish(hasher))
}

fn blob_hasher(size: u64) -> Sha1 {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {size}\0").as_bytes());
    hasher
}

fn finish(hasher: Sha1) -> BlobHash {
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hasher.finalize());
    BlobHash::new(bytes)
}
