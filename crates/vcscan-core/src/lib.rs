//! Core types and traits for vcscan.
//!
//! This crate provides the fundamental data structures used throughout
//! the vcscan ecosystem: scanned file entries, scan requests, remote source
//! references, configuration and the error taxonomy.

mod config;
mod entry;
mod error;
mod remote;
mod request;

pub use config::{VcsConfig, VcsConfigBuilder};
pub use entry::{BlobHash, FileEntry, PathInfo, Submodule, SYMLINK_MODE};
pub use error::{Result, VcsError};
pub use remote::{RemoteSourceRef, SourceKind, is_sha1};
pub use request::{PathFilter, ScanRequest, ScanRequestBuilder};
