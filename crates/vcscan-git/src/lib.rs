//! Git-aware file scanning engine for vcscan.
//!
//! This crate lists and hashes the files of a working tree by driving the
//! `git` executable, and manages shallow checkouts of remote sources.
//!
//! # Overview
//!
//! `vcscan-git` is built around [`GitHandler`], a long-lived service object
//! that owns the caches and locks shared by every call. Key features:
//!
//! - **Streaming listing** of `git ls-files` output with a bounded hashing queue
//! - **Git-compatible hashes** for untracked, modified and symlinked files
//! - **Submodule recursion** with the parent's filters carried over
//! - **Symlink safety**: links out of the scanned directory are never followed
//! - **Remote sources** cloned once and updated on demand under a keyed lock
//!
//! # Example
//!
//! ```rust,no_run
//! use vcscan_git::{GitHandler, ScanRequest, VcsConfig};
//!
//! # async fn run() -> vcscan_git::Result<()> {
//! let handler = GitHandler::new(VcsConfig::new("/path/to/project"));
//! let request = ScanRequest::builder()
//!     .path("/path/to/project/src")
//!     .exclude(vec!["*.log".to_string()])
//!     .build()
//!     .expect("valid request");
//!
//! for file in handler.get_files(&request).await? {
//!     println!("{} {}", file.hash, file.path.display());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Remote Sources
//!
//! ```rust,no_run
//! use vcscan_git::{GitHandler, SourceKind, VcsConfig};
//!
//! # async fn run() -> vcscan_git::Result<()> {
//! let handler = GitHandler::new(VcsConfig::new("/path/to/project"));
//! let url = "https://github.com/org/repo.git#main";
//!
//! let path = handler
//!     .ensure_remote_source(url, "repo", SourceKind::Project, true)
//!     .await?;
//! handler
//!     .update_remote_source(url, "repo", SourceKind::Project, true)
//!     .await?;
//! println!("Checked out at {}", path.display());
//! # Ok(())
//! # }
//! ```

mod cli;
mod filters;
mod handler;
mod hash;
mod lock;
mod parse;
mod profile;
mod remote;
mod repo;
mod scanner;
mod submodules;

pub use cli::{GitCli, split_lines, split_nul};
pub use filters::{IncludeExclude, MATCH_ALL, PathMatcher, augment_globs, is_glob};
pub use handler::GitHandler;
pub use hash::{hash_blob, hash_object};
pub use lock::KeyedLock;
pub use parse::{GITLINK_MODE, ListedEntry, commit_id_from_ref_list, parse_record, remote_ref_patterns};
pub use profile::{HashProfile, HashProfiler};
pub use repo::{GIT_FATAL_EXIT, explain_git_error};
pub use submodules::{GITMODULES, SubmoduleCache, parse_gitmodules};

// Re-export core types for convenience
pub use vcscan_core::{
    BlobHash, FileEntry, PathFilter, PathInfo, RemoteSourceRef, Result, ScanRequest, SourceKind,
    Submodule, VcsConfig, VcsError, is_sha1,
};
