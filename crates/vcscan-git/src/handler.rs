//! The git handler service object.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use dashmap::DashMap;

use vcscan_core::VcsConfig;

use crate::cli::GitCli;
use crate::hash;
use crate::lock::KeyedLock;
use crate::profile::{HashProfile, HashProfiler};
use crate::submodules::SubmoduleCache;

/// Lists, hashes and fetches sources through the git executable.
///
/// One handler is meant to live for a whole session: its repository-root
/// and submodule caches, and its keyed lock, are shared by every call made
/// through it. Scan methods live in `scanner.rs`, remote source methods in
/// `remote.rs` and repository queries in `repo.rs`.
#[derive(Debug)]
pub struct GitHandler {
    pub(crate) config: VcsConfig,
    pub(crate) lock: KeyedLock,
    pub(crate) repo_roots: DashMap<PathBuf, PathBuf>,
    pub(crate) submodules: SubmoduleCache,
    profiler: HashProfiler,
}

impl GitHandler {
    /// Create a handler.
    pub fn new(config: VcsConfig) -> Self {
        Self {
            config,
            lock: KeyedLock::new(),
            repo_roots: DashMap::new(),
            submodules: SubmoduleCache::new(),
            profiler: HashProfiler::new(),
        }
    }

    /// The handler's configuration.
    pub fn config(&self) -> &VcsConfig {
        &self.config
    }

    /// Hash an object the way git does (see [`hash::hash_object`]), recording
    /// the time spent. An empty string means the object could not be hashed.
    pub async fn hash_object(&self, metadata: &Metadata, path: &Path) -> String {
        self.profiler.time(hash::hash_object(metadata, path)).await
    }

    /// Hashing statistics since the handler was created.
    pub fn hash_profile(&self) -> HashProfile {
        self.profiler.snapshot()
    }

    pub(crate) fn git(&self, cwd: impl Into<PathBuf>, fail_on_prompt: bool) -> GitCli {
        GitCli::new(&self.config, cwd, fail_on_prompt)
    }
}

impl Default for GitHandler {
    fn default() -> Self {
        Self::new(VcsConfig::default())
    }
}
