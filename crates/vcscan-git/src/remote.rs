//! Remote source checkouts.
//!
//! Remote sources are cloned shallowly into
//! `<state_dir>/sources/<kind>/<name>--<url digest>`. Every operation on a
//! given source runs under the keyed lock `remote-source-<kind>-<name>`, so
//! concurrent callers never race on the same checkout.

use std::path::PathBuf;

use sha1::{Digest, Sha1};
use tracing::{debug, info};

use vcscan_core::{RemoteSourceRef, Result, SourceKind, VcsError};

use crate::cli::GitCli;
use crate::handler::GitHandler;
use crate::parse::{commit_id_from_ref_list, remote_ref_patterns};

/// Hex digits of the URL digest used in checkout directory names.
const URL_DIGEST_LEN: usize = 10;

/// Allows local `file://` remotes and submodules, which newer git versions
/// reject by default.
const ALLOW_FILE_PROTOCOL: [&str; 2] = ["-c", "protocol.file.allow=always"];

const SHA_FETCH_HINT: &str = "Make sure both git client and server are newer than 2.5.0 \
    and that `uploadpack.allowReachableSHA1InWant=true` is set on the server";

impl GitHandler {
    /// Local checkout directory of a remote source.
    pub fn remote_source_path(&self, name: &str, url: &str, kind: SourceKind) -> PathBuf {
        let digest = format!("{:x}", Sha1::digest(url.as_bytes()));
        self.config
            .remote_sources_dir()
            .join(kind.as_str())
            .join(format!("{name}--{}", &digest[..URL_DIGEST_LEN]))
    }

    /// Make sure the remote source `url` (`<repository>#<ref>`) is checked
    /// out locally, cloning it on first use. Returns the checkout directory.
    ///
    /// An existing checkout is returned as is; use
    /// [`update_remote_source`](Self::update_remote_source) to refresh it.
    pub async fn ensure_remote_source(
        &self,
        url: &str,
        name: &str,
        kind: SourceKind,
        fail_on_prompt: bool,
    ) -> Result<PathBuf> {
        let source = RemoteSourceRef::parse(url)?;
        let path = self.remote_source_path(name, url, kind);
        let key = lock_key(kind, name);

        self.lock
            .acquire(&key, || async move {
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    debug!(path = %path.display(), "Remote {kind} {name} already checked out");
                    return Ok(path);
                }

                info!(url = %source.repository_url, git_ref = %source.git_ref, "Fetching remote {kind} {name}");
                tokio::fs::create_dir_all(&path)
                    .await
                    .map_err(|e| VcsError::io(&path, e))?;

                let git = self.git(&path, fail_on_prompt);
                let result = if source.is_commit() {
                    fetch_commit(&git, &source).await.map_err(|e| {
                        VcsError::runtime(format!(
                            "Downloading remote {kind} at commit {} (from {}) failed with error: \n\n{e}\n\n{SHA_FETCH_HINT}",
                            source.git_ref, source.repository_url
                        ))
                    })
                } else {
                    clone(&git, &source).await.map_err(|e| {
                        VcsError::runtime(format!(
                            "Downloading remote {kind} (from {}) failed with error: \n\n{e}",
                            source.repository_url
                        ))
                    })
                };

                if let Err(e) = result {
                    if let Err(cleanup) = tokio::fs::remove_dir_all(&path).await {
                        debug!(path = %path.display(), error = %cleanup, "Could not remove failed checkout");
                    }
                    return Err(e);
                }

                info!(path = %path.display(), "Fetched remote {kind} {name}");
                Ok(path)
            })
            .await
    }

    /// Bring the checkout of remote source `url` up to date with its ref,
    /// cloning it first if needed. A checkout that already matches the
    /// remote commit is left untouched.
    pub async fn update_remote_source(
        &self,
        url: &str,
        name: &str,
        kind: SourceKind,
        fail_on_prompt: bool,
    ) -> Result<()> {
        let source = RemoteSourceRef::parse(url)?;
        let path = self
            .ensure_remote_source(url, name, kind, fail_on_prompt)
            .await?;
        let key = lock_key(kind, name);

        self.lock
            .acquire(&key, || async move {
                let git = self.git(&path, fail_on_prompt);
                update(&git, &source, &format!("{kind} {name}"))
                    .await
                    .map_err(|e| {
                        VcsError::runtime(format!(
                            "Updating remote {kind} at {} failed with error: \n\n{e}",
                            source.repository_url
                        ))
                    })
            })
            .await
    }
}

fn lock_key(kind: SourceKind, name: &str) -> String {
    format!("remote-source-{kind}-{name}")
}

fn with_file_protocol<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut full = ALLOW_FILE_PROTOCOL.to_vec();
    full.extend_from_slice(args);
    full
}

async fn clone(git: &GitCli, source: &RemoteSourceRef) -> Result<()> {
    let branch = format!("--branch={}", source.git_ref);
    git.run(&with_file_protocol(&[
        "clone",
        "--recursive",
        "--depth=1",
        "--shallow-submodules",
        &branch,
        &source.repository_url,
        ".",
    ]))
    .await?;
    Ok(())
}

/// Check out an exact commit. `clone --branch` only accepts branch and tag
/// names, so the commit is fetched into an empty repository instead.
async fn fetch_commit(git: &GitCli, source: &RemoteSourceRef) -> Result<()> {
    git.run(&["init"]).await?;
    git.run(&["remote", "add", "origin", &source.repository_url])
        .await?;
    git.run(&with_file_protocol(&[
        "fetch",
        "--depth=1",
        "--recurse-submodules=yes",
        "origin",
        &source.git_ref,
    ]))
    .await?;
    git.run(&["checkout", "FETCH_HEAD"]).await?;
    git.run(&with_file_protocol(&[
        "submodule",
        "update",
        "--init",
        "--recursive",
    ]))
    .await?;
    Ok(())
}

/// Bring a checkout to the current commit of its ref. Only `rev-parse` and
/// `ls-remote` run when the checkout is already current.
async fn update(git: &GitCli, source: &RemoteSourceRef, label: &str) -> Result<()> {
    let local_commit = git
        .run(&["rev-parse", "HEAD"])
        .await?
        .into_iter()
        .next()
        .unwrap_or_default();

    let remote_commit = if source.is_commit() {
        source.git_ref.clone()
    } else {
        let [head, tag, peeled] = remote_ref_patterns(&source.git_ref);
        let refs = git
            .run(&["ls-remote", &source.repository_url, &head, &tag, &peeled])
            .await?;
        commit_id_from_ref_list(&refs, &source.git_ref).ok_or_else(|| {
            VcsError::runtime(format!(
                "Could not find ref '{}' in {}",
                source.git_ref, source.repository_url
            ))
        })?
    };

    if local_commit == remote_commit {
        debug!(commit = %local_commit, "Remote {label} is up to date");
        return Ok(());
    }

    info!(from = %local_commit, to = %remote_commit, "Updating remote {label}");
    git.run(&["fetch", "--depth=1", "origin", &source.git_ref])
        .await?;
    git.run(&["reset", "--hard", "FETCH_HEAD"]).await?;
    git.run(&with_file_protocol(&["submodule", "update", "--recursive"]))
        .await?;
    Ok(())
}
