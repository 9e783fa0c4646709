//! Streaming, git-aware file scanner.

use std::collections::HashSet;
use std::fs::Metadata;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use futures::future::{BoxFuture, try_join_all};
use futures::{StreamExt, TryStreamExt};
use tokio_util::codec::AnyDelimiterCodecError;
use tracing::{debug, trace, warn};

use vcscan_core::{FileEntry, PathFilter, Result, ScanRequest, VcsError};

use crate::filters::{IncludeExclude, PathMatcher};
use crate::handler::GitHandler;
use crate::parse::parse_record;
use crate::repo::GIT_FATAL_EXIT;

/// Per-scan state shared by every listed entry.
struct ScanContext<'a> {
    handler: &'a GitHandler,
    request: &'a ScanRequest,
    /// Canonical scan root.
    root: &'a Path,
    modified: HashSet<PathBuf>,
    tracked_but_ignored: HashSet<String>,
    submodule_paths: HashSet<PathBuf>,
    exclude_matcher: PathMatcher,
}

impl GitHandler {
    /// List and hash every file under `request.path` that git knows about or
    /// would pick up, respecting ignore files, the request's filters and
    /// declared submodules.
    ///
    /// The result holds one entry per path, sorted by path.
    pub async fn get_files(&self, request: &ScanRequest) -> Result<Vec<FileEntry>> {
        let mut files = self.scan(request.clone()).await?;

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);

        debug!(
            path = %request.path.display(),
            files = files.len(),
            "Scan complete"
        );
        Ok(files)
    }

    fn scan(&self, request: ScanRequest) -> BoxFuture<'_, Result<Vec<FileEntry>>> {
        Box::pin(async move { self.scan_directory(&request).await })
    }

    async fn scan_directory(&self, request: &ScanRequest) -> Result<Vec<FileEntry>> {
        if request.include.as_ref().is_some_and(Vec::is_empty) {
            trace!(path = %request.path.display(), "Empty include list, nothing to scan");
            return Ok(Vec::new());
        }

        let description = &request.path_description;
        let root = match tokio::fs::metadata(&request.path).await {
            Ok(m) if m.is_dir() => tokio::fs::canonicalize(&request.path)
                .await
                .map_err(|e| VcsError::io(&request.path, e))?,
            Ok(_) => {
                warn!(
                    path = %request.path.display(),
                    "Expected {description} to be a directory, skipping"
                );
                return Ok(Vec::new());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(
                    path = %request.path.display(),
                    "Could not find {description}, skipping"
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(VcsError::io(&request.path, e)),
        };

        let filters = IncludeExclude::resolve(
            &root,
            request.include.as_deref(),
            &request.exclude,
            &self.config.state_dir_name(),
        )
        .await;
        debug!(
            path = %root.display(),
            include = ?filters.include,
            exclude = ?filters.exclude,
            "Scanning {description}"
        );

        let git = self.git(&root, request.fail_on_prompt);
        let repo_root = self.get_repo_root(&root, request.fail_on_prompt).await?;
        let modified = self.get_modified_files(&git, &repo_root).await?;

        let mut common_args: Vec<&str> = vec!["--cached"];
        if !filters.has_includes {
            for pattern in &filters.exclude {
                common_args.push("--exclude");
                common_args.push(pattern);
            }
        }
        if let Some(ignore_file) = self.config.ignore_file_name() {
            common_args.push("--exclude-per-directory");
            common_args.push(ignore_file);
        }

        let tracked_but_ignored = match self.config.ignore_file_name() {
            Some(_) => {
                let mut args = vec!["ls-files", "-z", "--ignored"];
                args.extend_from_slice(&common_args);
                git.run_nul(&args).await?.into_iter().collect()
            }
            None => HashSet::new(),
        };

        let submodules = self.submodules.get(&repo_root).await?;
        let submodule_paths: HashSet<PathBuf> = submodules
            .iter()
            .map(|s| repo_root.join(&s.path))
            .collect();

        let mut list_args = vec!["--glob-pathspecs", "ls-files", "-z", "-s", "--others"];
        list_args.extend_from_slice(&common_args);
        if let Some(include) = filters.include.as_ref().filter(|_| filters.has_includes) {
            list_args.push("--");
            list_args.extend(include.iter().map(String::as_str));
        }

        let context = ScanContext {
            handler: self,
            request,
            root: &root,
            modified,
            tracked_but_ignored,
            submodule_paths,
            exclude_matcher: PathMatcher::new(None, &filters.augmented_excludes)?,
        };

        let submodule_scans = context.submodule_paths.iter().map(|submodule| {
            self.scan_submodule(request, &root, &filters, submodule)
        });

        let (mut files, nested) = tokio::try_join!(
            context.list(&list_args),
            try_join_all(submodule_scans)
        )?;

        debug!(
            path = %root.display(),
            files = files.len(),
            submodules = nested.len(),
            "Found files in {description}"
        );
        files.extend(nested.into_iter().flatten());
        Ok(files)
    }

    /// Scan a submodule declared under the scan root, carrying over the
    /// parent's filters translated to submodule-relative paths.
    async fn scan_submodule(
        &self,
        request: &ScanRequest,
        root: &Path,
        filters: &IncludeExclude,
        submodule: &Path,
    ) -> Result<Vec<FileEntry>> {
        if submodule == root || !submodule.starts_with(root) || filters.excludes_path(submodule) {
            return Ok(Vec::new());
        }

        match tokio::fs::metadata(submodule).await {
            Ok(m) if m.is_dir() => {}
            Ok(_) | Err(_) => {
                warn!(
                    path = %submodule.display(),
                    "Expected submodule directory, skipping. \
                     Perhaps you need to run `git submodule update --recursive`?"
                );
                return Ok(Vec::new());
            }
        }

        let prefix = relative_slash_path(root, submodule);
        let matcher = PathMatcher::new(
            filters.augmented_includes.as_deref(),
            &filters.augmented_excludes,
        )?;
        let parent_filter = request.filter.clone();
        let filter = PathFilter::new(move |path| {
            let parent_path = format!("{prefix}/{path}");
            matcher.matches(&parent_path)
                && parent_filter.as_ref().is_none_or(|f| f.matches(&parent_path))
        });

        self.scan(ScanRequest {
            path: submodule.to_path_buf(),
            include: None,
            exclude: Vec::new(),
            filter: Some(filter),
            fail_on_prompt: request.fail_on_prompt,
            path_description: "submodule".to_string(),
        })
        .await
    }
}

impl ScanContext<'_> {
    /// Stream `git ls-files` output, handling up to `hash_concurrency`
    /// entries at once.
    async fn list(&self, args: &[&str]) -> Result<Vec<FileEntry>> {
        let git = self.handler.git(self.root, self.request.fail_on_prompt);
        let mut stream = git.stream(args)?;

        let files = (&mut stream.records)
            .map(|record| async move {
                match record {
                    Ok(record) => self.handle_record(&String::from_utf8_lossy(&record)).await,
                    Err(e) => Err(self.codec_error(e)),
                }
            })
            .buffer_unordered(self.handler.config.hash_concurrency)
            .try_filter_map(|entry| async move { Ok(entry) })
            .try_collect::<Vec<_>>()
            .await?;

        match stream.finish().await {
            Ok(()) => {}
            Err(e) if e.exit_code() == Some(GIT_FATAL_EXIT) => {
                trace!(path = %self.root.display(), error = %e, "Ignoring ls-files exit status");
            }
            Err(e) => return Err(e),
        }

        Ok(files)
    }

    async fn handle_record(&self, record: &str) -> Result<Option<FileEntry>> {
        let Some(listed) = parse_record(record) else {
            return Ok(None);
        };

        if listed.is_gitlink()
            || !self.request.accepts(&listed.path)
            || self.tracked_but_ignored.contains(&listed.path)
            || !self.exclude_matcher.matches(&listed.path)
        {
            return Ok(None);
        }

        let path = self.root.join(&listed.path);
        if self.submodule_paths.contains(&path) {
            return Ok(None);
        }

        let is_modified = self.modified.contains(&path);
        let mut entry = FileEntry::new(path, listed.hash.clone());
        if !listed.mode.is_empty() {
            entry = entry.with_mode(listed.mode.clone());
        }

        if listed.is_tracked() && !listed.is_symlink() && !is_modified {
            return Ok(Some(entry));
        }

        let metadata = match tokio::fs::symlink_metadata(&entry.path).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(VcsError::io(&entry.path, e)),
        };

        if metadata.file_type().is_symlink() && !self.symlink_is_safe(&entry.path).await? {
            return Ok(None);
        }

        Ok(self.ensure_hash(entry, &metadata).await)
    }

    /// Absolute links are rejected. Relative links are resolved through any
    /// chain of links and kept only if they land inside the scan root.
    async fn symlink_is_safe(&self, path: &Path) -> Result<bool> {
        let target = match tokio::fs::read_link(path).await {
            Ok(target) => target,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(VcsError::io(path, e)),
        };

        if target.is_absolute() {
            debug!(
                path = %path.display(),
                target = %target.display(),
                "Ignoring symlink with absolute target"
            );
            return Ok(false);
        }

        match tokio::fs::canonicalize(path).await {
            Ok(real) if real.starts_with(self.root) => Ok(true),
            Ok(real) => {
                debug!(
                    path = %path.display(),
                    target = %real.display(),
                    "Ignoring symlink pointing outside of the scanned directory"
                );
                Ok(false)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!(path = %path.display(), "Ignoring dead symlink");
                Ok(false)
            }
            Err(e) => Err(VcsError::io(path, e)),
        }
    }

    /// Compute the hash of an untracked, modified or symlinked entry.
    /// Directories are dropped.
    async fn ensure_hash(&self, mut entry: FileEntry, metadata: &Metadata) -> Option<FileEntry> {
        if metadata.is_dir() {
            return None;
        }

        entry.hash = self.handler.hash_object(metadata, &entry.path).await;
        if entry.hash.is_empty() {
            debug!(path = %entry.path.display(), "Could not hash file");
        }
        Some(entry)
    }

    fn codec_error(&self, err: AnyDelimiterCodecError) -> VcsError {
        match err {
            AnyDelimiterCodecError::Io(e) => VcsError::io(self.root, e),
            AnyDelimiterCodecError::MaxChunkLengthExceeded => VcsError::runtime(format!(
                "git ls-files produced an oversized record in {}",
                self.root.display()
            )),
        }
    }
}

/// `descendant` relative to `base`, with `/` separators.
fn relative_slash_path(base: &Path, descendant: &Path) -> String {
    descendant
        .strip_prefix(base)
        .unwrap_or(descendant)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
