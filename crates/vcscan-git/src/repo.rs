//! Repository root and working tree queries.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::trace;

use vcscan_core::{PathInfo, Result, VcsError};

use crate::cli::GitCli;
use crate::handler::GitHandler;

/// Exit code git uses for fatal errors such as "not a git repository" or
/// "bad revision HEAD" in a repository without commits.
pub const GIT_FATAL_EXIT: i32 = 128;

impl GitHandler {
    /// Root of the repository containing `path`.
    ///
    /// Lookups are memoized per path for the lifetime of the handler, and
    /// concurrent lookups of the same path run git only once.
    pub async fn get_repo_root(&self, path: &Path, fail_on_prompt: bool) -> Result<PathBuf> {
        if let Some(root) = self.repo_roots.get(path) {
            return Ok(root.value().clone());
        }

        let key = format!("repo-root:{}", path.display());
        self.lock
            .acquire(&key, || async move {
                if let Some(root) = self.repo_roots.get(path) {
                    return Ok(root.value().clone());
                }

                let git = self.git(path, fail_on_prompt);
                let output = git
                    .run(&["rev-parse", "--show-toplevel"])
                    .await
                    .map_err(|e| explain_git_error(e, path))?;
                let root = output.into_iter().next().map(PathBuf::from).ok_or_else(|| {
                    VcsError::runtime(format!(
                        "git did not report a repository root for {}",
                        path.display()
                    ))
                })?;

                self.repo_roots.insert(path.to_path_buf(), root.clone());
                Ok(root)
            })
            .await
    }

    /// Current branch, HEAD commit and origin URL of the working tree at
    /// `path`. Missing commits or a missing origin yield empty fields.
    pub async fn get_path_info(&self, path: &Path, fail_on_prompt: bool) -> Result<PathInfo> {
        let git = self.git(path, fail_on_prompt);
        let mut info = PathInfo::default();

        let head = async {
            let branch = first_line(git.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await?);
            let commit = first_line(git.run(&["rev-parse", "HEAD"]).await?);
            Ok::<_, VcsError>((branch, commit))
        };
        match head.await {
            Ok((branch, commit)) => {
                info.branch = branch;
                info.commit_hash = commit;
            }
            Err(e) if e.exit_code() == Some(GIT_FATAL_EXIT) => {}
            Err(e) => return Err(e),
        }

        match git.run(&["config", "--get", "remote.origin.url"]).await {
            Ok(lines) => info.origin_url = first_line(lines),
            Err(e) => trace!(error = %e, "Could not read remote.origin.url"),
        }

        Ok(info)
    }

    /// Paths (absolute) with uncommitted changes under `git`'s directory.
    /// A repository without commits has no modifications.
    pub(crate) async fn get_modified_files(
        &self,
        git: &GitCli,
        repo_root: &Path,
    ) -> Result<HashSet<PathBuf>> {
        match git.run_nul(&["diff-index", "-z", "--name-only", "HEAD", "."]).await {
            Ok(paths) => Ok(paths.into_iter().map(|rel| repo_root.join(rel)).collect()),
            Err(e) if e.exit_code() == Some(GIT_FATAL_EXIT) => Ok(HashSet::new()),
            Err(e) => Err(e),
        }
    }
}

/// Rewrite "not a git repository" failures into an actionable error; pass
/// everything else through unchanged.
pub fn explain_git_error(err: VcsError, path: &Path) -> VcsError {
    let not_a_repo = err.exit_code() == Some(GIT_FATAL_EXIT)
        && err
            .stderr()
            .is_some_and(|s| s.to_lowercase().contains("not a git repository"));

    if not_a_repo {
        VcsError::NotARepository {
            path: path.to_path_buf(),
        }
    } else {
        err
    }
}

fn first_line(lines: Vec<String>) -> String {
    lines.into_iter().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_error(code: i32, stderr: &str) -> VcsError {
        VcsError::Process {
            command: "git rev-parse --show-toplevel".to_string(),
            code: Some(code),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_explain_not_a_repository() {
        let err = explain_git_error(
            process_error(128, "fatal: Not a git repository (or any of the parent directories): .git"),
            Path::new("/tmp/project"),
        );
        assert!(matches!(err, VcsError::NotARepository { .. }));
    }

    #[test]
    fn test_explain_passes_other_errors_through() {
        let err = explain_git_error(process_error(128, "fatal: bad object"), Path::new("/x"));
        assert!(matches!(err, VcsError::Process { .. }));

        let err = explain_git_error(process_error(1, "not a git repository"), Path::new("/x"));
        assert_eq!(err.exit_code(), Some(1));
    }
}
