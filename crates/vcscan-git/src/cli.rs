//! Invocation of the git executable.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tracing::trace;

use vcscan_core::{Result, VcsConfig, VcsError};

const NUL: u8 = b'\0';

/// Runs git with a fixed working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    binary: PathBuf,
    cwd: PathBuf,
    fail_on_prompt: bool,
    max_output_bytes: usize,
}

impl GitCli {
    /// Create an invoker for `cwd`. With `fail_on_prompt`, git never asks
    /// for credentials on the terminal.
    pub fn new(config: &VcsConfig, cwd: impl Into<PathBuf>, fail_on_prompt: bool) -> Self {
        Self {
            binary: config.git_binary.clone(),
            cwd: cwd.into(),
            fail_on_prompt,
            max_output_bytes: config.max_output_bytes,
        }
    }

    /// Working directory of every invocation.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Run git and return its stdout as non-empty, trimmed lines.
    pub async fn run(&self, args: &[&str]) -> Result<Vec<String>> {
        let stdout = self.output(args).await?;
        Ok(split_lines(&String::from_utf8_lossy(&stdout)))
    }

    /// Run git with `-z` style output and return its NUL-terminated records.
    /// Paths come back verbatim, without `core.quotePath` escaping.
    pub async fn run_nul(&self, args: &[&str]) -> Result<Vec<String>> {
        let stdout = self.output(args).await?;
        Ok(split_nul(&stdout))
    }

    async fn output(&self, args: &[&str]) -> Result<Vec<u8>> {
        trace!(args = %args.join(" "), cwd = %self.cwd.display(), "Calling git");

        let mut child = self.spawn(args)?;
        let stderr_task = self.collect_stderr(&mut child);

        let (stdout, truncated) = read_capped(child.stdout.take(), self.max_output_bytes)
            .await
            .map_err(|e| VcsError::io(&self.cwd, e))?;

        if truncated {
            let _ = child.kill().await;
            return Err(VcsError::runtime(format!(
                "Output of `{}` exceeded {} bytes",
                self.describe(args),
                self.max_output_bytes
            )));
        }

        let status = child.wait().await.map_err(|e| VcsError::io(&self.cwd, e))?;
        let stderr = stderr_task.await.unwrap_or_default();
        if !status.success() {
            return Err(VcsError::Process {
                command: self.describe(args),
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }

        Ok(stdout)
    }

    /// Start git with its stdout exposed as a stream of NUL-terminated
    /// records; `args` must request `-z` output.
    ///
    /// The process is killed if the returned handle is dropped before
    /// [`GitStream::finish`] is called.
    pub(crate) fn stream(&self, args: &[&str]) -> Result<GitStream> {
        trace!(args = %args.join(" "), cwd = %self.cwd.display(), "Streaming git");

        let mut child = self.spawn(args)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VcsError::runtime("git stdout was not captured"))?;
        let stderr_task = self.collect_stderr(&mut child);

        Ok(GitStream {
            command: self.describe(args),
            records: FramedRead::new(
                stdout,
                AnyDelimiterCodec::new_with_max_length(
                    vec![NUL],
                    vec![NUL],
                    self.max_output_bytes,
                ),
            ),
            child,
            stderr_task,
        })
    }

    /// Drain stderr in the background so a chatty process never blocks.
    fn collect_stderr(&self, child: &mut Child) -> JoinHandle<Vec<u8>> {
        let stderr = child.stderr.take();
        let limit = self.max_output_bytes;
        tokio::spawn(async move {
            let Some(mut stderr) = stderr else {
                return Vec::new();
            };
            let mut buf = Vec::new();
            let _ = (&mut stderr).take(limit as u64).read_to_end(&mut buf).await;
            let _ = tokio::io::copy(&mut stderr, &mut tokio::io::sink()).await;
            buf
        })
    }

    fn spawn(&self, args: &[&str]) -> Result<Child> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if self.fail_on_prompt {
            command.env("GIT_TERMINAL_PROMPT", "0").env("GIT_ASKPASS", "true");
        }

        command.spawn().map_err(|e| {
            VcsError::runtime(format!(
                "Unable to run {} in {}: {e}",
                self.binary.display(),
                self.cwd.display()
            ))
        })
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut command = self.binary.display().to_string();
        for arg in args {
            command.push(' ');
            command.push_str(arg);
        }
        command
    }
}

/// A running git process whose stdout is consumed record by record.
pub(crate) struct GitStream {
    command: String,
    pub(crate) records: FramedRead<ChildStdout, AnyDelimiterCodec>,
    child: Child,
    stderr_task: JoinHandle<Vec<u8>>,
}

impl GitStream {
    /// Wait for the process to exit. Fails with a process error on a
    /// non-zero exit.
    pub(crate) async fn finish(mut self) -> Result<()> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| VcsError::runtime(format!("Failed waiting for `{}`: {e}", self.command)))?;
        let stderr = (&mut self.stderr_task).await.unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(VcsError::Process {
                command: self.command,
                code: status.code(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            })
        }
    }
}

/// Read at most `limit` bytes; the flag reports whether more was available.
async fn read_capped<R>(reader: Option<R>, limit: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return Ok((Vec::new(), false));
    };
    let mut buf = Vec::new();
    reader.take(limit as u64 + 1).read_to_end(&mut buf).await?;
    let truncated = buf.len() > limit;
    buf.truncate(limit);
    Ok((buf, truncated))
}

/// Split `-z` command output into its non-empty records.
pub fn split_nul(output: &[u8]) -> Vec<String> {
    output
        .split(|b| *b == NUL)
        .filter(|record| !record.is_empty())
        .map(|record| String::from_utf8_lossy(record).into_owned())
        .collect()
}

/// Split command output into non-empty, trimmed lines.
pub fn split_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_lines() {
        let lines = split_lines("a.txt\n\n  b.txt  \r\n\n");
        assert_eq!(lines, vec!["a.txt", "b.txt"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn test_split_nul_keeps_paths_verbatim() {
        let records = split_nul("café.txt\0 spaced name \0\0dir/naïve.txt\0".as_bytes());
        assert_eq!(records, vec!["café.txt", " spaced name ", "dir/naïve.txt"]);
        assert!(split_nul(b"").is_empty());
    }

    #[test]
    fn test_describe() {
        let cli = GitCli::new(&VcsConfig::default(), "/tmp", false);
        assert_eq!(cli.describe(&["rev-parse", "HEAD"]), "git rev-parse HEAD");
        assert_eq!(cli.cwd(), Path::new("/tmp"));
    }

    #[tokio::test]
    async fn test_read_capped_flags_overflow() {
        let data: &[u8] = b"0123456789";
        let (buf, truncated) = read_capped(Some(data), 4).await.unwrap();
        assert_eq!(buf, b"0123");
        assert!(truncated);

        let (buf, truncated) = read_capped(Some(data), 64).await.unwrap();
        assert_eq!(buf.len(), 10);
        assert!(!truncated);

        let (buf, truncated) = read_capped(None::<&[u8]>, 4).await.unwrap();
        assert!(buf.is_empty() && !truncated);
    }

    #[tokio::test]
    async fn test_missing_binary_is_runtime_error() {
        let config = VcsConfig::builder()
            .git_binary("/nonexistent/vcscan-git-binary")
            .build()
            .unwrap();
        let cli = GitCli::new(&config, std::env::temp_dir(), true);
        let err = cli.run(&["status"]).await.unwrap_err();
        assert!(matches!(err, VcsError::Runtime { .. }));
    }
}
