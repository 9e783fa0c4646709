//! Error types for scanning and remote source operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used across vcscan.
pub type Result<T> = std::result::Result<T, VcsError>;

/// Errors that can occur while talking to the version-control tool.
#[derive(Debug, Error)]
pub enum VcsError {
    /// Malformed configuration, e.g. a remote URL without a `#ref` part.
    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// The version-control binary exited with a non-zero status.
    #[error("Command `{command}` failed with exit code {}: {stderr}", display_code(.code))]
    Process {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A clone, fetch or update failed.
    #[error("{message}")]
    Runtime { message: String },

    /// The path is not inside any repository.
    #[error(
        "Path {path} is not in a git repository root. vcscan must be run from within a git repo. \
         Please run `git init` if you're starting a new project and repository, or move the project \
         to an existing repository, and try again."
    )]
    NotARepository { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "<signal>".to_string(), |c| c.to_string())
}

impl VcsError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Exit code of a failed process, if this is a process error.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Process { code, .. } => *code,
            _ => None,
        }
    }

    /// Raw error output of a failed process.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Process { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err = VcsError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, VcsError::NotFound { .. }));
    }

    #[test]
    fn test_io_other_kept() {
        let err = VcsError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, VcsError::Io { .. }));
        assert!(err.to_string().contains("/test/path"));
    }

    #[test]
    fn test_process_error_accessors() {
        let err = VcsError::Process {
            command: "git rev-parse HEAD".into(),
            code: Some(128),
            stderr: "fatal: bad revision".into(),
        };
        assert_eq!(err.exit_code(), Some(128));
        assert_eq!(err.stderr(), Some("fatal: bad revision"));
        assert!(err.to_string().contains("exit code 128"));

        let killed = VcsError::Process {
            command: "git ls-files".into(),
            code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("<signal>"));
        assert_eq!(VcsError::runtime("x").exit_code(), None);
    }

    #[test]
    fn test_not_a_repository_message() {
        let err = VcsError::NotARepository {
            path: PathBuf::from("/tmp/project"),
        };
        let message = err.to_string();
        assert!(message.contains("/tmp/project"));
        assert!(message.contains("git init"));
    }
}
