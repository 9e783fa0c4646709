//! Handler configuration.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::VcsError;

/// Configuration for the git handler.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(deny_unknown_fields)]
pub struct VcsConfig {
    /// Version-control executable.
    #[builder(default = "default_git_binary()")]
    #[serde(default = "default_git_binary")]
    pub git_binary: PathBuf,

    /// The tool's private state directory. Never scanned; remote sources
    /// are cached below it.
    #[builder(default = "default_state_dir()")]
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Per-directory ignore file name. `None` or an empty name disables
    /// ignore-file handling.
    #[builder(default = "default_ignore_file()")]
    #[serde(default = "default_ignore_file")]
    pub ignore_file: Option<String>,

    /// Ceiling for buffered command output, in bytes.
    #[builder(default = "default_max_output_bytes()")]
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Maximum number of entries hashed concurrently per scan.
    #[builder(default = "default_hash_concurrency()")]
    #[serde(default = "default_hash_concurrency")]
    pub hash_concurrency: usize,
}

fn default_git_binary() -> PathBuf {
    PathBuf::from("git")
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".vcscan")
}

fn default_ignore_file() -> Option<String> {
    Some(".gitignore".to_string())
}

fn default_max_output_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_hash_concurrency() -> usize {
    64
}

impl VcsConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(ref dir) = self.state_dir {
            if dir.file_name().is_none() {
                return Err("State directory must have a file name".to_string());
            }
        }
        if self.hash_concurrency == Some(0) {
            return Err("Hash concurrency must be greater than zero".to_string());
        }
        if self.max_output_bytes == Some(0) {
            return Err("Output ceiling must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl VcsConfig {
    /// Create a new config builder.
    pub fn builder() -> VcsConfigBuilder {
        VcsConfigBuilder::default()
    }

    /// Create a config whose state directory lives in `project_root`.
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            state_dir: project_root.as_ref().join(default_state_dir()),
            ..Self::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, VcsError> {
        let config: Self = toml::from_str(s)
            .map_err(|e| VcsError::configuration(format!("Invalid vcscan config: {e}")))?;
        config.check()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VcsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| VcsError::io(path, e))?;
        Self::from_toml_str(&contents)
    }

    /// Name of the state directory, used for the always-on exclusion.
    pub fn state_dir_name(&self) -> String {
        self.state_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".vcscan".to_string())
    }

    /// Configured ignore file, if any.
    pub fn ignore_file_name(&self) -> Option<&str> {
        self.ignore_file.as_deref().filter(|f| !f.is_empty())
    }

    /// Directory holding checkouts of remote sources.
    pub fn remote_sources_dir(&self) -> PathBuf {
        self.state_dir.join("sources")
    }

    fn check(&self) -> Result<(), VcsError> {
        if self.hash_concurrency == 0 {
            return Err(VcsError::configuration("hash_concurrency must be greater than zero"));
        }
        if self.max_output_bytes == 0 {
            return Err(VcsError::configuration("max_output_bytes must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            git_binary: default_git_binary(),
            state_dir: default_state_dir(),
            ignore_file: default_ignore_file(),
            max_output_bytes: default_max_output_bytes(),
            hash_concurrency: default_hash_concurrency(),
        }
    }
}
