//! Remote source references of the form `<url>#<ref>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VcsError;

/// What kind of build unit a remote source belongs to.
///
/// Each kind gets its own directory in the local source cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Project,
    Module,
    Action,
}

impl SourceKind {
    /// Directory name used for this kind in the source cache.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Module => "module",
            Self::Action => "action",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = VcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "project" => Ok(Self::Project),
            "module" => Ok(Self::Module),
            "action" => Ok(Self::Action),
            other => Err(VcsError::configuration(format!(
                "Unknown remote source kind '{other}' (expected project, module or action)"
            ))),
        }
    }
}

/// A parsed `<url>#<ref>` remote source reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteSourceRef {
    /// Repository URL without the fragment.
    pub repository_url: String,
    /// Branch, tag or full commit id.
    pub git_ref: String,
}

impl RemoteSourceRef {
    /// Parse a remote URL. The `#ref` part is mandatory.
    pub fn parse(url: &str) -> Result<Self, VcsError> {
        match url.rsplit_once('#') {
            Some((repository_url, git_ref)) if !repository_url.is_empty() && !git_ref.is_empty() => {
                Ok(Self {
                    repository_url: repository_url.to_string(),
                    git_ref: git_ref.to_string(),
                })
            }
            _ => Err(VcsError::configuration(format!(
                "Repository URLs must contain a hash part pointing to a specific branch or tag \
                 (e.g. https://github.com/org/repo.git#main). Actually got: '{url}'"
            ))),
        }
    }

    /// Whether the ref is a full commit id rather than a branch or tag.
    pub fn is_commit(&self) -> bool {
        is_sha1(&self.git_ref)
    }
}

impl FromStr for RemoteSourceRef {
    type Err = VcsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RemoteSourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repository_url, self.git_ref)
    }
}

/// Whether `s` is a full 40-digit hex commit id.
pub fn is_sha1(s: &str) -> bool {
    s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_branch_ref() {
        let parsed = RemoteSourceRef::parse("https://example.com/repo.git#v1.0").unwrap();
        assert_eq!(parsed.repository_url, "https://example.com/repo.git");
        assert_eq!(parsed.git_ref, "v1.0");
        assert!(!parsed.is_commit());
        assert_eq!(parsed.to_string(), "https://example.com/repo.git#v1.0");
    }

    #[test]
    fn test_parse_splits_on_last_hash() {
        let parsed = RemoteSourceRef::parse("file:///tmp/a#b/repo#main").unwrap();
        assert_eq!(parsed.repository_url, "file:///tmp/a#b/repo");
        assert_eq!(parsed.git_ref, "main");
    }

    #[test]
    fn test_parse_missing_ref_is_configuration_error() {
        for url in ["https://example.com/repo.git", "https://example.com/repo.git#", "#main"] {
            let err = RemoteSourceRef::parse(url).unwrap_err();
            assert!(matches!(err, VcsError::Configuration { .. }), "{url}");
        }
    }

    #[test]
    fn test_is_sha1() {
        assert!(is_sha1("0123456789abcdef0123456789abcdef01234567"));
        assert!(!is_sha1("main"));
        assert!(!is_sha1("0123456789abcdef0123456789abcdef0123456"));
        assert!(!is_sha1("0123456789abcdef0123456789abcdef0123456g"));
    }

    #[test]
    fn test_source_kind_roundtrip() {
        for kind in [SourceKind::Project, SourceKind::Module, SourceKind::Action] {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
        assert!("service".parse::<SourceKind>().is_err());
    }
}
