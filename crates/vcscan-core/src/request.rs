//! Scan requests.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use derive_builder::Builder;

/// Predicate over a path relative to the scanned directory.
#[derive(Clone)]
pub struct PathFilter(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl PathFilter {
    /// Wrap a predicate.
    pub fn new(f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Evaluate the predicate.
    pub fn matches(&self, path: &str) -> bool {
        (self.0)(path)
    }
}

impl fmt::Debug for PathFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PathFilter(..)")
    }
}

/// A request to list and hash the files under a directory.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct ScanRequest {
    /// Directory to scan.
    pub path: PathBuf,

    /// Include patterns. `None` includes everything; `Some(vec![])`
    /// includes nothing.
    #[builder(default, setter(into, strip_option))]
    pub include: Option<Vec<String>>,

    /// Exclude patterns.
    #[builder(default)]
    pub exclude: Vec<String>,

    /// Extra predicate applied to each path relative to `path`.
    #[builder(default, setter(into, strip_option))]
    pub filter: Option<PathFilter>,

    /// Disable credential prompts of the VCS.
    #[builder(default = "false")]
    pub fail_on_prompt: bool,

    /// Label used in diagnostics.
    #[builder(default = "\"directory\".to_string()")]
    pub path_description: String,
}

impl ScanRequestBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.path {
            Some(ref path) if path.as_os_str().is_empty() => {
                Err("Scan path cannot be empty".to_string())
            }
            Some(_) => Ok(()),
            None => Err("Scan path is required".to_string()),
        }
    }
}

impl ScanRequest {
    /// Create a new request builder.
    pub fn builder() -> ScanRequestBuilder {
        ScanRequestBuilder::default()
    }

    /// Create a request for everything under `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            include: None,
            exclude: Vec::new(),
            filter: None,
            fail_on_prompt: false,
            path_description: "directory".to_string(),
        }
    }

    /// Check a relative path against the optional filter.
    pub fn accepts(&self, rel_path: &str) -> bool {
        self.filter.as_ref().is_none_or(|f| f.matches(rel_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ScanRequest::builder()
            .path("/repo")
            .include(vec!["src/**/*".to_string()])
            .exclude(vec!["*.log".to_string()])
            .filter(PathFilter::new(|p| !p.ends_with(".tmp")))
            .fail_on_prompt(true)
            .build()
            .unwrap();

        assert_eq!(request.path, PathBuf::from("/repo"));
        assert_eq!(request.include.as_deref(), Some(&["src/**/*".to_string()][..]));
        assert!(request.fail_on_prompt);
        assert_eq!(request.path_description, "directory");
        assert!(request.accepts("a.txt"));
        assert!(!request.accepts("a.tmp"));
    }

    #[test]
    fn test_request_requires_path() {
        assert!(ScanRequest::builder().build().is_err());
        assert!(ScanRequest::builder().path("").build().is_err());
    }

    #[test]
    fn test_request_new_accepts_everything() {
        let request = ScanRequest::new("/repo");
        assert!(request.include.is_none());
        assert!(request.accepts("anything/at/all"));
    }
}
