//! Include/exclude pattern resolution and matching.
//!
//! `git ls-files` cannot reliably apply include and exclude pathspecs in the
//! same invocation, so only one side is handed to git and the other is
//! applied in-process with [`PathMatcher`]. Both sides must agree on what a
//! pattern means, which is why plain directory names are augmented with a
//! `/**/*` suffix before matching.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use vcscan_core::{Result, VcsError};

/// Include pattern that is equivalent to no include filter at all.
pub const MATCH_ALL: &str = "**/*";

/// Resolved include/exclude filters for one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeExclude {
    /// Include patterns as requested (`None` = everything).
    pub include: Option<Vec<String>>,
    /// Exclude patterns, including the state directory exclusion.
    pub exclude: Vec<String>,
    /// Includes with directory names expanded.
    pub augmented_includes: Option<Vec<String>>,
    /// Excludes with directory names expanded.
    pub augmented_excludes: Vec<String>,
    /// Whether any include filter applies.
    pub has_includes: bool,
    /// Exclude patterns resolved against the scan path.
    pub abs_excludes: Vec<PathBuf>,
}

impl IncludeExclude {
    /// Resolve the filters of a scan rooted at `path`.
    pub async fn resolve(
        path: &Path,
        include: Option<&[String]>,
        exclude: &[String],
        state_dir_name: &str,
    ) -> Self {
        let mut exclude = exclude.to_vec();
        exclude.push(format!("**/{state_dir_name}/**/*"));

        let include = include
            .filter(|patterns| !patterns.iter().any(|p| p == MATCH_ALL))
            .map(<[String]>::to_vec);

        let abs_excludes = exclude.iter().map(|p| path.join(p)).collect();
        let has_includes = include.as_ref().is_some_and(|i| !i.is_empty());

        let augmented_includes = match &include {
            Some(patterns) => Some(augment_globs(path, patterns).await),
            None => None,
        };
        let augmented_excludes = augment_globs(path, &exclude).await;

        Self {
            include,
            exclude,
            augmented_includes,
            augmented_excludes,
            has_includes,
            abs_excludes,
        }
    }

    /// Whether `abs_path` is named directly by an exclude pattern.
    pub fn excludes_path(&self, abs_path: &Path) -> bool {
        self.abs_excludes.iter().any(|p| p == abs_path)
    }
}

/// Heuristic check for glob syntax.
pub fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{']) || pattern.starts_with('!')
}

/// Append `/**/*` to each pattern that names an existing directory under
/// `base`, so it matches the directory's contents the way git does.
pub async fn augment_globs(base: &Path, globs: &[String]) -> Vec<String> {
    let mut augmented = Vec::with_capacity(globs.len());
    for pattern in globs {
        if is_glob(pattern) {
            augmented.push(pattern.clone());
            continue;
        }
        let is_dir = tokio::fs::metadata(base.join(pattern))
            .await
            .is_ok_and(|m| m.is_dir());
        if is_dir {
            augmented.push(format!("{}/{MATCH_ALL}", pattern.trim_end_matches('/')));
        } else {
            augmented.push(pattern.clone());
        }
    }
    augmented
}

/// Compiled include/exclude matcher over relative, `/`-separated paths.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
}

impl PathMatcher {
    /// Compile a matcher. A path matches when it matches any include (or
    /// there are no includes) and matches no exclude.
    pub fn new(include: Option<&[String]>, exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: include.map(build_set).transpose()?,
            exclude: if exclude.is_empty() {
                None
            } else {
                Some(build_set(exclude)?)
            },
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = path.strip_prefix("./").unwrap_or(path);
        let included = self.include.as_ref().is_none_or(|set| set.is_match(path));
        included && !self.exclude.as_ref().is_some_and(|set| set.is_match(path))
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(build_glob(pattern)?);
    }
    builder
        .build()
        .map_err(|e| VcsError::configuration(format!("Invalid glob patterns: {e}")))
}

fn build_glob(pattern: &str) -> Result<Glob> {
    let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| VcsError::configuration(format!("Invalid glob pattern '{pattern}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn strings(patterns: &[&str]) -> Vec<String> {
        patterns.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_is_glob() {
        assert!(is_glob("*.txt"));
        assert!(is_glob("src/**/*"));
        assert!(is_glob("file?.rs"));
        assert!(is_glob("{a,b}"));
        assert!(!is_glob("src"));
        assert!(!is_glob("src/main.rs"));
    }

    #[tokio::test]
    async fn test_augment_globs() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();

        let augmented =
            augment_globs(temp.path(), &strings(&["src", "src/", "a.txt", "*.md", "missing"])).await;
        assert_eq!(
            augmented,
            strings(&["src/**/*", "src/**/*", "a.txt", "*.md", "missing"])
        );
    }

    #[tokio::test]
    async fn test_resolve_adds_state_dir_and_drops_match_all() {
        let temp = TempDir::new().unwrap();
        let include = strings(&["**/*"]);
        let resolved =
            IncludeExclude::resolve(temp.path(), Some(&include), &strings(&["tmp"]), ".vcscan").await;

        assert!(resolved.include.is_none());
        assert!(!resolved.has_includes);
        assert_eq!(resolved.exclude, strings(&["tmp", "**/.vcscan/**/*"]));
        assert!(resolved.excludes_path(&temp.path().join("tmp")));
    }

    #[tokio::test]
    async fn test_resolve_with_includes() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("lib")).unwrap();
        let include = strings(&["lib", "*.rs"]);
        let resolved = IncludeExclude::resolve(temp.path(), Some(&include), &[], ".vcscan").await;

        assert!(resolved.has_includes);
        assert_eq!(resolved.augmented_includes, Some(strings(&["lib/**/*", "*.rs"])));
    }

    #[test]
    fn test_matcher() {
        let matcher = PathMatcher::new(
            Some(&strings(&["src/**/*", "*.toml"])),
            &strings(&["**/*.log", "**/.vcscan/**/*"]),
        )
        .unwrap();

        assert!(matcher.matches("src/main.rs"));
        assert!(matcher.matches("src/deep/mod.rs"));
        assert!(matcher.matches("Cargo.toml"));
        assert!(matcher.matches("./Cargo.toml"));
        assert!(!matcher.matches("nested/Cargo.toml"));
        assert!(!matcher.matches("src/debug.log"));
        assert!(!matcher.matches(".vcscan/sources/x"));
        assert!(!matcher.matches("README.md"));
    }

    #[test]
    fn test_matcher_without_includes() {
        let matcher = PathMatcher::new(None, &strings(&["build/**/*"])).unwrap();
        assert!(matcher.matches("anything.txt"));
        assert!(!matcher.matches("build/out.o"));

        let everything = PathMatcher::new(None, &[]).unwrap();
        assert!(everything.matches("a/b/c"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PathMatcher::new(Some(&strings(&["src/[a"])), &[]).unwrap_err();
        assert!(matches!(err, VcsError::Configuration { .. }));
    }
}
