//! Submodule declarations (`.gitmodules`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use vcscan_core::{Result, Submodule, VcsError};

/// Name of the submodule declarations file.
pub const GITMODULES: &str = ".gitmodules";

/// Parse the contents of a `.gitmodules` file.
///
/// Only `[submodule "..."]` sections with a `path` are returned.
pub fn parse_gitmodules(contents: &str) -> Vec<Submodule> {
    let mut submodules = Vec::new();
    let mut current: Option<(Option<String>, Option<String>)> = None;

    let mut flush = |section: Option<(Option<String>, Option<String>)>| {
        if let Some((Some(path), url)) = section {
            submodules.push(Submodule {
                path,
                url: url.unwrap_or_default(),
            });
        }
    };

    for raw in contents.lines() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            flush(current.take());
            let section = header.split_whitespace().next().unwrap_or_default();
            if section.eq_ignore_ascii_case("submodule") {
                current = Some((None, None));
            }
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if let Some((path, url)) = current.as_mut() {
            let value = unquote(value.trim());
            match key.trim().to_ascii_lowercase().as_str() {
                "path" => *path = Some(value),
                "url" => *url = Some(value),
                _ => {}
            }
        }
    }
    flush(current.take());

    submodules
}

fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' | ';' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

/// Cache-aside memo of parsed `.gitmodules` files, keyed by repository root.
#[derive(Debug, Default)]
pub struct SubmoduleCache {
    entries: DashMap<PathBuf, Arc<Vec<Submodule>>>,
}

impl SubmoduleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submodules declared in `repo_root`, read from disk on first use.
    pub async fn get(&self, repo_root: &Path) -> Result<Arc<Vec<Submodule>>> {
        if let Some(cached) = self.entries.get(repo_root) {
            return Ok(cached.clone());
        }

        let submodules = Arc::new(read_gitmodules(repo_root).await?);
        self.entries
            .insert(repo_root.to_path_buf(), submodules.clone());
        Ok(submodules)
    }

    #[cfg(test)]
    fn clear(&self) {
        self.entries.clear();
    }
}

async fn read_gitmodules(repo_root: &Path) -> Result<Vec<Submodule>> {
    let path = repo_root.join(GITMODULES);
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => Ok(parse_gitmodules(&contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(VcsError::io(path, e)),
    }
}
