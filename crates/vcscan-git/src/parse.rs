//! Parsing of `git ls-files` and `git ls-remote` output.

use vcscan_core::SYMLINK_MODE;

/// File mode git reports for a gitlink (a submodule commit pointer).
pub const GITLINK_MODE: &str = "160000";

/// One record of `git ls-files -z -s --others` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    /// Path relative to the listing directory.
    pub path: String,
    /// Object hash reported by git (empty for untracked files).
    pub hash: String,
    /// File mode reported by git (empty for untracked files).
    pub mode: String,
}

impl ListedEntry {
    /// Whether git reported the file as tracked.
    pub fn is_tracked(&self) -> bool {
        !self.hash.is_empty()
    }

    /// Whether git reported the file as a symlink.
    pub fn is_symlink(&self) -> bool {
        self.mode == SYMLINK_MODE
    }

    /// Whether the entry is a submodule pointer rather than a file.
    pub fn is_gitlink(&self) -> bool {
        self.mode == GITLINK_MODE
    }
}

/// Parse a record of the form `<mode> <hash> <stage>\t<path>` (tracked) or
/// `<path>` (untracked). Returns `None` for records that fit neither shape.
///
/// Records come from `-z` output, so the path is taken verbatim: no
/// trimming and no unquoting.
pub fn parse_record(record: &str) -> Option<ListedEntry> {
    if record.is_empty() {
        return None;
    }

    match record.split_once('\t') {
        None => Some(ListedEntry {
            path: record.to_string(),
            hash: String::new(),
            mode: String::new(),
        }),
        Some((info, path)) => {
            let mut fields = info.split(' ');
            let mode = fields.next().filter(|m| !m.is_empty())?;
            let hash = fields.next().filter(|h| !h.is_empty())?;
            if path.is_empty() {
                return None;
            }
            Some(ListedEntry {
                path: path.to_string(),
                hash: hash.to_string(),
                mode: mode.to_string(),
            })
        }
    }
}

/// Exact ref names to ask `git ls-remote` for when resolving `git_ref`.
pub fn remote_ref_patterns(git_ref: &str) -> [String; 3] {
    [
        format!("refs/heads/{git_ref}"),
        format!("refs/tags/{git_ref}"),
        format!("refs/tags/{git_ref}^{{}}"),
    ]
}

/// Commit id of `git_ref` in `git ls-remote` output.
///
/// Only exact ref names count. The peeled line of an annotated tag wins over
/// the tag object itself, and tags win over branches, matching how
/// `git fetch origin <ref>` resolves an ambiguous name.
pub fn commit_id_from_ref_list(ref_list: &[String], git_ref: &str) -> Option<String> {
    let [head, tag, peeled] = remote_ref_patterns(git_ref);
    let lookup = |name: &str| {
        ref_list.iter().find_map(|line| {
            let (id, ref_name) = line.split_once('\t')?;
            (ref_name.trim() == name).then(|| id.trim().to_string())
        })
    };

    lookup(&peeled).or_else(|| lookup(&tag)).or_else(|| lookup(&head))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tracked_line() {
        let entry = parse_record("100644 ce013625030ba8dba906f756967f9e9ca394464a 0\tsrc/a.txt").unwrap();
        assert_eq!(entry.path, "src/a.txt");
        assert_eq!(entry.hash, "ce013625030ba8dba906f756967f9e9ca394464a");
        assert_eq!(entry.mode, "100644");
        assert!(entry.is_tracked());
        assert!(!entry.is_symlink());
    }

    #[test]
    fn test_parse_untracked_line() {
        let entry = parse_record("notes/b.txt").unwrap();
        assert_eq!(entry.path, "notes/b.txt");
        assert!(!entry.is_tracked());
        assert!(entry.mode.is_empty());
    }

    #[test]
    fn test_parse_symlink_and_spaces() {
        let entry =
            parse_record("120000 0123456789abcdef0123456789abcdef01234567 0\tdir with space/link").unwrap();
        assert!(entry.is_symlink());
        assert_eq!(entry.path, "dir with space/link");
    }

    #[test]
    fn test_parse_gitlink() {
        let entry = parse_record("160000 0123456789abcdef0123456789abcdef01234567 0\tvendor/lib").unwrap();
        assert!(entry.is_gitlink());
        assert!(!entry.is_symlink());
    }

    #[test]
    fn test_parse_malformed_lines() {
        assert!(parse_record("").is_none());
        assert!(parse_record("100644\tpath").is_none());
        assert!(parse_record("100644 abc 0\t").is_none());
    }

    #[test]
    fn test_parse_non_ascii_verbatim() {
        let entry = parse_record("100644 ce013625030ba8dba906f756967f9e9ca394464a 0\tcafé.txt").unwrap();
        assert_eq!(entry.path, "café.txt");

        let entry = parse_record(" naïve .txt").unwrap();
        assert_eq!(entry.path, " naïve .txt");
    }

    #[test]
    fn test_commit_id_from_ref_list() {
        let refs = vec![
            "1111111111111111111111111111111111111111\trefs/heads/feature/main".to_string(),
            "0123456789abcdef0123456789abcdef01234567\trefs/heads/main".to_string(),
        ];
        assert_eq!(
            commit_id_from_ref_list(&refs, "main").as_deref(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
        assert!(commit_id_from_ref_list(&refs, "other").is_none());
        assert!(commit_id_from_ref_list(&[], "main").is_none());
    }

    #[test]
    fn test_commit_id_prefers_peeled_tag() {
        let refs = vec![
            "0b95c7f000000000000000000000000000000000\trefs/tags/v1.0".to_string(),
            "0f1d8cc000000000000000000000000000000000\trefs/tags/v1.0^{}".to_string(),
        ];
        assert_eq!(
            commit_id_from_ref_list(&refs, "v1.0").as_deref(),
            Some("0f1d8cc000000000000000000000000000000000")
        );

        // A lightweight tag has no peeled line.
        let refs = vec!["0b95c7f000000000000000000000000000000000\trefs/tags/v1.0".to_string()];
        assert_eq!(
            commit_id_from_ref_list(&refs, "v1.0").as_deref(),
            Some("0b95c7f000000000000000000000000000000000")
        );
    }

    #[test]
    fn test_remote_ref_patterns() {
        assert_eq!(
            remote_ref_patterns("v1.0"),
            [
                "refs/heads/v1.0".to_string(),
                "refs/tags/v1.0".to_string(),
                "refs/tags/v1.0^{}".to_string(),
            ]
        );
    }
}
