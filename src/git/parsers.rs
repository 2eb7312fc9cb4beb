//! Git output parsers

use once_cell::sync::Lazy;
use regex::Regex;

static COMMIT_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9a-f]{40}\b").expect("Invalid commit hash pattern"));

/// Extract the first full 40-hex commit hash from `git log` output.
pub fn extract_commit_hash(log_output: &str) -> Option<String> {
    COMMIT_HASH
        .find(log_output)
        .map(|m| m.as_str().to_string())
}

/// Parse `git branch` output into the branch list (in listing order) and the
/// currently checked-out branch, marked by a leading `*`.
pub fn parse_branch_list(output: &str) -> (Vec<String>, Option<String>) {
    let mut branches = Vec::new();
    let mut current = None;

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(name) = trimmed.strip_prefix("* ") {
            // Detached HEAD renders as "* (HEAD detached at <sha>)"
            if !name.starts_with('(') {
                current = Some(name.to_string());
                branches.push(name.to_string());
            }
        } else {
            branches.push(trimmed.to_string());
        }
    }

    (branches, current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_commit_hash_from_log() {
        let log = "commit 9fceb02d0ae598e95dc970b74767f19372d61af8\n\
                   Author: Dev <dev@example.com>\n\
                   Date:   Mon Aug 24 10:00:00 2026 +0000\n\
                   \n    initial import\n";
        assert_eq!(
            extract_commit_hash(log).as_deref(),
            Some("9fceb02d0ae598e95dc970b74767f19372d61af8")
        );
    }

    #[test]
    fn test_extract_commit_hash_ignores_short_hex() {
        assert_eq!(extract_commit_hash("commit 9fceb02\n"), None);
        assert_eq!(extract_commit_hash(""), None);
    }

    #[test]
    fn test_extract_commit_hash_takes_first_of_many() {
        let log = "commit aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\n\
                   commit bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\n";
        assert_eq!(
            extract_commit_hash(log).as_deref(),
            Some("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
        );
    }

    #[test]
    fn test_parse_branch_list() {
        let output = "  master\n* feature\n  bugfix/typo\n";
        let (branches, current) = parse_branch_list(output);
        assert_eq!(branches, vec!["master", "feature", "bugfix/typo"]);
        assert_eq!(current.as_deref(), Some("feature"));
    }

    #[test]
    fn test_parse_branch_list_detached_head() {
        let output = "* (HEAD detached at 9fceb02)\n  master\n";
        let (branches, current) = parse_branch_list(output);
        assert_eq!(branches, vec!["master"]);
        assert_eq!(current, None);
    }

    #[test]
    fn test_parse_branch_list_empty() {
        let (branches, current) = parse_branch_list("");
        assert!(branches.is_empty());
        assert!(current.is_none());
    }
}
