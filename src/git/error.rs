//! Git operation error types

use std::path::PathBuf;
use thiserror::Error;

/// Tagged error taxonomy for repository operations.
///
/// Each variant carries the operand the operation was acting on (remote name,
/// branch name, commit id, path) so callers can match on the failure class
/// without re-parsing messages. Variants render as `"{operand} -> {message}"`,
/// or just the message when no primary operand exists.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GitError {
    #[error("{0} -> Cannot alter remote that does not exist")]
    RemoteNotExists(String),

    #[error("{0} -> Cannot add a remote that already exists")]
    RemoteAlreadyExists(String),

    #[error("{0} -> Cannot change to a branch that doesn't exist")]
    BranchNotExists(String),

    #[error("{0} -> Cannot create a new branch where one with the same name already exists")]
    BranchAlreadyExists(String),

    #[error("{0} -> Failed to delete the specified branch")]
    CannotDeleteBranch(String),

    #[error("Cannot view log for an empty branch")]
    NoCommits,

    #[error("{0} -> Cannot reset to a commit that does not exist")]
    UnknownRevision(String),

    #[error("{remote}, branch {branch} -> Pushing to remote on specified branch failed")]
    PushFailed { remote: String, branch: String },

    #[error("{0} -> Merging the specified branch failed")]
    MergeFailed(String),

    #[error("Pulling from remote failed")]
    PullFailed,

    #[error("Removing specified file(s) failed")]
    RemoveFailed,

    #[error("{} -> Folder is not a git repository", .0.display())]
    NotARepository(PathBuf),

    #[error("Merge conflict occurred. Fix conflict or use abort_merge")]
    MergeConflict,

    #[error("Git command failed: {0}")]
    CommandFailed(String),
}

impl GitError {
    /// The operand the failing operation was acting on, when there is one.
    pub fn operand(&self) -> Option<String> {
        match self {
            GitError::RemoteNotExists(name)
            | GitError::RemoteAlreadyExists(name)
            | GitError::BranchNotExists(name)
            | GitError::BranchAlreadyExists(name)
            | GitError::CannotDeleteBranch(name)
            | GitError::MergeFailed(name)
            | GitError::UnknownRevision(name) => Some(name.clone()),
            GitError::PushFailed { remote, .. } => Some(remote.clone()),
            GitError::NotARepository(path) => Some(path.display().to_string()),
            _ => None,
        }
    }

    /// Whether the repository is left in a state the caller can act on
    /// directly (resolve files then continue, or abort).
    pub fn is_conflict(&self) -> bool {
        matches!(self, GitError::MergeConflict)
    }
}
