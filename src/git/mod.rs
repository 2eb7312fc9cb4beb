//! Git repository facade
//!
//! A stateful [`Repo`] wraps one working-directory checkout. Every operation
//! builds an argument list, runs `git` through the subprocess layer, and
//! classifies the captured output: known failures surface as a tagged
//! [`GitError`], successes update the in-memory mirror of repository state
//! (branch list, current branch, commit history).
//!
//! The mirror is a best-effort cache. It drifts if `git` is invoked outside
//! this facade; [`Repo::sync_branches`] re-reads branch state from the tool
//! when the caller needs to trust it again.

pub mod classify;
pub mod error;
pub mod parsers;
pub mod types;

pub use error::GitError;
pub use types::{
    CommitId, CommitRecord, Credentials, MergeState, RemoveOptions, ResetMode, StatusFormat,
};

use crate::subprocess::{
    ProcessCommandBuilder, ProcessError, ProcessOutput, ProcessRunner, SubprocessManager,
};
use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_BRANCH: &str = "master";
const INITIAL_COMMIT_MESSAGE: &str = "Repository Created";

/// One working-directory checkout, bound to a subprocess runner.
///
/// Operations take `&mut self`, so the borrow checker enforces that no two
/// operations overlap on one instance. Two `Repo` values pointed at the same
/// path are not coordinated; concurrent external mutation of the working
/// directory is undefined behavior.
pub struct Repo {
    runner: Arc<dyn ProcessRunner>,
    path: PathBuf,
    origin: Option<String>,
    name: Option<String>,
    current_branch: String,
    branches: Vec<String>,
    commits: Vec<CommitRecord>,
    merge_state: MergeState,
}

impl std::fmt::Debug for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repo")
            .field("path", &self.path)
            .field("origin", &self.origin)
            .field("name", &self.name)
            .field("current_branch", &self.current_branch)
            .field("branches", &self.branches)
            .field("commits", &self.commits)
            .field("merge_state", &self.merge_state)
            .finish_non_exhaustive()
    }
}

impl Repo {
    /// Bind a facade to an existing checkout without touching the tool.
    pub fn open(
        path: impl AsRef<Path>,
        origin: Option<String>,
        descriptor: Option<String>,
        subprocess: &SubprocessManager,
    ) -> Self {
        Self {
            runner: subprocess.runner(),
            path: path.as_ref().to_path_buf(),
            origin,
            name: descriptor,
            current_branch: DEFAULT_BRANCH.to_string(),
            branches: vec![DEFAULT_BRANCH.to_string()],
            commits: Vec::new(),
            merge_state: MergeState::Clean,
        }
    }

    /// Initialize a fresh repository at `path`, creating the directory if
    /// absent, and record an initial empty commit.
    pub async fn init(path: impl AsRef<Path>, subprocess: &SubprocessManager) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }

        let mut repo = Self::open(path, None, None, subprocess);

        let output = repo.run_git(&["init"]).await?;
        if classify::is_failure(&output) {
            return Err(GitError::NotARepository(path.to_path_buf()).into());
        }

        // A fresh repository has nothing to stage, so the initial commit must
        // be allowed to be empty.
        let output = repo
            .run_git(&["commit", "--allow-empty", "-m", INITIAL_COMMIT_MESSAGE])
            .await?;
        if classify::is_failure(&output) {
            return Err(
                GitError::CommandFailed(failure_detail("initial commit", &output)).into(),
            );
        }
        repo.record_head_commit(Some(INITIAL_COMMIT_MESSAGE)).await?;

        Ok(repo)
    }

    /// Clone `remote` into `path` using a credential-embedded URL built in
    /// memory for this single invocation.
    pub async fn clone(
        path: impl AsRef<Path>,
        remote: &str,
        creds: &Credentials,
        branch: Option<&str>,
        subprocess: &SubprocessManager,
    ) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            std::fs::create_dir_all(path)?;
        }

        let url = creds.authenticated_url(remote)?;
        let repo = Self::open(path, Some(remote.to_string()), None, subprocess);

        let args: Vec<&str> = match branch {
            Some(b) => vec!["clone", "-b", b, &url],
            None => vec!["clone", &url],
        };
        let output = repo.run_git(&args).await?;
        if classify::is_failure(&output) {
            return Err(GitError::CommandFailed(failure_detail("clone", &output)).into());
        }

        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn current_branch(&self) -> &str {
        &self.current_branch
    }

    /// Locally known branches, in creation order.
    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    /// The local commit mirror, oldest first.
    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }

    /// The last element of the commit mirror. Holds by construction after
    /// every mutating operation.
    pub fn latest_commit(&self) -> Option<&CommitRecord> {
        self.commits.last()
    }

    pub fn merge_state(&self) -> MergeState {
        self.merge_state
    }

    async fn run_git(&self, args: &[&str]) -> Result<ProcessOutput, ProcessError> {
        self.runner
            .run(
                ProcessCommandBuilder::new("git")
                    .args(args)
                    .current_dir(&self.path)
                    .build(),
            )
            .await
    }

    fn knows_branch(&self, name: &str) -> bool {
        self.branches.iter().any(|b| b == name)
    }

    // --- remotes ---

    /// Point an existing remote at a new URL.
    pub async fn set_remote(&mut self, url: &str, name: &str) -> Result<()> {
        let output = self.run_git(&["remote", "set-url", name, url]).await?;
        if classify::is_failure(&output) {
            return Err(GitError::RemoteNotExists(name.to_string()).into());
        }
        if name == "origin" {
            self.origin = Some(url.to_string());
        }
        Ok(())
    }

    /// Register a new remote.
    pub async fn add_remote(&mut self, url: &str, name: &str) -> Result<()> {
        let output = self.run_git(&["remote", "add", name, url]).await?;
        if classify::is_failure(&output) {
            return Err(GitError::RemoteAlreadyExists(name.to_string()).into());
        }
        if name == "origin" {
            self.origin = Some(url.to_string());
        }
        Ok(())
    }

    /// Configured remotes with their fetch/push URLs, as reported by the
    /// tool.
    pub async fn remotes(&self) -> Result<String> {
        let output = self.run_git(&["remote", "-v"]).await?;
        if classify::is_failure(&output) {
            return Err(GitError::CommandFailed(failure_detail("remote -v", &output)).into());
        }
        Ok(output.stdout)
    }

    // --- branches ---

    /// Branch listing as reported by the tool.
    pub async fn branch_list(&self) -> Result<String> {
        let output = self.run_git(&["branch"]).await?;
        if classify::is_failure(&output) {
            return Err(GitError::CommandFailed(failure_detail("branch", &output)).into());
        }
        Ok(output.stdout)
    }

    /// Switch branches, optionally creating the target first.
    ///
    /// The local mirror is consulted before the tool is invoked: creating a
    /// branch the mirror already knows, or switching to one it does not, fails
    /// immediately without spawning a process.
    pub async fn checkout(&mut self, name: &str, create: bool) -> Result<()> {
        let known = self.knows_branch(name);
        if create && known {
            return Err(GitError::BranchAlreadyExists(name.to_string()).into());
        }
        if !create && !known {
            return Err(GitError::BranchNotExists(name.to_string()).into());
        }

        let args: Vec<&str> = if create {
            vec!["checkout", "-b", name]
        } else {
            vec!["checkout", name]
        };
        let output = self.run_git(&args).await?;
        if classify::is_failure(&output) {
            let err = if create {
                GitError::BranchAlreadyExists(name.to_string())
            } else {
                GitError::BranchNotExists(name.to_string())
            };
            return Err(err.into());
        }

        if create {
            self.branches.push(name.to_string());
        }
        self.current_branch = name.to_string();
        Ok(())
    }

    /// Force-delete a branch. The currently checked-out branch cannot be
    /// deleted, keeping the mirror's `branches contains current_branch`
    /// invariant intact.
    pub async fn delete_branch(&mut self, name: &str) -> Result<()> {
        if !self.knows_branch(name) || name == self.current_branch {
            return Err(GitError::CannotDeleteBranch(name.to_string()).into());
        }

        let output = self.run_git(&["branch", "-D", name]).await?;
        if classify::is_failure(&output) {
            return Err(GitError::CannotDeleteBranch(name.to_string()).into());
        }

        self.branches.retain(|b| b != name);
        Ok(())
    }

    /// Rebuild the branch mirror from the tool's own state. Use after `git`
    /// has been invoked outside this facade.
    pub async fn sync_branches(&mut self) -> Result<()> {
        let output = self.run_git(&["branch"]).await?;
        if classify::is_failure(&output) {
            return Err(GitError::CommandFailed(failure_detail("branch", &output)).into());
        }

        let (branches, current) = parsers::parse_branch_list(&output.stdout);
        if !branches.is_empty() {
            self.branches = branches;
        }
        if let Some(current) = current {
            self.current_branch = current;
        }
        Ok(())
    }

    // --- staging and removal ---

    /// Stage all changes in the working tree.
    pub async fn stage_files(&self) -> Result<()> {
        let output = self.run_git(&["add", "-A"]).await?;
        if classify::is_failure(&output) {
            return Err(GitError::CommandFailed(failure_detail("add -A", &output)).into());
        }
        Ok(())
    }

    /// Remove files from the working tree and/or index.
    ///
    /// Returns `Ok(false)` without invoking the tool when the option
    /// combination has no supported argument shape (recursive removal with no
    /// pathspec).
    pub async fn remove_files(&self, options: &RemoveOptions) -> Result<bool> {
        let Some(args) = options.as_args() else {
            return Ok(false);
        };

        let output = self.run_git(&args).await?;
        if classify::is_failure(&output) {
            return Err(GitError::RemoveFailed.into());
        }
        Ok(true)
    }

    // --- commits, log, status ---

    /// Commit staged (or, with `auto_stage`, all tracked) changes and append
    /// the new head to the commit mirror.
    ///
    /// The hash is recovered by asking the tool for its most recent log entry
    /// and extracting the 40-hex identifier from it.
    pub async fn commit(&mut self, auto_stage: bool, message: Option<&str>) -> Result<CommitId> {
        let args: Vec<&str> = match (auto_stage, message) {
            (true, Some(m)) => vec!["commit", "-am", m],
            (false, Some(m)) => vec!["commit", "-m", m],
            (true, None) => vec!["commit", "-a", "--allow-empty-message", "-m", ""],
            (false, None) => vec!["commit", "--allow-empty-message", "-m", ""],
        };

        let output = self.run_git(&args).await?;
        if classify::is_failure(&output) {
            return Err(GitError::CommandFailed(failure_detail("commit", &output)).into());
        }

        self.record_head_commit(message).await
    }

    async fn record_head_commit(&mut self, message: Option<&str>) -> Result<CommitId> {
        let log = self.run_git(&["log", "-n", "1"]).await?;
        if classify::is_failure(&log) {
            return Err(GitError::NoCommits.into());
        }

        let hash = parsers::extract_commit_hash(&log.stdout).ok_or(GitError::NoCommits)?;
        let id = CommitId::new(hash);
        self.commits
            .push(CommitRecord::new(message.map(str::to_string), id.clone()));
        Ok(id)
    }

    /// Commit history as reported by the tool, optionally limited and
    /// formatted with a `--pretty=format:` string.
    pub async fn log(&self, limit: Option<usize>, format: Option<&str>) -> Result<String> {
        let mut args = vec!["log".to_string()];
        if let Some(limit) = limit {
            args.push("-n".to_string());
            args.push(limit.to_string());
        }
        if let Some(format) = format {
            args.push(format!("--pretty=format:{format}"));
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.run_git(&arg_refs).await?;
        if classify::is_failure(&output) {
            return Err(GitError::NoCommits.into());
        }
        Ok(output.stdout)
    }

    /// Working-tree status in the requested format.
    pub async fn status(&self, format: StatusFormat) -> Result<String> {
        let output = self.run_git(format.as_args()).await?;
        if classify::is_failure(&output) {
            return Err(GitError::CommandFailed(failure_detail("status", &output)).into());
        }
        Ok(output.stdout)
    }

    /// Append entries to the checkout's `.gitignore`, one per line.
    ///
    /// Returns `Ok(false)` for an empty list. The file handle is scoped to
    /// this call.
    pub fn append_ignore(&self, lines: &[&str]) -> Result<bool> {
        if lines.is_empty() {
            return Ok(false);
        }

        let path = self.path.join(".gitignore");
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        for line in lines {
            writeln!(file, "{line}")?;
        }
        Ok(true)
    }

    /// Reset the head to `target` and truncate the commit mirror to end at
    /// the matching record.
    ///
    /// `target` may be any hash prefix git accepts. Tool rejection maps to
    /// [`GitError::UnknownRevision`] regardless of what the mirror holds; a
    /// successful reset whose target is missing from the mirror leaves the
    /// mirror untouched and logs the drift.
    pub async fn reset(&mut self, mode: ResetMode, target: &str) -> Result<()> {
        let output = self.run_git(&["reset", mode.as_flag(), target]).await?;
        if classify::is_failure(&output) {
            return Err(GitError::UnknownRevision(target.to_string()).into());
        }

        match self
            .commits
            .iter()
            .position(|record| record.id().matches_prefix(target))
        {
            Some(index) => self.commits.truncate(index + 1),
            None => tracing::warn!(
                "reset target {target} is not in the local commit mirror; mirror left as-is"
            ),
        }
        Ok(())
    }

    // --- merge lifecycle ---

    /// Merge `branch` into the current branch.
    ///
    /// An implicit commit labelled "About to merge {branch}" is attempted
    /// first so the merge starts from a recorded point; its failure (for
    /// example, nothing to commit) is tolerated. Raw merge output goes to the
    /// diagnostic channel. A detected conflict moves the repository to
    /// [`MergeState::Conflicted`], recoverable via [`Repo::continue_merge`]
    /// or [`Repo::abort_merge`].
    pub async fn merge(&mut self, branch: &str, auto_commit: bool) -> Result<()> {
        let checkpoint = format!("About to merge {branch}");
        if let Err(err) = self.commit(true, Some(&checkpoint)).await {
            tracing::debug!("pre-merge commit skipped: {err:#}");
        }

        let args: Vec<&str> = if auto_commit {
            vec!["merge", branch]
        } else {
            vec!["merge", "--no-commit", branch]
        };
        let output = self.run_git(&args).await?;
        classify::surface("merge", &output);

        if classify::has_conflict_marker(&output) {
            self.merge_state = MergeState::Conflicted;
            return Err(GitError::MergeConflict.into());
        }
        if classify::is_unmergeable(&output) || classify::is_failure(&output) {
            return Err(GitError::MergeFailed(branch.to_string()).into());
        }

        self.merge_state = MergeState::Clean;
        Ok(())
    }

    /// Abort an in-progress merge and return to a clean state.
    pub async fn abort_merge(&mut self) -> Result<()> {
        let output = self.run_git(&["merge", "--abort"]).await?;
        classify::surface("merge --abort", &output);

        if classify::is_failure(&output) {
            return Err(GitError::MergeFailed("No merge to abort".to_string()).into());
        }

        self.merge_state = MergeState::Clean;
        Ok(())
    }

    /// Conclude an in-progress merge after conflicts have been resolved.
    pub async fn continue_merge(&mut self) -> Result<()> {
        let output = self.run_git(&["merge", "--continue"]).await?;
        classify::surface("merge --continue", &output);

        if classify::has_conflict_marker(&output) {
            self.merge_state = MergeState::Conflicted;
            return Err(GitError::MergeConflict.into());
        }
        if classify::is_failure(&output) {
            return Err(GitError::MergeFailed("No merge to continue".to_string()).into());
        }

        self.merge_state = MergeState::Clean;
        Ok(())
    }

    // --- remote transport ---

    /// Push to `remote` (a URL) over a credential-embedded URL built in
    /// memory. Pushes `HEAD:{branch}`, or every branch with `all`.
    pub async fn push(
        &mut self,
        creds: &Credentials,
        remote: &str,
        branch: &str,
        all: bool,
    ) -> Result<()> {
        let url = creds.authenticated_url(remote)?;
        let refspec = format!("HEAD:{branch}");
        let args: Vec<&str> = if all {
            vec!["push", &url, "--all"]
        } else {
            vec!["push", &url, &refspec]
        };

        let output = self.run_git(&args).await?;
        if classify::is_failure(&output) {
            return Err(GitError::PushFailed {
                remote: remote.to_string(),
                branch: branch.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Pull `branch` (defaulting to master) from `remote` over a
    /// credential-embedded URL built in memory.
    pub async fn pull(
        &mut self,
        remote: &str,
        creds: &Credentials,
        branch: Option<&str>,
    ) -> Result<()> {
        let url = creds.authenticated_url(remote)?;
        let branch = branch.unwrap_or(DEFAULT_BRANCH);

        let output = self.run_git(&["pull", &url, branch]).await?;
        if classify::is_failure(&output) {
            return Err(GitError::PullFailed.into());
        }
        Ok(())
    }
}

impl std::fmt::Display for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}, with the local repository at {} and origin at {}",
            self.name.as_deref().unwrap_or("unnamed repository"),
            self.path.display(),
            self.origin.as_deref().unwrap_or("no origin"),
        )
    }
}

/// Configure the tool's committer identity, locally (process working
/// directory) or globally.
pub async fn set_identity(
    subprocess: &SubprocessManager,
    name: &str,
    email: &str,
    global: bool,
) -> Result<()> {
    let scope: &[&str] = if global { &["--global"] } else { &[] };

    for (key, value) in [("user.name", name), ("user.email", email)] {
        let mut args = vec!["config"];
        args.extend_from_slice(scope);
        args.push(key);
        args.push(value);

        let output = run_bare_git(subprocess, &args).await?;
        if classify::is_failure(&output) {
            return Err(GitError::CommandFailed(failure_detail("config", &output)).into());
        }
    }
    Ok(())
}

/// The tool's own help text, for display purposes only.
pub async fn help(subprocess: &SubprocessManager) -> Result<String> {
    let output = run_bare_git(subprocess, &["help"]).await?;
    if classify::is_failure(&output) {
        return Err(GitError::CommandFailed(failure_detail("help", &output)).into());
    }
    Ok(output.stdout)
}

async fn run_bare_git(
    subprocess: &SubprocessManager,
    args: &[&str],
) -> Result<ProcessOutput, ProcessError> {
    subprocess
        .runner()
        .run(ProcessCommandBuilder::new("git").args(args).build())
        .await
}

fn failure_detail(operation: &str, output: &ProcessOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("{operation} exited with status {:?}", output.status)
    } else {
        format!("{operation}: {stderr}")
    }
}

#[cfg(test)]
mod tests;
