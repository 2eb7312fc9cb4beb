//! # Gitshim
//!
//! A thin, typed facade over the `git` command-line tool. Every operation
//! shells out to `git`, captures its output, classifies failures into a
//! tagged error taxonomy, and keeps a best-effort in-memory mirror of
//! repository state (branches, commit history, current branch).
//!
//! ## Modules
//!
//! - `git` - The repository facade, error taxonomy, and output parsers
//! - `subprocess` - Unified subprocess abstraction layer for testing
//!
//! ## Example
//!
//! ```no_run
//! use gitshim::git::Repo;
//! use gitshim::subprocess::SubprocessManager;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let subprocess = SubprocessManager::production();
//! let mut repo = Repo::init("/tmp/scratch", &subprocess).await?;
//! repo.checkout("feature", true).await?;
//! repo.commit(true, Some("first change")).await?;
//! # Ok(())
//! # }
//! ```
pub mod git;
pub mod subprocess;
