//! Managed source checkout kept in sync with its remote.

pub mod git;

pub use git::GitRepo;

use crate::error::RepoError;

/// Working tree state for the status report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RepoStatus {
    pub branch: String,
    pub clean: bool,
    /// Paths with staged, unstaged, or untracked changes.
    pub modified: Vec<String>,
    /// Upstream branch, when one is configured.
    pub tracking: Option<String>,
}

/// How the checkout relates to its upstream after a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateInfo {
    pub has_updates: bool,
    pub behind: u64,
    pub ahead: u64,
}

/// Outcome of a pull.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PullResult {
    pub updated: bool,
    pub summary: String,
    pub files: Vec<String>,
}

/// Version-control collaborator used by the orchestrator and status report.
#[async_trait::async_trait]
pub trait RepoSync: Send + Sync + 'static {
    /// Clone the repository, or reuse an existing checkout.
    async fn initialize(&self) -> Result<(), RepoError>;

    async fn status(&self) -> Result<RepoStatus, RepoError>;

    /// Fetch and compare against the upstream branch.
    async fn check_for_updates(&self) -> Result<UpdateInfo, RepoError>;

    async fn pull_changes(&self) -> Result<PullResult, RepoError>;
}
