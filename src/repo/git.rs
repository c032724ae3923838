//! `git` command-line implementation of [`RepoSync`].

use crate::error::{RepoError, RepoOperation};
use crate::redact::redact;
use crate::repo::{PullResult, RepoStatus, RepoSync, UpdateInfo};

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const GITHUB_HTTPS_PREFIX: &str = "https://github.com/";

/// A checkout at `path`, cloned from `url` on first start.
#[derive(Debug, Clone)]
pub struct GitRepo {
    url: String,
    token: Option<String>,
    path: PathBuf,
}

impl GitRepo {
    pub fn new(url: impl Into<String>, token: Option<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            token,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `git` inside the checkout and return trimmed stdout.
    async fn git(&self, operation: RepoOperation, args: &[&str]) -> Result<String, RepoError> {
        run_git(Some(&self.path), operation, args).await
    }

    async fn count(&self, operation: RepoOperation, range: &str) -> Result<u64, RepoError> {
        let output = self.git(operation, &["rev-list", "--count", range]).await?;
        parse_count(&output).ok_or_else(|| RepoError {
            operation,
            message: format!("unexpected rev-list output: {output}"),
        })
    }
}

#[async_trait::async_trait]
impl RepoSync for GitRepo {
    async fn initialize(&self) -> Result<(), RepoError> {
        let display_url = redact(&self.url);

        if self.path.join(".git").exists() {
            tracing::info!(
                repository = %display_url,
                path = %self.path.display(),
                "repository already exists, skipping clone"
            );
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| RepoError {
                    operation: RepoOperation::Init,
                    message: format!("failed to create {}: {error}", parent.display()),
                })?;
        }

        tracing::info!(
            repository = %display_url,
            path = %self.path.display(),
            "cloning repository"
        );

        let url = build_authenticated_url(&self.url, self.token.as_deref());
        let target = self.path.display().to_string();
        run_git(None, RepoOperation::Init, &["clone", &url, &target]).await?;

        tracing::info!(path = %self.path.display(), "repository cloned");
        Ok(())
    }

    async fn status(&self) -> Result<RepoStatus, RepoError> {
        let output = self
            .git(RepoOperation::Status, &["status", "--porcelain=v1", "--branch"])
            .await?;
        Ok(parse_porcelain_status(&output))
    }

    async fn check_for_updates(&self) -> Result<UpdateInfo, RepoError> {
        self.git(RepoOperation::Check, &["fetch", "--quiet"]).await?;

        let branch = self
            .git(RepoOperation::Check, &["rev-parse", "--abbrev-ref", "HEAD"])
            .await?;
        let upstream = format!("origin/{branch}");

        let behind = self
            .count(RepoOperation::Check, &format!("HEAD..{upstream}"))
            .await?;
        let ahead = self
            .count(RepoOperation::Check, &format!("{upstream}..HEAD"))
            .await?;

        let info = UpdateInfo {
            has_updates: behind > 0,
            behind,
            ahead,
        };
        tracing::info!(branch = %branch, behind, ahead, "git update check complete");
        Ok(info)
    }

    async fn pull_changes(&self) -> Result<PullResult, RepoError> {
        let head_before = self.git(RepoOperation::Pull, &["rev-parse", "HEAD"]).await?;
        let commits_before = self.count(RepoOperation::Pull, "HEAD").await?;

        self.git(RepoOperation::Pull, &["pull", "--ff-only", "--quiet"])
            .await?;

        let commits_after = self.count(RepoOperation::Pull, "HEAD").await?;
        let new_commits = commits_after.saturating_sub(commits_before);

        let files = if new_commits > 0 {
            let range = format!("{head_before}..HEAD");
            self.git(RepoOperation::Pull, &["diff", "--name-only", &range])
                .await?
                .lines()
                .map(str::to_string)
                .collect()
        } else {
            Vec::new()
        };

        let result = summarize_pull(new_commits, files);
        tracing::info!(
            updated = result.updated,
            commits = new_commits,
            files = result.files.len(),
            "git pull complete"
        );
        Ok(result)
    }
}

async fn run_git(
    dir: Option<&Path>,
    operation: RepoOperation,
    args: &[&str],
) -> Result<String, RepoError> {
    let mut command = Command::new("git");
    command
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = dir {
        command.current_dir(dir);
    }

    let output = command.output().await.map_err(|error| RepoError {
        operation,
        message: format!("failed to run git: {error}"),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = redact(stderr.trim());
        tracing::debug!(%operation, %message, "git command failed");
        return Err(RepoError { operation, message });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Insert `token` as credentials into GitHub HTTPS URLs. Other URLs are
/// returned unchanged.
pub fn build_authenticated_url(url: &str, token: Option<&str>) -> String {
    match (token, url.strip_prefix(GITHUB_HTTPS_PREFIX)) {
        (Some(token), Some(rest)) if !token.is_empty() => {
            format!("https://{token}@github.com/{rest}")
        }
        _ => url.to_string(),
    }
}

/// Parse `git rev-list --count` output.
pub fn parse_count(output: &str) -> Option<u64> {
    output.trim().parse().ok()
}

/// Parse `git status --porcelain=v1 --branch`.
pub fn parse_porcelain_status(output: &str) -> RepoStatus {
    let mut lines = output.lines();
    let mut status = RepoStatus {
        branch: "unknown".into(),
        clean: true,
        ..RepoStatus::default()
    };

    if let Some(header) = lines.next().and_then(|line| line.strip_prefix("## ")) {
        let (branch, tracking) = parse_branch_header(header);
        status.branch = branch;
        status.tracking = tracking;
    }

    status.modified = lines
        .filter(|line| line.len() > 3)
        .map(|line| {
            let path = &line[3..];
            // Renames are reported as `old -> new`.
            path.rsplit_once(" -> ")
                .map_or(path, |(_, new)| new)
                .to_string()
        })
        .collect();
    status.clean = status.modified.is_empty();
    status
}

fn parse_branch_header(header: &str) -> (String, Option<String>) {
    if let Some(branch) = header.strip_prefix("No commits yet on ") {
        return (branch.to_string(), None);
    }
    if header.starts_with("HEAD (no branch)") {
        return ("HEAD".to_string(), None);
    }

    // `main...origin/main [ahead 1, behind 2]`
    let without_counts = header.split(" [").next().unwrap_or(header);
    match without_counts.split_once("...") {
        Some((branch, tracking)) => (branch.to_string(), Some(tracking.to_string())),
        None => (without_counts.to_string(), None),
    }
}

fn summarize_pull(new_commits: u64, files: Vec<String>) -> PullResult {
    let updated = new_commits > 0 || !files.is_empty();
    let summary = if updated {
        format!(
            "Updated: {new_commits} commits, {} files changed",
            files.len()
        )
    } else {
        "Already up to date".to_string()
    };
    PullResult {
        updated,
        summary,
        files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injects_token_into_github_urls_only() {
        assert_eq!(
            build_authenticated_url("https://github.com/acme/app.git", Some("ghp_x")),
            "https://ghp_x@github.com/acme/app.git"
        );
        assert_eq!(
            build_authenticated_url("https://gitlab.com/acme/app.git", Some("ghp_x")),
            "https://gitlab.com/acme/app.git"
        );
        assert_eq!(
            build_authenticated_url("https://github.com/acme/app.git", None),
            "https://github.com/acme/app.git"
        );
    }

    #[test]
    fn parses_counts_strictly() {
        assert_eq!(parse_count("3\n"), Some(3));
        assert_eq!(parse_count("0"), Some(0));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("abc123\ndef456"), None);
    }

    #[test]
    fn parses_clean_tracking_branch() {
        let status = parse_porcelain_status("## main...origin/main");
        assert_eq!(
            status,
            RepoStatus {
                branch: "main".into(),
                clean: true,
                modified: vec![],
                tracking: Some("origin/main".into()),
            }
        );
    }

    #[test]
    fn parses_dirty_tree_with_renames() {
        let output = "## feature...origin/feature [ahead 2]\n M src/lib.rs\n?? notes.txt\nR  old.rs -> new.rs";
        let status = parse_porcelain_status(output);
        assert_eq!(status.branch, "feature");
        assert_eq!(status.tracking.as_deref(), Some("origin/feature"));
        assert!(!status.clean);
        assert_eq!(status.modified, vec!["src/lib.rs", "notes.txt", "new.rs"]);
    }

    #[test]
    fn parses_unusual_headers() {
        assert_eq!(parse_porcelain_status("## No commits yet on main").branch, "main");
        assert_eq!(parse_porcelain_status("## HEAD (no branch)").branch, "HEAD");
        assert_eq!(parse_porcelain_status("## local-only").tracking, None);
    }

    #[test]
    fn summarizes_pulls() {
        assert_eq!(summarize_pull(0, vec![]).summary, "Already up to date");
        let result = summarize_pull(2, vec!["a.rs".into(), "b.rs".into(), "c.rs".into()]);
        assert!(result.updated);
        assert_eq!(result.summary, "Updated: 2 commits, 3 files changed");
    }

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|output| output.status.success())
    }

    fn git_sync(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args([
                "-c",
                "user.name=Test",
                "-c",
                "user.email=test@example.com",
                "-c",
                "commit.gpgsign=false",
            ])
            .args(args)
            .current_dir(dir)
            .output()
            .expect("run git");
        assert!(status.status.success(), "git {args:?} failed");
    }

    #[tokio::test]
    async fn reuses_existing_checkout() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join(".git")).expect("mkdir");

        let repo = GitRepo::new("https://github.com/acme/app.git", None, dir.path());

        tokio_test::assert_ok!(repo.initialize().await);
    }

    #[tokio::test]
    async fn clones_fetches_and_pulls_from_a_local_remote() {
        if !git_available() {
            return;
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let origin = dir.path().join("origin");
        std::fs::create_dir(&origin).expect("mkdir");
        git_sync(&origin, &["init", "--quiet"]);
        std::fs::write(origin.join("README.md"), "hello\n").expect("write");
        git_sync(&origin, &["add", "."]);
        git_sync(&origin, &["commit", "--quiet", "-m", "initial"]);

        let checkout = dir.path().join("work").join("checkout");
        let repo = GitRepo::new(origin.display().to_string(), None, &checkout);
        repo.initialize().await.expect("clone");

        let status = repo.status().await.expect("status");
        assert!(status.clean);
        assert!(status.tracking.is_some());

        let info = repo.check_for_updates().await.expect("check");
        assert_eq!(info, UpdateInfo::default());

        std::fs::write(origin.join("CHANGELOG.md"), "v2\n").expect("write");
        git_sync(&origin, &["add", "."]);
        git_sync(&origin, &["commit", "--quiet", "-m", "second"]);

        let info = repo.check_for_updates().await.expect("check");
        assert!(info.has_updates);
        assert_eq!(info.behind, 1);
        assert_eq!(info.ahead, 0);

        let pulled = repo.pull_changes().await.expect("pull");
        assert!(pulled.updated);
        assert_eq!(pulled.files, vec!["CHANGELOG.md"]);
        assert_eq!(pulled.summary, "Updated: 1 commits, 1 files changed");
    }

    #[tokio::test]
    async fn git_failures_carry_the_operation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = GitRepo::new("unused", None, dir.path().join("missing"));

        let error = tokio_test::assert_err!(repo.status().await);

        assert_eq!(error.operation, RepoOperation::Status);
    }
}
