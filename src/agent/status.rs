//! StatusReporter: on-demand bot status document.

use crate::error::RepoError;
use crate::llm::{UsageAccumulator, UsageSnapshot};
use crate::repo::{RepoStatus, RepoSync};

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Upper bound on waiting for the repository while building a report.
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the status report from repository state, usage totals, and uptime.
pub struct StatusReporter {
    repo: Arc<dyn RepoSync>,
    usage: Arc<UsageAccumulator>,
    started_at: Instant,
}

impl StatusReporter {
    pub fn new(repo: Arc<dyn RepoSync>, usage: Arc<UsageAccumulator>) -> Self {
        Self {
            repo,
            usage,
            started_at: Instant::now(),
        }
    }

    /// Render the current report.
    ///
    /// A failing repository is rendered inline; only a repository that does
    /// not answer within [`STATUS_TIMEOUT`] fails the report.
    pub async fn report(&self) -> crate::Result<String> {
        let git = tokio::time::timeout(STATUS_TIMEOUT, self.repo.status())
            .await
            .map_err(|_| {
                anyhow::anyhow!(
                    "repository status timed out after {}s",
                    STATUS_TIMEOUT.as_secs()
                )
            })?;

        if let Err(error) = &git {
            tracing::warn!(%error, "git status unavailable for report");
        }

        Ok(render(&git, self.usage.snapshot(), self.started_at.elapsed()))
    }
}

fn render(
    git: &Result<RepoStatus, RepoError>,
    usage: UsageSnapshot,
    uptime: Duration,
) -> String {
    let mut output = String::from("# Bot Status\n\n");

    match git {
        Ok(status) => {
            output.push_str("## Git Information\n");
            output.push_str(&format!("**Branch:** {}\n", status.branch));
            if let Some(tracking) = &status.tracking {
                output.push_str(&format!("**Tracking:** {tracking}\n"));
            }
            if status.clean {
                output.push_str("**Status:** Clean\n");
            } else {
                let count = status.modified.len();
                let plural = if count == 1 { "" } else { "s" };
                output.push_str(&format!("**Status:** Modified ({count} file{plural})\n"));
                if !status.modified.is_empty() {
                    output.push_str("\n**Modified Files:**\n");
                    for path in &status.modified {
                        output.push_str(&format!("- {path}\n"));
                    }
                }
            }
            output.push('\n');
        }
        Err(error) => {
            output.push_str(&format!("**Git:** Error: {}\n\n", error.message));
        }
    }

    output.push_str("## Completion Usage\n");
    output.push_str(&format!(
        "**Input Tokens:** {}\n",
        format_number(usage.input_tokens)
    ));
    output.push_str(&format!(
        "**Output Tokens:** {}\n",
        format_number(usage.output_tokens)
    ));
    output.push_str(&format!(
        "**Total Tokens:** {}\n\n",
        format_number(usage.total_tokens)
    ));

    output.push_str("## Uptime\n");
    output.push_str(&format!("**Uptime:** {}\n", format_uptime(uptime)));

    output
}

/// `1h 2m 3s`, `2m 3s`, or `3s`.
pub fn format_uptime(uptime: Duration) -> String {
    let seconds = uptime.as_secs();
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Group digits in threes with commas.
pub fn format_number(value: u64) -> String {
    let digits = value.to_string();
    let mut output = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            output.push(',');
        }
        output.push(digit);
    }
    output
}
