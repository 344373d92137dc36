//! Local working-tree operations via the `git` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

const GIT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {args} failed: {stderr}")]
    CommandFailed { args: String, stderr: String },
    #[error("git executable not found")]
    NotFound,
    #[error("git {args} timed out")]
    TimedOut { args: String },
}

/// One shared local working tree. Checkout, pull, and commit/push all run
/// here; callers serialize access by construction (webhook path, scheduler,
/// and worker each own their flow).
#[derive(Debug, Clone)]
pub struct GitWorkspace {
    repo_dir: PathBuf,
}

impl GitWorkspace {
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
        }
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    async fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let rendered = args.join(" ");
        let mut command = tokio::process::Command::new("git");
        command
            .args(args)
            .current_dir(&self.repo_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let child = command.spawn().map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                GitError::NotFound
            } else {
                GitError::CommandFailed {
                    args: rendered.clone(),
                    stderr: error.to_string(),
                }
            }
        })?;
        let output = match tokio::time::timeout(GIT_TIMEOUT, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                return Err(GitError::CommandFailed {
                    args: rendered,
                    stderr: error.to_string(),
                })
            }
            Err(_) => return Err(GitError::TimedOut { args: rendered }),
        };
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let detail = if stderr.is_empty() { stdout.trim().to_string() } else { stderr };
            return Err(GitError::CommandFailed {
                args: rendered,
                stderr: detail,
            });
        }
        Ok(stdout)
    }

    /// `git pull origin <branch>`. Used after a merged PR so the bot picks
    /// up its own changes before restarting.
    pub async fn pull(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["pull", "origin", branch]).await?;
        info!(branch, "pulled origin branch");
        Ok(())
    }

    /// `git fetch origin <branch>` then checkout; the branch must exist on
    /// the remote.
    pub async fn fetch_and_checkout(&self, branch: &str) -> Result<(), GitError> {
        self.run(&["fetch", "origin", branch]).await?;
        self.run(&["checkout", branch]).await?;
        info!(branch, "checked out branch");
        Ok(())
    }

    /// Checkout a branch that exists locally or on the remote; fetches on
    /// a first failed attempt.
    pub async fn checkout(&self, branch: &str) -> Result<(), GitError> {
        if let Err(error) = self.run(&["checkout", branch]).await {
            warn!(branch, %error, "checkout failed, fetching and retrying");
            self.run(&["fetch", "origin", branch]).await?;
            self.run(&["checkout", branch]).await?;
        }
        info!(branch, "checked out branch");
        Ok(())
    }

    /// Stages everything, commits under the bot identity, and pushes the
    /// branch. Returns `false` when there was nothing to commit, which is
    /// an expected outcome, not an error.
    pub async fn commit_all_and_push(
        &self,
        branch: &str,
        message: &str,
        author_name: &str,
        author_email: &str,
    ) -> Result<bool, GitError> {
        self.run(&["add", "-A"]).await?;
        let user_name = format!("user.name={author_name}");
        let user_email = format!("user.email={author_email}");
        let commit = self
            .run(&["-c", &user_name, "-c", &user_email, "commit", "-m", message])
            .await;
        if let Err(error) = commit {
            let detail = error.to_string().to_lowercase();
            if detail.contains("nothing to commit") || detail.contains("no changes") {
                info!(branch, "nothing to commit, working tree clean");
                return Ok(false);
            }
            return Err(error);
        }
        self.run(&["push", "origin", branch]).await?;
        info!(branch, "pushed branch to origin");
        Ok(true)
    }
}
