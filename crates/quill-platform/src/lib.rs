//! Git-hosting platform capability set and its GitHub implementation.
//!
//! Orchestration code depends only on the [`HostingPlatform`] trait; every
//! call surfaces failures as one uniform [`PlatformError`] carrying the
//! numeric status and message, so callers can catch-and-log at the site
//! nearest the action.

pub mod github;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use github::GithubPlatform;
pub use models::{Comment, Issue, PullRequest, ReviewComment};

/// Uniform error for any platform API failure. `status` is the HTTP status
/// for API-level failures and 0 for transport-level ones.
#[derive(Debug, Clone, Error)]
#[error("platform error {status}: {message}")]
pub struct PlatformError {
    pub status: u16,
    pub message: String,
}

impl PlatformError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }
}

pub type PlatformResult<T> = Result<T, PlatformError>;

/// Capability set consumed by the orchestration core.
///
/// One concrete implementation per hosting platform; `repo` is always the
/// `owner/name` form.
#[async_trait]
pub trait HostingPlatform: Send + Sync {
    async fn get_issue(&self, repo: &str, issue_number: u64) -> PlatformResult<Issue>;

    /// Comments on an issue in thread order; `since` is an RFC3339 lower
    /// bound when present.
    async fn get_issue_comments(
        &self,
        repo: &str,
        issue_number: u64,
        since: Option<&str>,
    ) -> PlatformResult<Vec<Comment>>;

    async fn create_comment(&self, repo: &str, issue_number: u64, body: &str)
        -> PlatformResult<()>;

    /// Replaces the full label set on an issue.
    async fn set_labels(&self, repo: &str, issue_number: u64, labels: &[&str])
        -> PlatformResult<()>;

    /// Creates a branch from `base` (default branch when `None`). A branch
    /// that already exists surfaces as a `PlatformError` with the
    /// platform's conflict status; callers tolerate that case.
    async fn create_branch(
        &self,
        repo: &str,
        branch: &str,
        base: Option<&str>,
    ) -> PlatformResult<()>;

    async fn get_default_branch(&self, repo: &str) -> PlatformResult<String>;

    async fn create_pr(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> PlatformResult<PullRequest>;

    async fn get_pr(&self, repo: &str, pr_number: u64) -> PlatformResult<PullRequest>;

    async fn list_open_issues(&self, repo: &str) -> PlatformResult<Vec<Issue>>;

    async fn list_review_comments(
        &self,
        repo: &str,
        pr_number: u64,
    ) -> PlatformResult<Vec<ReviewComment>>;

    async fn reply_to_review_comment(
        &self,
        repo: &str,
        pr_number: u64,
        comment_id: u64,
        body: &str,
    ) -> PlatformResult<()>;
}
