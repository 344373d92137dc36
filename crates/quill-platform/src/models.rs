//! Live platform objects as consumed by the orchestration core.
//!
//! Timestamps stay in the RFC3339 form the platform emits; the store layer
//! converts to Unix seconds when mirroring into records.

/// Issue fetched from the hosting platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub author: String,
    pub labels: Vec<String>,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub body: String,
    pub author: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Pull request (or merge request).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub head_branch: String,
    pub base_branch: String,
    pub state: String,
    pub html_url: Option<String>,
}

/// Line-level (or file-level) comment on a pull-request review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewComment {
    pub id: u64,
    pub body: String,
    pub author: String,
    pub path: String,
    pub line: Option<u64>,
    pub side: String,
    pub created_at: String,
    pub in_reply_to_id: Option<u64>,
}
