//! Record shapes persisted by the entity store.

use serde::{Deserialize, Serialize};

/// Issue lifecycle state. Transitions are gated by the dispatcher and
/// worker; re-applying a transition whose precondition no longer holds is a
/// no-op rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    PendingPlan,
    WaitingConfirmation,
    Queued,
    InProgress,
    Done,
    Failed,
    Closed,
}

impl IssueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::PendingPlan => "pending_plan",
            IssueStatus::WaitingConfirmation => "waiting_confirmation",
            IssueStatus::Queued => "queued",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Done => "done",
            IssueStatus::Failed => "failed",
            IssueStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single entry in the issue thread (user comment or bot reply).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThreadComment {
    /// Platform comment id, present for mirrored comments so later edit and
    /// delete events can find the entry. Synthesized entries omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<u64>,
    pub author: String,
    pub content: String,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<u64>,
}

/// Full issue record as stored in `.quill/issues/{issue_id}.yaml`.
///
/// Field order is the serialization order; keep it stable for diffability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IssueRecord {
    pub repo: String,
    pub issue_id: u64,
    pub author: String,
    pub title: String,
    pub description: String,
    pub status: IssueStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default)]
    pub comments: Vec<ThreadComment>,
}

impl IssueRecord {
    /// Renders the record as markdown (title, description, thread) for
    /// human inspection and agent context.
    pub fn to_markdown(&self) -> String {
        let mut lines = vec![format!("# Issue {}", self.issue_id), String::new()];
        lines.push("## Title".to_string());
        lines.push(if self.title.is_empty() {
            "(no title)".to_string()
        } else {
            self.title.clone()
        });
        lines.push(String::new());
        lines.push("## Description".to_string());
        lines.push(if self.description.is_empty() {
            "(no description)".to_string()
        } else {
            self.description.clone()
        });
        lines.push(String::new());
        if !self.comments.is_empty() {
            lines.push("## Comments".to_string());
            lines.push(String::new());
            for comment in &self.comments {
                lines.push(format!("### {}", comment.author));
                lines.push(String::new());
                lines.push(comment.content.clone());
                lines.push(String::new());
            }
        }
        let mut rendered = lines.join("\n");
        let trimmed_len = rendered.trim_end().len();
        rendered.truncate(trimmed_len);
        rendered.push('\n');
        rendered
    }
}

/// Pull-request lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrStatus {
    Open,
    Merged,
    Closed,
}

impl PrStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PrStatus::Open => "open",
            PrStatus::Merged => "merged",
            PrStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for PrStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pull-request record as stored in `.quill/prs/{pr_id}.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrRecord {
    pub pr_id: u64,
    pub repo: String,
    pub status: PrStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_issue_id: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
}
