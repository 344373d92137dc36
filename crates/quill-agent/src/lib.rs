//! Code-generation agent capability set and the file-based task handoff.
//!
//! The orchestration core talks to a [`CodingAgent`]; the shipped
//! implementation drives an external CLI in headless mode through YAML task
//! files under `.quill/`. A [`StubAgent`] backs development and tests.

pub mod handoff;
pub mod headless;
pub mod stub;

use async_trait::async_trait;

use quill_platform::{Comment, Issue};

pub use handoff::{HandoffOutcome, ReviewTodoItem};
pub use headless::{HeadlessAgentConfig, HeadlessCliAgent};
pub use stub::StubAgent;

/// Verdict of the pre-flight sufficiency check: when the issue does not
/// carry enough information to implement, `clarification` holds the question
/// to post back to the author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SufficiencyVerdict {
    pub sufficient: bool,
    pub clarification: Option<String>,
}

impl SufficiencyVerdict {
    pub fn sufficient() -> Self {
        Self {
            sufficient: true,
            clarification: None,
        }
    }

    pub fn insufficient(clarification: impl Into<String>) -> Self {
        Self {
            sufficient: false,
            clarification: Some(clarification.into()),
        }
    }
}

/// Capability set the orchestration core consumes. One concrete backend per
/// agent; errors are folded into no-progress by the callers.
#[async_trait]
pub trait CodingAgent: Send + Sync {
    /// Decides whether the issue carries enough information to implement.
    async fn evaluate_sufficiency(&self, issue: &Issue, comments: &[Comment]) -> SufficiencyVerdict;

    /// Produces a short implementation plan for the confirmation comment.
    async fn generate_plan(&self, issue: &Issue, comments: &[Comment]) -> anyhow::Result<String>;

    /// Runs one code-generation round. Returns the report body when the
    /// agent handed one back directly; `None` when it wrote files (or
    /// nothing) and the outcome must be resolved from disk.
    async fn generate_code(
        &self,
        issue: &Issue,
        comments: &[Comment],
    ) -> anyhow::Result<Option<String>>;

    /// Handles one review item (1-based `current_index` into `items`).
    /// Returns the reply text to post on the comment thread, if any.
    async fn process_review_item(
        &self,
        pr_number: u64,
        issue_number: u64,
        items: &[ReviewTodoItem],
        current_index: usize,
    ) -> anyhow::Result<Option<String>>;
}
