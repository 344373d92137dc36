//! No-op agent backend for development and tests.

use async_trait::async_trait;

use quill_platform::{Comment, Issue};

use crate::handoff::ReviewTodoItem;
use crate::{CodingAgent, SufficiencyVerdict};

/// Agent that judges sufficiency by an optional body-length threshold and
/// never produces code. Lets the whole pipeline run without a real CLI.
#[derive(Debug, Default)]
pub struct StubAgent {
    min_body_length: Option<usize>,
}

impl StubAgent {
    pub fn new(min_body_length: Option<usize>) -> Self {
        Self { min_body_length }
    }
}

#[async_trait]
impl CodingAgent for StubAgent {
    async fn evaluate_sufficiency(&self, issue: &Issue, _comments: &[Comment]) -> SufficiencyVerdict {
        match self.min_body_length {
            Some(minimum) if issue.body.trim().chars().count() < minimum => {
                SufficiencyVerdict::insufficient(
                    "Please add more details: what should be implemented and acceptance criteria.",
                )
            }
            _ => SufficiencyVerdict::sufficient(),
        }
    }

    async fn generate_plan(&self, issue: &Issue, _comments: &[Comment]) -> anyhow::Result<String> {
        Ok(format!(
            "1. Analyze issue #{}\n2. Implement\n3. Test",
            issue.number
        ))
    }

    async fn generate_code(
        &self,
        _issue: &Issue,
        _comments: &[Comment],
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    async fn process_review_item(
        &self,
        _pr_number: u64,
        _issue_number: u64,
        _items: &[ReviewTodoItem],
        _current_index: usize,
    ) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(body: &str) -> Issue {
        Issue {
            number: 1,
            title: "t".to_string(),
            body: body.to_string(),
            author: "alice".to_string(),
            labels: vec![],
            state: "open".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn unit_stub_threshold_is_optional() {
        let lax = StubAgent::new(None);
        assert!(lax.evaluate_sufficiency(&issue(""), &[]).await.sufficient);

        let strict = StubAgent::new(Some(10));
        assert!(!strict.evaluate_sufficiency(&issue("short"), &[]).await.sufficient);
        assert!(
            strict
                .evaluate_sufficiency(&issue("long enough body"), &[])
                .await
                .sufficient
        );
    }
}
