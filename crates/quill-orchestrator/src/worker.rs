//! Worker: drains the queued issues one at a time through the ralph loop.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use quill_agent::CodingAgent;
use quill_git::GitWorkspace;
use quill_platform::HostingPlatform;
use quill_store::{EntityStore, IssueStatus};

use crate::ralph::{run_ralph_loop, RalphOutcome};
use crate::BotProfile;

/// Takes the lowest-id queued issue and runs it through the ralph loop.
/// Returns whether an issue was processed.
pub async fn worker_tick(
    store: &EntityStore,
    platform: &dyn HostingPlatform,
    agent: &dyn CodingAgent,
    git: &GitWorkspace,
    profile: &BotProfile,
    max_iterations: u32,
) -> bool {
    let queued = store.list_issues_by_status(IssueStatus::Queued);
    let Some(record) = queued.into_iter().next() else {
        return false;
    };
    info!(issue = record.issue_id, title = %record.title, "picked queued issue");
    store.set_issue_status(record.issue_id, IssueStatus::InProgress);

    let issue = match platform.get_issue(&profile.repository, record.issue_id).await {
        Ok(issue) => issue,
        Err(error) => {
            warn!(issue = record.issue_id, %error, "failed to fetch issue, marking failed");
            store.set_issue_status(record.issue_id, IssueStatus::Failed);
            return true;
        }
    };

    let outcome =
        run_ralph_loop(platform, agent, git, issue, &profile.repository, profile, max_iterations)
            .await;
    let status = match outcome {
        RalphOutcome::Success => IssueStatus::Done,
        // The clarification itself lives on the issue as a comment plus the
        // "stuck" label; the run is over either way.
        RalphOutcome::Failed | RalphOutcome::Clarification => IssueStatus::Failed,
    };
    store.set_issue_status(record.issue_id, status);
    true
}

/// Polls the queue forever at `poll_interval`; with `once` set, processes
/// at most one issue and returns.
pub async fn run_worker_loop(
    store: EntityStore,
    platform: Arc<dyn HostingPlatform>,
    agent: Arc<dyn CodingAgent>,
    git: GitWorkspace,
    profile: BotProfile,
    max_iterations: u32,
    poll_interval: Duration,
    once: bool,
) {
    info!(
        repo = %profile.repository,
        poll_seconds = poll_interval.as_secs(),
        once,
        "worker started"
    );
    loop {
        let processed = worker_tick(
            &store,
            platform.as_ref(),
            agent.as_ref(),
            &git,
            &profile,
            max_iterations,
        )
        .await;
        if once {
            if !processed {
                info!("no queued issues, exiting");
            }
            return;
        }
        if !processed {
            tokio::time::sleep(poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{git_fixture, issue_fixture, MockPlatform, ScriptedAgent};
    use quill_store::NewIssue;

    fn profile() -> BotProfile {
        BotProfile {
            repository: "acme/widgets".to_string(),
            default_branch: "main".to_string(),
            username: "quill-bot".to_string(),
            name: "Quill Bot".to_string(),
            email: "bot@example.invalid".to_string(),
        }
    }

    fn queued_issue(store: &EntityStore, issue_id: u64) {
        store
            .create_issue(NewIssue {
                repo: "acme/widgets".to_string(),
                issue_id,
                title: "Add user login".to_string(),
                description: "Implement OAuth login properly".to_string(),
                author: "alice".to_string(),
                assigned_to: Some("quill-bot".to_string()),
            })
            .expect("create");
        store.set_issue_status(issue_id, IssueStatus::Queued);
    }

    #[tokio::test]
    async fn functional_tick_runs_lowest_id_first_and_marks_done() {
        let (_root, git) = git_fixture(&["42-add-user-login"]);
        let state = tempfile::tempdir().expect("tempdir");
        let store = EntityStore::new(state.path());
        queued_issue(&store, 42);
        queued_issue(&store, 99);
        let platform = MockPlatform::new("main");
        platform.add_issue(issue_fixture(42, "Add user login", "Implement OAuth login properly"));
        let agent = ScriptedAgent::sufficient_with_plan("")
            .with_code_results(vec![Some("Report".to_string())]);

        let processed = worker_tick(&store, &platform, &agent, &git, &profile(), 3).await;

        assert!(processed);
        assert_eq!(store.load_issue(42).expect("record").status, IssueStatus::Done);
        assert_eq!(store.load_issue(99).expect("record").status, IssueStatus::Queued);
    }

    #[tokio::test]
    async fn functional_tick_marks_failed_when_issue_fetch_fails() {
        let (_root, git) = git_fixture(&[]);
        let state = tempfile::tempdir().expect("tempdir");
        let store = EntityStore::new(state.path());
        queued_issue(&store, 42);
        let platform = MockPlatform::new("main");
        let agent = ScriptedAgent::sufficient_with_plan("");

        assert!(worker_tick(&store, &platform, &agent, &git, &profile(), 3).await);
        assert_eq!(store.load_issue(42).expect("record").status, IssueStatus::Failed);
    }

    #[tokio::test]
    async fn functional_clarification_marks_issue_failed() {
        let (_root, git) = git_fixture(&[]);
        let state = tempfile::tempdir().expect("tempdir");
        let store = EntityStore::new(state.path());
        queued_issue(&store, 42);
        let platform = MockPlatform::new("main");
        platform.add_issue(issue_fixture(42, "Add user login", "short"));
        let agent = ScriptedAgent::insufficient("Need acceptance criteria");

        assert!(worker_tick(&store, &platform, &agent, &git, &profile(), 3).await);
        // The question and "stuck" label are on the issue; the run itself
        // ends failed, never back to an earlier lifecycle state.
        assert_eq!(store.load_issue(42).expect("record").status, IssueStatus::Failed);
        assert_eq!(platform.calls_matching("set_labels:42"), vec!["set_labels:42:stuck"]);
    }

    #[tokio::test]
    async fn functional_empty_queue_is_not_processed() {
        let (_root, git) = git_fixture(&[]);
        let state = tempfile::tempdir().expect("tempdir");
        let store = EntityStore::new(state.path());
        let platform = MockPlatform::new("main");
        let agent = ScriptedAgent::sufficient_with_plan("");

        assert!(!worker_tick(&store, &platform, &agent, &git, &profile(), 3).await);
    }
}
