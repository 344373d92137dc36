//! Idle-issue scheduler: promotes `pending_plan` issues to planning after
//! they sit assigned for long enough without webhook-driven planning.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use quill_agent::CodingAgent;
use quill_core::current_unix_timestamp;
use quill_platform::HostingPlatform;
use quill_store::{EntityStore, IssueStatus};

use crate::planner::run_planner;

/// One scheduler pass: find the first `pending_plan` issue (ascending id)
/// idle past the threshold and run the planner for it. At most one
/// promotion per tick to avoid bursts; issues without an `assigned_at`
/// stamp are skipped entirely.
pub async fn scheduler_tick(
    store: &EntityStore,
    platform: &dyn HostingPlatform,
    agent: &dyn CodingAgent,
    repo: &str,
    bot_username: &str,
    idle_threshold: Duration,
) {
    let pending = store.list_issues_by_status(IssueStatus::PendingPlan);
    let now = current_unix_timestamp();
    for record in pending {
        let Some(assigned_at) = record.assigned_at else {
            continue;
        };
        let idle_secs = now.saturating_sub(assigned_at);
        if idle_secs < idle_threshold.as_secs() {
            continue;
        }
        let issue = match platform.get_issue(repo, record.issue_id).await {
            Ok(issue) => issue,
            Err(error) => {
                warn!(issue = record.issue_id, %error, "scheduler failed to fetch issue");
                continue;
            }
        };
        info!(
            issue = record.issue_id,
            idle_minutes = idle_secs / 60,
            "promoting idle issue to planning"
        );
        run_planner(platform, agent, store, &issue, repo, bot_username).await;
        break;
    }
}

/// Runs [`scheduler_tick`] at a fixed interval until the shutdown signal
/// fires. Per-tick failures are logged inside the tick and never stop the
/// loop.
pub async fn run_scheduler_loop(
    store: EntityStore,
    platform: std::sync::Arc<dyn HostingPlatform>,
    agent: std::sync::Arc<dyn CodingAgent>,
    repo: String,
    bot_username: String,
    idle_threshold: Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        interval_seconds = interval.as_secs(),
        idle_minutes = idle_threshold.as_secs() / 60,
        "scheduler started"
    );
    loop {
        scheduler_tick(
            &store,
            platform.as_ref(),
            agent.as_ref(),
            &repo,
            &bot_username,
            idle_threshold,
        )
        .await;
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    info!("scheduler stopping");
                    return;
                }
            }
        }
    }
}
