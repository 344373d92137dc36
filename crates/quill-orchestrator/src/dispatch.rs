//! Webhook event dispatcher.
//!
//! Dispatch is infallible: deliveries may arrive duplicated, reordered, or
//! for records that do not exist yet, so every handler degrades to a logged
//! no-op instead of erroring. The platform client is optional; without a
//! token the dispatcher still mirrors state and leaves planning to the
//! scheduler.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use quill_agent::{CodingAgent, ReviewTodoItem};
use quill_core::parse_rfc3339_to_unix;
use quill_git::{issue_number_from_branch, GitWorkspace};
use quill_platform::HostingPlatform;
use quill_store::{EntityStore, IssueStatus, NewIssue, PrStatus};

use crate::planner::{is_affirmative, on_user_confirmed, run_planner};
use crate::review::process_pr_review;
use crate::BotProfile;

pub struct EventDispatcher {
    store: EntityStore,
    platform: Option<Arc<dyn HostingPlatform>>,
    agent: Arc<dyn CodingAgent>,
    git: GitWorkspace,
    profile: BotProfile,
    shutdown: watch::Sender<bool>,
}

impl EventDispatcher {
    pub fn new(
        store: EntityStore,
        platform: Option<Arc<dyn HostingPlatform>>,
        agent: Arc<dyn CodingAgent>,
        git: GitWorkspace,
        profile: BotProfile,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            store,
            platform,
            agent,
            git,
            profile,
            shutdown,
        }
    }

    /// Routes one webhook delivery. Unknown events and foreign repositories
    /// are silent no-ops.
    pub async fn dispatch(&self, event: &str, payload: &Value) {
        if !self.repo_matches(payload) {
            debug!(event, "ignoring event for foreign repository");
            return;
        }
        match event {
            "issues" => self.handle_issues(payload).await,
            "issue_comment" => self.handle_issue_comment(payload).await,
            "pull_request" => self.handle_pull_request(payload).await,
            "pull_request_review_comment" => self.handle_review_comment(payload).await,
            other => debug!(event = other, "ignoring unsupported event"),
        }
    }

    fn repo_matches(&self, payload: &Value) -> bool {
        match payload["repository"]["full_name"].as_str() {
            Some(repo) => repo == self.profile.repository,
            None => false,
        }
    }

    fn first_assignee(issue_payload: &Value) -> Option<&str> {
        issue_payload["assignees"][0]["login"].as_str()
    }

    fn assignee_logins(issue_payload: &Value) -> Vec<&str> {
        issue_payload["assignees"]
            .as_array()
            .map(|assignees| {
                assignees
                    .iter()
                    .filter_map(|assignee| assignee["login"].as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Creates the record from payload fields when it does not exist yet.
    fn ensure_issue(&self, issue_payload: &Value, issue_number: u64) {
        if self.store.load_issue(issue_number).is_some() {
            return;
        }
        let fields = NewIssue {
            repo: self.profile.repository.clone(),
            issue_id: issue_number,
            title: issue_payload["title"].as_str().unwrap_or_default().to_string(),
            description: issue_payload["body"].as_str().unwrap_or_default().to_string(),
            author: issue_payload["user"]["login"].as_str().unwrap_or("unknown").to_string(),
            assigned_to: Self::first_assignee(issue_payload).map(str::to_string),
        };
        if let Err(error) = self.store.create_issue(fields) {
            // Lost the race with a concurrent delivery; the record exists.
            debug!(issue = issue_number, %error, "issue record not created");
        }
    }

    async fn handle_issues(&self, payload: &Value) {
        let action = payload["action"].as_str().unwrap_or_default();
        let issue_payload = &payload["issue"];
        let Some(issue_number) = issue_payload["number"].as_u64() else {
            return;
        };
        match action {
            "closed" => {
                self.ensure_issue(issue_payload, issue_number);
                self.store.set_issue_status(issue_number, IssueStatus::Closed);
                info!(issue = issue_number, "issue closed");
            }
            "edited" => {
                let title = issue_payload["title"].as_str().filter(|title| !title.is_empty());
                let body = issue_payload["body"].as_str().filter(|body| !body.is_empty());
                self.store.update_content(issue_number, title, body);
            }
            "unassigned" => {
                self.store.clear_assignment(issue_number);
            }
            "opened" | "assigned" => {
                self.ensure_issue(issue_payload, issue_number);
                if action == "assigned" {
                    if let Some(login) = Self::first_assignee(issue_payload) {
                        self.store.set_assignment(issue_number, login);
                    }
                    self.plan_if_assigned_to_bot(issue_payload, issue_number).await;
                }
            }
            other => debug!(issue = issue_number, action = other, "ignoring issues action"),
        }
    }

    async fn plan_if_assigned_to_bot(&self, issue_payload: &Value, issue_number: u64) {
        if self.profile.username.is_empty() {
            debug!("no bot username configured, skipping planner");
            return;
        }
        if !Self::assignee_logins(issue_payload).contains(&self.profile.username.as_str()) {
            debug!(issue = issue_number, "assignee is not the bot, skipping planner");
            return;
        }
        let Some(platform) = &self.platform else {
            info!(
                issue = issue_number,
                "assigned to bot but no platform token, leaving pending_plan for the scheduler"
            );
            return;
        };
        let issue = match platform.get_issue(&self.profile.repository, issue_number).await {
            Ok(issue) => issue,
            Err(error) => {
                warn!(issue = issue_number, %error, "failed to fetch issue for planning");
                return;
            }
        };
        run_planner(
            platform.as_ref(),
            self.agent.as_ref(),
            &self.store,
            &issue,
            &self.profile.repository,
            &self.profile.username,
        )
        .await;
    }

    async fn handle_issue_comment(&self, payload: &Value) {
        let action = payload["action"].as_str().unwrap_or_default();
        let comment = &payload["comment"];
        let Some(issue_number) = payload["issue"]["number"].as_u64() else {
            return;
        };
        let body = comment["body"].as_str().unwrap_or_default();
        let author = comment["user"]["login"].as_str().unwrap_or_default();
        let comment_id = comment["id"].as_u64();
        let record = self.store.load_issue(issue_number);

        match action {
            "created" => {
                if !self.profile.username.is_empty() && author == self.profile.username {
                    debug!(issue = issue_number, "skipping the bot's own comment");
                    return;
                }
                if record.is_some() {
                    let created = comment["created_at"].as_str().and_then(parse_rfc3339_to_unix);
                    let updated = comment["updated_at"].as_str().and_then(parse_rfc3339_to_unix);
                    self.store
                        .append_comment(issue_number, author, body, comment_id, created, updated);
                }
                let waiting = record
                    .map(|record| record.status == IssueStatus::WaitingConfirmation)
                    .unwrap_or(false);
                if waiting && is_affirmative(body) {
                    let Some(platform) = &self.platform else {
                        warn!(issue = issue_number, "confirmation received but no platform token");
                        return;
                    };
                    on_user_confirmed(
                        platform.as_ref(),
                        &self.store,
                        &self.profile.repository,
                        issue_number,
                        &self.profile.username,
                    )
                    .await;
                }
            }
            "edited" => {
                if let Some(comment_id) = comment_id {
                    let updated = comment["updated_at"].as_str().and_then(parse_rfc3339_to_unix);
                    if self.store.update_comment(issue_number, comment_id, body, updated) {
                        debug!(issue = issue_number, comment = comment_id, "comment updated");
                    }
                }
            }
            "deleted" => {
                if let Some(comment_id) = comment_id {
                    if self.store.soft_delete_comment(issue_number, comment_id) {
                        debug!(issue = issue_number, comment = comment_id, "comment soft-deleted");
                    }
                }
            }
            other => debug!(issue = issue_number, action = other, "ignoring comment action"),
        }
    }

    async fn handle_pull_request(&self, payload: &Value) {
        if payload["action"].as_str() != Some("closed") {
            return;
        }
        let pull = &payload["pull_request"];
        let Some(pr_number) = pull["number"].as_u64() else {
            return;
        };
        let merged = pull["merged"].as_bool().unwrap_or(false);
        let status = if merged { PrStatus::Merged } else { PrStatus::Closed };
        let head_branch = pull["head"]["ref"].as_str().unwrap_or_default();
        let linked_issue = issue_number_from_branch(head_branch);
        if let Err(error) =
            self.store
                .set_pr_status(pr_number, status, &self.profile.repository, linked_issue)
        {
            warn!(pr = pr_number, %error, "failed to record pr status");
        }

        if !merged {
            return;
        }
        let base = pull["base"]["ref"].as_str().unwrap_or_default();
        if base != self.profile.default_branch {
            debug!(pr = pr_number, base, "merged into non-default branch, nothing to pull");
            return;
        }
        match self.git.pull(&self.profile.default_branch).await {
            Ok(()) => {
                info!(
                    pr = pr_number,
                    branch = %self.profile.default_branch,
                    "merged PR pulled, signaling restart"
                );
                // Receivers may already be gone during shutdown.
                let _ = self.shutdown.send(true);
            }
            Err(error) => {
                warn!(pr = pr_number, %error, "git pull after merge failed, staying up");
            }
        }
    }

    async fn handle_review_comment(&self, payload: &Value) {
        if payload["action"].as_str() != Some("created") {
            return;
        }
        let comment = &payload["comment"];
        let Some(comment_id) = comment["id"].as_u64() else {
            warn!("review comment payload missing comment id");
            return;
        };
        let Some(pr_number) = payload["pull_request"]["number"].as_u64() else {
            warn!("review comment payload missing pull_request.number");
            return;
        };
        let item = ReviewTodoItem {
            comment_id,
            path: comment["path"].as_str().unwrap_or_default().to_string(),
            line: comment["line"].as_u64(),
            author: comment["user"]["login"].as_str().unwrap_or_default().to_string(),
            body: comment["body"].as_str().unwrap_or_default().to_string(),
        };
        let Some(platform) = &self.platform else {
            warn!(pr = pr_number, "review comment received but no platform token");
            return;
        };
        process_pr_review(
            platform.as_ref(),
            self.agent.as_ref(),
            &self.git,
            &self.profile.repository,
            pr_number,
            &[item],
            &self.profile,
        )
        .await;
    }
}
