//! Bounded code-generation loop: run the agent repeatedly on one issue
//! until it produces a PR report or a clarification, or the iteration
//! budget runs out. No polling for user replies; a clarification is posted
//! to the issue and ends the run.

use tracing::{info, warn};

use quill_agent::{handoff, CodingAgent, HandoffOutcome};
use quill_git::{branch_name_for_issue, GitWorkspace};
use quill_platform::{HostingPlatform, Issue, PlatformError};

use crate::BotProfile;

/// Terminal result of one loop run, mapped onto the issue status by the
/// worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RalphOutcome {
    /// PR created and labeled for review.
    Success,
    /// Agent asked the author a question; posted to the issue.
    Clarification,
    /// Branch setup failed or the iteration budget ran out.
    Failed,
}

fn branch_already_exists(error: &PlatformError) -> bool {
    error.status == 422
        || error.status == 409
        || error.message.to_lowercase().contains("already exists")
}

async fn post_clarification(
    platform: &dyn HostingPlatform,
    repo: &str,
    issue_number: u64,
    clarification: &str,
) {
    if let Err(error) = platform.create_comment(repo, issue_number, clarification).await {
        warn!(issue = issue_number, %error, "failed to post clarification");
        return;
    }
    if let Err(error) = platform.set_labels(repo, issue_number, &["stuck"]).await {
        warn!(issue = issue_number, %error, "failed to set stuck label");
    }
}

async fn checkout_default(git: &GitWorkspace, default_branch: &str) {
    if let Err(error) = git.checkout(default_branch).await {
        warn!(branch = default_branch, %error, "failed to switch back to default branch");
    }
}

async fn publish_report(
    platform: &dyn HostingPlatform,
    git: &GitWorkspace,
    repo: &str,
    issue: &Issue,
    branch: &str,
    report: &str,
    profile: &BotProfile,
) {
    let message = format!("#{} {}", issue.number, issue.title);
    match git.commit_all_and_push(branch, &message, &profile.name, &profile.email).await {
        Ok(true) => info!(issue = issue.number, branch, "pushed agent changes"),
        Ok(false) => info!(issue = issue.number, "no local changes to push"),
        Err(error) => warn!(issue = issue.number, %error, "failed to commit and push"),
    }
    match platform
        .create_pr(repo, &issue.title, report, branch, &profile.default_branch)
        .await
    {
        Ok(pr) => {
            info!(issue = issue.number, pr = pr.number, "pull request created");
            if let Err(error) = platform.set_labels(repo, issue.number, &["review"]).await {
                warn!(issue = issue.number, %error, "failed to set review label");
            }
        }
        Err(error) => warn!(issue = issue.number, %error, "failed to create pull request"),
    }
    checkout_default(git, &profile.default_branch).await;
}

/// Runs the loop for one issue: sufficiency gate, branch setup, then up to
/// `max_iterations` agent rounds resolved through the handoff files.
///
/// Comment and label failures are logged and never abort; only branch
/// creation/checkout failures and budget exhaustion produce
/// [`RalphOutcome::Failed`].
pub async fn run_ralph_loop(
    platform: &dyn HostingPlatform,
    agent: &dyn CodingAgent,
    git: &GitWorkspace,
    mut issue: Issue,
    repo: &str,
    profile: &BotProfile,
    max_iterations: u32,
) -> RalphOutcome {
    let comments = match platform.get_issue_comments(repo, issue.number, None).await {
        Ok(comments) => comments,
        Err(error) => {
            warn!(issue = issue.number, %error, "failed to fetch comments for sufficiency check");
            Vec::new()
        }
    };
    let verdict = agent.evaluate_sufficiency(&issue, &comments).await;
    if !verdict.sufficient {
        info!(issue = issue.number, "issue data insufficient, asking for clarification");
        let clarification = verdict.clarification.unwrap_or_else(|| {
            "Please add more details: what should be implemented and acceptance criteria."
                .to_string()
        });
        post_clarification(platform, repo, issue.number, &clarification).await;
        return RalphOutcome::Clarification;
    }

    let branch = branch_name_for_issue(issue.number, &issue.title);
    info!(issue = issue.number, branch, "creating or reusing work branch");
    if let Err(error) = platform
        .create_branch(repo, &branch, Some(&profile.default_branch))
        .await
    {
        if branch_already_exists(&error) {
            info!(branch, "branch already exists, reusing it");
        } else {
            warn!(branch, %error, "failed to create branch");
            return RalphOutcome::Failed;
        }
    }
    if let Err(error) = git.fetch_and_checkout(&branch).await {
        warn!(branch, %error, "failed to checkout work branch");
        return RalphOutcome::Failed;
    }
    if let Err(error) = platform.set_labels(repo, issue.number, &["in progress"]).await {
        warn!(issue = issue.number, %error, "failed to set in-progress label");
    }

    for iteration in 1..=max_iterations {
        info!(issue = issue.number, iteration, max_iterations, "ralph iteration");
        // Refresh issue and thread in case of edits mid-run.
        issue = match platform.get_issue(repo, issue.number).await {
            Ok(issue) => issue,
            Err(error) => {
                warn!(issue = issue.number, %error, "failed to refresh issue");
                checkout_default(git, &profile.default_branch).await;
                return RalphOutcome::Failed;
            }
        };
        let comments = match platform.get_issue_comments(repo, issue.number, None).await {
            Ok(comments) => comments,
            Err(error) => {
                warn!(issue = issue.number, %error, "failed to refresh comments");
                checkout_default(git, &profile.default_branch).await;
                return RalphOutcome::Failed;
            }
        };

        let direct = match agent.generate_code(&issue, &comments).await {
            Ok(direct) => direct,
            Err(error) => {
                warn!(issue = issue.number, %error, "agent run failed, counting as no progress");
                None
            }
        };

        match handoff::resolve_outcome(direct, git.repo_dir(), issue.number) {
            HandoffOutcome::Report(report) => {
                publish_report(platform, git, repo, &issue, &branch, &report, profile).await;
                return RalphOutcome::Success;
            }
            HandoffOutcome::Clarification(clarification) => {
                info!(issue = issue.number, "agent asked for clarification");
                post_clarification(platform, repo, issue.number, &clarification).await;
                checkout_default(git, &profile.default_branch).await;
                return RalphOutcome::Clarification;
            }
            HandoffOutcome::NoProgress => {}
        }
    }

    warn!(
        issue = issue.number,
        max_iterations, "iteration budget exhausted without a report"
    );
    checkout_default(git, &profile.default_branch).await;
    RalphOutcome::Failed
}
