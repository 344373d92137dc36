//! Review item processor: run the agent per review comment on an open PR,
//! commit whatever it changed, and post threaded replies.

use tracing::{info, warn};

use quill_agent::{CodingAgent, ReviewTodoItem};
use quill_git::{issue_number_from_branch, GitWorkspace};
use quill_platform::HostingPlatform;

use crate::BotProfile;

/// Processes review items in the given order.
///
/// The head branch is checked out once; each item gets its own agent run,
/// commit (nothing-to-commit is expected and skipped), and reply. Per-item
/// failures are logged and processing continues with the next item, so one
/// bad item never starves the rest.
pub async fn process_pr_review(
    platform: &dyn HostingPlatform,
    agent: &dyn CodingAgent,
    git: &GitWorkspace,
    repo: &str,
    pr_number: u64,
    items: &[ReviewTodoItem],
    profile: &BotProfile,
) {
    if items.is_empty() {
        info!(pr = pr_number, "no review items to process");
        return;
    }
    let pr = match platform.get_pr(repo, pr_number).await {
        Ok(pr) => pr,
        Err(error) => {
            warn!(pr = pr_number, %error, "failed to fetch pull request");
            return;
        }
    };
    if pr.state != "open" {
        info!(pr = pr_number, state = %pr.state, "pull request not open, skipping review");
        return;
    }
    let branch = pr.head_branch.clone();
    let issue_number = issue_number_from_branch(&branch).unwrap_or(pr_number);

    if let Err(error) = git.fetch_and_checkout(&branch).await {
        warn!(pr = pr_number, branch, %error, "failed to checkout head branch");
        return;
    }

    for (index, item) in items.iter().enumerate() {
        let position = index + 1;
        info!(
            pr = pr_number,
            item = position,
            total = items.len(),
            comment = item.comment_id,
            "processing review item"
        );
        let reply = match agent
            .process_review_item(pr_number, issue_number, items, position)
            .await
        {
            Ok(reply) => reply,
            Err(error) => {
                warn!(pr = pr_number, comment = item.comment_id, %error, "agent failed on review item");
                None
            }
        };

        let message = format!(
            "#{issue_number} Address review: {}:{}",
            item.path,
            item.line_display()
        );
        if let Err(error) = git
            .commit_all_and_push(&branch, &message, &profile.name, &profile.email)
            .await
        {
            warn!(pr = pr_number, comment = item.comment_id, %error, "commit and push failed");
        }

        let reply = reply.map(|text| text.trim().to_string()).filter(|text| !text.is_empty());
        if let Some(reply) = reply {
            match platform
                .reply_to_review_comment(repo, pr_number, item.comment_id, &reply)
                .await
            {
                Ok(()) => info!(pr = pr_number, comment = item.comment_id, "replied to review comment"),
                Err(error) => {
                    warn!(pr = pr_number, comment = item.comment_id, %error, "failed to reply")
                }
            }
        }
    }
}
