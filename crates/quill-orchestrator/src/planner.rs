//! Plan generation and user confirmation.
//!
//! The agent produces the plan in the issue's language; the bot's fixed
//! phrases (confirmation prompt, work-started acknowledgment) stay in
//! English.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{info, warn};

use quill_agent::CodingAgent;
use quill_platform::{HostingPlatform, Issue};
use quill_store::{EntityStore, IssueStatus};

/// Confirmation heuristic: a reply counts as affirmative when it is one of
/// the accepted phrases (EN + RU) on its own, or contains one as a bounded
/// word. A smarter classifier can replace [`is_affirmative`] without
/// touching the state machine.
fn affirmative_regex() -> &'static Regex {
    static AFFIRMATIVE: OnceLock<Regex> = OnceLock::new();
    AFFIRMATIVE.get_or_init(|| {
        let words = "да|yes|устраивает|ок|ok|okay|go ahead|бери в работу|начинай|\
                     подходит|согласен|согласна|looks good|good|принято";
        let short = "да|yes|устраивает|ок|ok|go ahead|бери в работу|начинай";
        let pattern = format!(r"(?i)\b({words})\b|^({short})\.?$");
        Regex::new(&pattern).expect("affirmative pattern is a valid regex")
    })
}

/// Whether a comment body reads as the user confirming the plan.
pub fn is_affirmative(body: &str) -> bool {
    let trimmed = body.trim();
    !trimmed.is_empty() && affirmative_regex().is_match(trimmed)
}

const TEMPLATE_PLAN_REQUEST: &str = "## Plan\n\n{plan}\n\n---\nDoes this approach work for you? \
    Reply with **yes** / **go ahead** / **looks good** to start implementation.";

pub const TEMPLATE_WORK_STARTED: &str =
    "Work on this task has started. The implementation will appear in a pull request.";

/// Wraps a plan in the fixed confirmation prompt.
pub fn format_plan_request(plan: &str) -> String {
    TEMPLATE_PLAN_REQUEST.replace("{plan}", plan)
}

fn bot_display_name(bot_username: &str) -> String {
    if bot_username.is_empty() {
        "@bot".to_string()
    } else {
        format!("@{bot_username}")
    }
}

/// Generates a plan for the issue, posts it wrapped in the confirmation
/// prompt, mirrors it into the thread, and moves the issue to
/// `waiting_confirmation`. A failed comment post aborts with the status
/// unchanged, so the next scheduler pass retries.
pub async fn run_planner(
    platform: &dyn HostingPlatform,
    agent: &dyn CodingAgent,
    store: &EntityStore,
    issue: &Issue,
    repo: &str,
    bot_username: &str,
) {
    let comments = match platform.get_issue_comments(repo, issue.number, None).await {
        Ok(comments) => comments,
        Err(error) => {
            warn!(issue = issue.number, %error, "failed to fetch comments, planning from issue body");
            Vec::new()
        }
    };
    let plan = match agent.generate_plan(issue, &comments).await {
        Ok(plan) => plan,
        Err(error) => {
            warn!(issue = issue.number, %error, "plan generation failed");
            return;
        }
    };
    let message = format_plan_request(&plan);
    if let Err(error) = platform.create_comment(repo, issue.number, &message).await {
        warn!(issue = issue.number, %error, "failed to post plan comment");
        return;
    }
    store.append_comment(
        issue.number,
        &bot_display_name(bot_username),
        &message,
        None,
        None,
        None,
    );
    store.set_issue_status(issue.number, IssueStatus::WaitingConfirmation);
    info!(issue = issue.number, "posted plan, waiting for user confirmation");
}

/// Handles an affirmative reply on a `waiting_confirmation` issue: queue it
/// and acknowledge. The caller appends the user's comment to the thread and
/// gates on the current status, which keeps a second affirmative a no-op.
pub async fn on_user_confirmed(
    platform: &dyn HostingPlatform,
    store: &EntityStore,
    repo: &str,
    issue_number: u64,
    bot_username: &str,
) {
    store.set_issue_status(issue_number, IssueStatus::Queued);
    store.append_comment(
        issue_number,
        &bot_display_name(bot_username),
        TEMPLATE_WORK_STARTED,
        None,
        None,
        None,
    );
    if let Err(error) = platform.create_comment(repo, issue_number, TEMPLATE_WORK_STARTED).await {
        warn!(issue = issue_number, %error, "failed to post work-started acknowledgment");
    }
    info!(issue = issue_number, "confirmation accepted, issue queued");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_affirmative_accepts_english_and_russian() {
        assert!(is_affirmative("yes"));
        assert!(is_affirmative("Yes."));
        assert!(is_affirmative("go ahead"));
        assert!(is_affirmative("looks good to me"));
        assert!(is_affirmative("да, устраивает"));
        assert!(is_affirmative("ок"));
        assert!(is_affirmative("начинай"));
    }

    #[test]
    fn unit_affirmative_rejects_questions_and_noise() {
        assert!(!is_affirmative("I have more questions"));
        assert!(!is_affirmative("what about error handling?"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("   "));
        assert!(!is_affirmative("goodness knows"));
    }

    #[test]
    fn unit_plan_request_embeds_plan_between_fixed_phrases() {
        let message = format_plan_request("1. Do it");
        assert!(message.starts_with("## Plan\n\n1. Do it\n"));
        assert!(message.contains("Does this approach work for you?"));
    }
}
