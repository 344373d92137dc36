//! Orchestration core: the issue lifecycle, event dispatch, planning and
//! confirmation, the bounded code-generation loop, and review servicing.
//!
//! Everything here is driven by webhook events or by the scheduler/worker
//! loops; adapter failures are absorbed at the call site nearest the action
//! and downgraded to logged no-ops or state-machine outcomes.

pub mod dispatch;
pub mod planner;
pub mod ralph;
pub mod review;
pub mod scheduler;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_support;

pub use dispatch::EventDispatcher;
pub use planner::{format_plan_request, is_affirmative, on_user_confirmed, run_planner};
pub use ralph::{run_ralph_loop, RalphOutcome};
pub use review::process_pr_review;
pub use scheduler::{run_scheduler_loop, scheduler_tick};
pub use worker::{run_worker_loop, worker_tick};

/// Identity the bot acts under: the platform login used to recognize its
/// own comments and assignments, and the git author for commits.
#[derive(Debug, Clone)]
pub struct BotProfile {
    /// `owner/name` of the single repository this instance serves.
    pub repository: String,
    pub default_branch: String,
    /// Platform login; empty when the bot has no account of its own.
    pub username: String,
    /// Git author name for bot commits.
    pub name: String,
    pub email: String,
}
