//! Git workspace operations for the shared local working tree.
//!
//! Branch names are derived deterministically from the issue id and title;
//! all repository mutations shell out to `git` with a bounded timeout.

pub mod branch;
pub mod workspace;

pub use branch::{branch_name_for_issue, is_valid_branch_name, issue_number_from_branch, sanitize_branch_slug};
pub use workspace::{GitError, GitWorkspace};
