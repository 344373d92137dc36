//! Task handoff files under `.quill/`.
//!
//! The bot writes a YAML task descriptor; the agent either writes a report
//! file (`pr-{issue}.yaml`, key `body`), adds `agent_clarification` to the
//! descriptor, or makes no progress. [`resolve_outcome`] folds the three
//! possibilities into one enum, report first. Review items use a per-PR
//! descriptor with a reply file keyed by the comment id, so a late reply
//! can never be attributed to the wrong comment.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quill_core::write_text_atomic;
use quill_platform::{Comment, Issue};

pub const QUILL_DIR: &str = ".quill";

/// One review comment flattened into the form the agent consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewTodoItem {
    pub comment_id: u64,
    pub path: String,
    pub line: Option<u64>,
    pub author: String,
    pub body: String,
}

impl ReviewTodoItem {
    /// `"12"` or `"?"` when the comment is file-level.
    pub fn line_display(&self) -> String {
        match self.line {
            Some(line) => line.to_string(),
            None => "?".to_string(),
        }
    }
}

/// Result of one agent round, resolved in priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandoffOutcome {
    /// The agent produced a PR description.
    Report(String),
    /// The agent asked a question instead of implementing.
    Clarification(String),
    /// Nothing usable on disk: timeout, missing executable, or idle run.
    NoProgress,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DescriptorComment {
    author: String,
    body: String,
}

/// Task descriptor written for the agent. The agent may add keys
/// (`agent_clarification` in particular), so unknown fields are kept legal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub number: u64,
    pub title: String,
    pub body: String,
    comments: Vec<DescriptorComment>,
    pub report_path: String,
    pub instructions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_clarification: Option<String>,
}

pub fn task_file_path(repo_dir: &Path, issue_number: u64) -> PathBuf {
    repo_dir.join(QUILL_DIR).join(format!("task-{issue_number}.yaml"))
}

pub fn report_file_path(repo_dir: &Path, issue_number: u64) -> PathBuf {
    repo_dir.join(QUILL_DIR).join(format!("pr-{issue_number}.yaml"))
}

pub fn task_log_path(repo_dir: &Path, issue_number: u64) -> PathBuf {
    repo_dir.join(QUILL_DIR).join(format!("task-{issue_number}.log"))
}

pub fn review_task_file_path(repo_dir: &Path, pr_number: u64) -> PathBuf {
    repo_dir.join(QUILL_DIR).join(format!("review-{pr_number}.yaml"))
}

pub fn review_reply_file_path(repo_dir: &Path, pr_number: u64, comment_id: u64) -> PathBuf {
    repo_dir
        .join(QUILL_DIR)
        .join(format!("review-reply-{pr_number}-{comment_id}.yaml"))
}

fn relative_report_path(issue_number: u64) -> String {
    format!("{QUILL_DIR}/pr-{issue_number}.yaml")
}

/// Writes the task descriptor for an issue and returns its path.
pub fn write_task_file(issue: &Issue, comments: &[Comment], repo_dir: &Path) -> Result<PathBuf> {
    let path = task_file_path(repo_dir, issue.number);
    let report_path = relative_report_path(issue.number);
    let mut ordered: Vec<&Comment> = comments.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    let body = if issue.body.trim().is_empty() {
        "(no description)".to_string()
    } else {
        issue.body.clone()
    };
    let instructions = format!(
        "Follow project rules (docs, lint config).\n\n\
         If the task description and comments do NOT contain enough information to implement \
         (e.g. missing acceptance criteria, unclear scope), do NOT implement. Instead add \
         the key 'agent_clarification' to this task YAML with your specific question(s). \
         Then stop.\n\n\
         If the task IS clear enough: implement it, run final verification (linter, tests), \
         fix and repeat until all pass. As the last step, write the PR description to \
         {report_path} with a 'body' key (markdown). Include: What was done; How to test; \
         Reference to issue #{number}. Write the report file only after all other work and \
         checks are complete.",
        report_path = report_path,
        number = issue.number,
    );
    let descriptor = TaskDescriptor {
        number: issue.number,
        title: issue.title.clone(),
        body,
        comments: ordered
            .into_iter()
            .map(|comment| DescriptorComment {
                author: comment.author.clone(),
                body: comment.body.clone(),
            })
            .collect(),
        report_path,
        instructions,
        agent_clarification: None,
    };
    let raw = serde_yaml::to_string(&descriptor).context("serialize task descriptor")?;
    write_text_atomic(&path, &raw).with_context(|| format!("write task file {}", path.display()))?;
    Ok(path)
}

/// Reads `agent_clarification` back from the task descriptor, if the agent
/// added one. Unreadable or unstructured files count as no clarification.
pub fn read_agent_clarification(repo_dir: &Path, issue_number: u64) -> Option<String> {
    let path = task_file_path(repo_dir, issue_number);
    let raw = fs::read_to_string(&path).ok()?;
    let descriptor: TaskDescriptor = serde_yaml::from_str(&raw).ok()?;
    descriptor
        .agent_clarification
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[derive(Debug, Deserialize)]
struct ReportFile {
    #[serde(default)]
    body: String,
}

/// Reads the PR description the agent wrote, if any.
pub fn read_report(repo_dir: &Path, issue_number: u64) -> Option<String> {
    let path = report_file_path(repo_dir, issue_number);
    let raw = fs::read_to_string(&path).ok()?;
    let report: ReportFile = serde_yaml::from_str(&raw).ok()?;
    let body = report.body.trim().to_string();
    (!body.is_empty()).then_some(body)
}

/// Folds one agent round into its outcome. A report always wins, whether it
/// came back directly or landed on disk, even when a clarification is also
/// present; a descriptor clarification comes next; everything else (timeout,
/// missing executable, idle run) is no progress.
pub fn resolve_outcome(direct: Option<String>, repo_dir: &Path, issue_number: u64) -> HandoffOutcome {
    if let Some(report) = direct.map(|text| text.trim().to_string()).filter(|text| !text.is_empty()) {
        return HandoffOutcome::Report(report);
    }
    if let Some(report) = read_report(repo_dir, issue_number) {
        return HandoffOutcome::Report(report);
    }
    if let Some(clarification) = read_agent_clarification(repo_dir, issue_number) {
        return HandoffOutcome::Clarification(clarification);
    }
    HandoffOutcome::NoProgress
}

#[derive(Debug, Serialize)]
struct ReviewCurrent<'a> {
    path: &'a str,
    line: Option<u64>,
    line_display: String,
    author: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct ReviewDescriptor<'a> {
    pr_number: u64,
    issue_number: u64,
    todo_list: Vec<String>,
    current_index: usize,
    total: usize,
    current: ReviewCurrent<'a>,
    reply_path: String,
    instructions: String,
}

/// Writes the review descriptor for the current item (1-based index) and
/// returns its path. The file is overwritten per item.
pub fn write_review_task_file(
    pr_number: u64,
    issue_number: u64,
    items: &[ReviewTodoItem],
    current_index: usize,
    repo_dir: &Path,
) -> Result<PathBuf> {
    anyhow::ensure!(
        current_index >= 1 && current_index <= items.len(),
        "review item index {current_index} out of range 1..={}",
        items.len()
    );
    let path = review_task_file_path(repo_dir, pr_number);
    let todo_list = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let snippet: String = item.body.chars().take(60).collect();
            let ellipsis = if item.body.chars().count() > 60 { "..." } else { "" };
            format!(
                "{}. `{}` line {}: {snippet}{ellipsis}",
                i + 1,
                item.path,
                item.line_display()
            )
        })
        .collect();
    let current = &items[current_index - 1];
    let reply_path = review_reply_file_path(repo_dir, pr_number, current.comment_id);
    let instructions = format!(
        "Either apply a code change to address this comment, then run linter/tests and commit \
         with message like #{issue_number} Address review: {path}:{line}. Or only reply: write \
         your reply to {reply} as YAML with key 'body'. Then stop.",
        path = current.path,
        line = current.line_display(),
        reply = reply_path.display(),
    );
    let descriptor = ReviewDescriptor {
        pr_number,
        issue_number,
        todo_list,
        current_index,
        total: items.len(),
        current: ReviewCurrent {
            path: &current.path,
            line: current.line,
            line_display: current.line_display(),
            author: &current.author,
            body: &current.body,
        },
        reply_path: reply_path.display().to_string(),
        instructions,
    };
    let raw = serde_yaml::to_string(&descriptor).context("serialize review descriptor")?;
    write_text_atomic(&path, &raw)
        .with_context(|| format!("write review task file {}", path.display()))?;
    Ok(path)
}

/// Reads the agent's reply for one review comment. Accepts the structured
/// `body:` form and falls back to the raw file text when the agent wrote
/// plain markdown instead of YAML.
pub fn read_review_reply(repo_dir: &Path, pr_number: u64, comment_id: u64) -> Option<String> {
    let path = review_reply_file_path(repo_dir, pr_number, comment_id);
    let raw = fs::read_to_string(&path).ok()?;
    if let Ok(serde_yaml::Value::Mapping(mapping)) = serde_yaml::from_str::<serde_yaml::Value>(&raw)
    {
        let body = mapping
            .get("body")
            .and_then(|value| value.as_str())
            .map(|text| text.trim().to_string());
        return body.filter(|text| !text.is_empty());
    }
    let text = raw.trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_issue(number: u64, body: &str) -> Issue {
        Issue {
            number,
            title: "Add login".to_string(),
            body: body.to_string(),
            author: "alice".to_string(),
            labels: vec![],
            state: "open".to_string(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn sample_comment(id: u64, author: &str, body: &str, created_at: &str) -> Comment {
        Comment {
            id,
            body: body.to_string(),
            author: author.to_string(),
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
        }
    }

    fn sample_item(comment_id: u64, path: &str, line: Option<u64>) -> ReviewTodoItem {
        ReviewTodoItem {
            comment_id,
            path: path.to_string(),
            line,
            author: "carol".to_string(),
            body: "rename this variable".to_string(),
        }
    }

    #[test]
    fn unit_task_file_round_trips_and_orders_comments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let issue = sample_issue(42, "Implement login with OAuth");
        let comments = vec![
            sample_comment(2, "bob", "second", "2026-01-02T00:00:00Z"),
            sample_comment(1, "alice", "first", "2026-01-01T00:00:00Z"),
        ];
        let path = write_task_file(&issue, &comments, dir.path()).expect("write");
        assert_eq!(path, dir.path().join(".quill/task-42.yaml"));

        let raw = fs::read_to_string(&path).expect("read");
        let descriptor: TaskDescriptor = serde_yaml::from_str(&raw).expect("parse");
        assert_eq!(descriptor.number, 42);
        assert_eq!(descriptor.report_path, ".quill/pr-42.yaml");
        assert_eq!(descriptor.comments[0].body, "first");
        assert_eq!(descriptor.comments[1].body, "second");
        assert!(descriptor.agent_clarification.is_none());
        assert!(descriptor.instructions.contains("agent_clarification"));
    }

    #[test]
    fn unit_empty_body_gets_placeholder() {
        let dir = tempfile::tempdir().expect("tempdir");
        let issue = sample_issue(7, "   ");
        let path = write_task_file(&issue, &[], dir.path()).expect("write");
        let raw = fs::read_to_string(&path).expect("read");
        let descriptor: TaskDescriptor = serde_yaml::from_str(&raw).expect("parse");
        assert_eq!(descriptor.body, "(no description)");
    }

    #[test]
    fn unit_resolve_outcome_prefers_direct_report() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = resolve_outcome(Some("Did the thing".to_string()), dir.path(), 5);
        assert_eq!(outcome, HandoffOutcome::Report("Did the thing".to_string()));
    }

    #[test]
    fn unit_resolve_outcome_report_file_beats_clarification() {
        let dir = tempfile::tempdir().expect("tempdir");
        let issue = sample_issue(5, "A body long enough to matter");
        write_task_file(&issue, &[], dir.path()).expect("write task");

        // Agent added a clarification to the descriptor AND wrote a report.
        let task = task_file_path(dir.path(), 5);
        let raw = fs::read_to_string(&task).expect("read");
        let mut descriptor: TaskDescriptor = serde_yaml::from_str(&raw).expect("parse");
        descriptor.agent_clarification = Some("what about edge cases?".to_string());
        fs::write(&task, serde_yaml::to_string(&descriptor).expect("yaml")).expect("rewrite");
        fs::write(report_file_path(dir.path(), 5), "body: All done\n").expect("report");

        assert_eq!(
            resolve_outcome(None, dir.path(), 5),
            HandoffOutcome::Report("All done".to_string())
        );
    }

    #[test]
    fn unit_resolve_outcome_clarification_then_no_progress() {
        let dir = tempfile::tempdir().expect("tempdir");
        let issue = sample_issue(6, "A body long enough to matter");
        write_task_file(&issue, &[], dir.path()).expect("write task");
        assert_eq!(resolve_outcome(None, dir.path(), 6), HandoffOutcome::NoProgress);

        let task = task_file_path(dir.path(), 6);
        let raw = fs::read_to_string(&task).expect("read");
        let mut descriptor: TaskDescriptor = serde_yaml::from_str(&raw).expect("parse");
        descriptor.agent_clarification = Some("which database?".to_string());
        fs::write(&task, serde_yaml::to_string(&descriptor).expect("yaml")).expect("rewrite");

        assert_eq!(
            resolve_outcome(None, dir.path(), 6),
            HandoffOutcome::Clarification("which database?".to_string())
        );
    }

    #[test]
    fn unit_blank_report_body_is_no_progress() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join(QUILL_DIR)).expect("mkdir");
        fs::write(report_file_path(dir.path(), 9), "body: \"  \"\n").expect("report");
        assert_eq!(resolve_outcome(None, dir.path(), 9), HandoffOutcome::NoProgress);
    }

    #[test]
    fn unit_review_descriptor_keys_reply_by_comment_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let items = vec![sample_item(77, "src/auth.rs", Some(12)), sample_item(78, "README.md", None)];
        let path = write_review_task_file(3, 42, &items, 2, dir.path()).expect("write");
        let raw = fs::read_to_string(&path).expect("read");
        let value: serde_yaml::Value = serde_yaml::from_str(&raw).expect("parse");
        assert_eq!(value["current_index"], serde_yaml::Value::from(2));
        assert_eq!(value["total"], serde_yaml::Value::from(2));
        assert_eq!(value["current"]["line_display"], serde_yaml::Value::from("?"));
        let reply_path = value["reply_path"].as_str().expect("reply path");
        assert!(reply_path.ends_with("review-reply-3-78.yaml"));
        let todo = value["todo_list"][0].as_str().expect("todo");
        assert!(todo.starts_with("1. `src/auth.rs` line 12:"));
    }

    #[test]
    fn unit_review_reply_falls_back_to_raw_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join(QUILL_DIR)).expect("mkdir");
        fs::write(
            review_reply_file_path(dir.path(), 3, 77),
            "body: Fixed in abc123\n",
        )
        .expect("structured");
        assert_eq!(
            read_review_reply(dir.path(), 3, 77),
            Some("Fixed in abc123".to_string())
        );

        fs::write(
            review_reply_file_path(dir.path(), 3, 78),
            "- just\n- markdown\n",
        )
        .expect("raw");
        assert_eq!(
            read_review_reply(dir.path(), 3, 78),
            Some("- just\n- markdown".to_string())
        );
        assert_eq!(read_review_reply(dir.path(), 3, 99), None);
    }
}
