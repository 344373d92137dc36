//! Headless CLI backend for [`CodingAgent`].
//!
//! Each round writes the task descriptor, spawns the configured command with
//! a short prompt pointing at it, and appends the run transcript to
//! `.quill/task-{issue}.log`. Timeouts and a missing executable collapse to
//! no-report; the caller resolves the outcome from disk.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use quill_platform::{Comment, Issue};

use crate::handoff::{
    self, read_report, read_review_reply, report_file_path, review_reply_file_path, task_log_path,
    write_review_task_file, write_task_file, ReviewTodoItem,
};
use crate::{CodingAgent, SufficiencyVerdict};

const PLAN_TIMEOUT_CAP: Duration = Duration::from_secs(120);
const PLAN_FALLBACK: &str = "1. Analyze issue\n2. Implement\n3. Test";
const INSUFFICIENT_BODY_CLARIFICATION: &str =
    "Please add more details: what should be implemented and acceptance criteria.";
const LOG_RULE: &str = "------------------------------------------------------------";

/// Configuration for [`HeadlessCliAgent`], mapped from the `agent` config
/// section.
#[derive(Debug, Clone)]
pub struct HeadlessAgentConfig {
    /// Executable to run, e.g. `agent`.
    pub command: String,
    /// Fixed leading arguments, e.g. `["-p", "--force"]`.
    pub args: Vec<String>,
    pub timeout: Duration,
    /// Checkout the agent works in; handoff files live under its `.quill/`.
    pub working_directory: PathBuf,
    /// Exported as `AGENT_API_KEY` when present.
    pub token: Option<String>,
    pub model: Option<String>,
    pub output_format: Option<String>,
    /// Issue bodies shorter than this are judged insufficient.
    pub min_body_length: usize,
}

pub struct HeadlessCliAgent {
    config: HeadlessAgentConfig,
}

enum CliRun {
    Finished { transcript: String, exit_code: Option<i32> },
    TimedOut,
    NotFound,
}

impl HeadlessCliAgent {
    pub fn new(config: HeadlessAgentConfig) -> Self {
        Self { config }
    }

    fn repo_dir(&self) -> &Path {
        &self.config.working_directory
    }

    fn build_args(&self, prompt: &str) -> Vec<String> {
        let mut args = self.config.args.clone();
        if let Some(output_format) = &self.config.output_format {
            args.push("--output-format".to_string());
            args.push(output_format.clone());
        }
        if let Some(model) = &self.config.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        args.push(prompt.to_string());
        args
    }

    async fn run_cli(&self, prompt: &str, timeout: Duration) -> Result<CliRun> {
        let mut command = tokio::process::Command::new(&self.config.command);
        command
            .args(self.build_args(prompt))
            .current_dir(&self.config.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(token) = &self.config.token {
            command.env("AGENT_API_KEY", token);
        }
        let child = match command.spawn() {
            Ok(child) => child,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CliRun::NotFound);
            }
            Err(error) => {
                return Err(error).with_context(|| format!("spawn {}", self.config.command));
            }
        };
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output.context("collect agent output")?;
                let mut transcript = String::from_utf8_lossy(&output.stdout).into_owned();
                transcript.push_str(&String::from_utf8_lossy(&output.stderr));
                Ok(CliRun::Finished {
                    transcript,
                    exit_code: output.status.code(),
                })
            }
            Err(_) => Ok(CliRun::TimedOut),
        }
    }

    fn append_log(&self, log_path: &Path, sections: &[String]) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(log_path)?;
            for section in sections {
                file.write_all(section.as_bytes())?;
                file.write_all(b"\n")?;
            }
            Ok(())
        };
        if let Err(error) = write() {
            warn!(path = %log_path.display(), %error, "failed to append agent run log");
        }
    }

    /// Runs one logged CLI round and returns whether a process completed.
    async fn run_logged(&self, prompt: &str, log_path: &Path, header: String) -> Result<()> {
        self.append_log(log_path, &[header, LOG_RULE.to_string()]);
        match self.run_cli(prompt, self.config.timeout).await? {
            CliRun::Finished { transcript, exit_code } => {
                let exit = exit_code.map_or_else(|| "signal".to_string(), |code| code.to_string());
                self.append_log(
                    log_path,
                    &[transcript, LOG_RULE.to_string(), format!("Exit code: {exit}")],
                );
            }
            CliRun::TimedOut => {
                let timeout = self.config.timeout.as_secs();
                self.append_log(
                    log_path,
                    &[LOG_RULE.to_string(), format!("Timed out after {timeout}s")],
                );
                warn!(command = %self.config.command, timeout, "agent CLI timed out");
            }
            CliRun::NotFound => {
                self.append_log(
                    log_path,
                    &[LOG_RULE.to_string(), format!("Error: CLI not found: {}", self.config.command)],
                );
                warn!(command = %self.config.command, "agent CLI executable not found");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl CodingAgent for HeadlessCliAgent {
    async fn evaluate_sufficiency(&self, issue: &Issue, _comments: &[Comment]) -> SufficiencyVerdict {
        if issue.body.trim().chars().count() < self.config.min_body_length {
            SufficiencyVerdict::insufficient(INSUFFICIENT_BODY_CLARIFICATION)
        } else {
            SufficiencyVerdict::sufficient()
        }
    }

    async fn generate_plan(&self, issue: &Issue, _comments: &[Comment]) -> Result<String> {
        let body = if issue.body.trim().is_empty() { "(none)" } else { issue.body.as_str() };
        let prompt = format!(
            "You are a planner. The user created an issue. Output ONLY a short implementation \
             plan (bullet points, no code). Use the same language as the issue. \
             Issue title: {title:?}\n\nBody:\n{body}\n\nOutput only the plan, nothing else.",
            title = issue.title,
        );
        let timeout = self.config.timeout.min(PLAN_TIMEOUT_CAP);
        match self.run_cli(&prompt, timeout).await {
            Ok(CliRun::Finished { transcript, .. }) => {
                let plan = transcript.trim().to_string();
                Ok(if plan.is_empty() { PLAN_FALLBACK.to_string() } else { plan })
            }
            Ok(CliRun::TimedOut) | Ok(CliRun::NotFound) => {
                warn!(issue = issue.number, "plan generation fell back to the default outline");
                Ok(PLAN_FALLBACK.to_string())
            }
            Err(error) => {
                warn!(issue = issue.number, %error, "plan generation failed");
                Ok(PLAN_FALLBACK.to_string())
            }
        }
    }

    async fn generate_code(&self, issue: &Issue, comments: &[Comment]) -> Result<Option<String>> {
        let repo_dir = self.repo_dir();
        let task_path = write_task_file(issue, comments, repo_dir)?;
        let report_path = report_file_path(repo_dir, issue.number);
        let log_path = task_log_path(repo_dir, issue.number);

        let prompt = format!(
            "Read and execute the task described in {task} (YAML). If data is insufficient, \
             add the key 'agent_clarification' to that YAML with your question and stop. \
             Otherwise implement and write the PR description to {report} (YAML with key 'body').",
            task = task_path.display(),
            report = report_path.display(),
        );
        info!(
            issue = issue.number,
            command = %self.config.command,
            timeout = self.config.timeout.as_secs(),
            "running agent CLI for code generation"
        );
        let header = format!(
            "[{now}] Issue #{number} | command={command} timeout={timeout}s\nTask file: {task}\nReport file: {report}",
            now = chrono::Utc::now().to_rfc3339(),
            number = issue.number,
            command = self.config.command,
            timeout = self.config.timeout.as_secs(),
            task = task_path.display(),
            report = report_path.display(),
        );
        self.run_logged(&prompt, &log_path, header).await?;
        Ok(read_report(repo_dir, issue.number))
    }

    async fn process_review_item(
        &self,
        pr_number: u64,
        issue_number: u64,
        items: &[ReviewTodoItem],
        current_index: usize,
    ) -> Result<Option<String>> {
        let repo_dir = self.repo_dir();
        let task_path = write_review_task_file(pr_number, issue_number, items, current_index, repo_dir)?;
        let current = &items[current_index - 1];
        let reply_path = review_reply_file_path(repo_dir, pr_number, current.comment_id);
        let log_path = task_log_path(repo_dir, issue_number);

        let prompt = format!(
            "Read and execute the review task in {task} (YAML). Address the current item only: \
             apply code changes and/or write your reply to {reply} (YAML with key 'body'). Then stop.",
            task = task_path.display(),
            reply = reply_path.display(),
        );
        info!(
            pr = pr_number,
            item = current_index,
            total = items.len(),
            timeout = self.config.timeout.as_secs(),
            "running agent CLI for review item"
        );
        let header = format!(
            "[{now}] PR #{pr_number} review item {current_index}\nTask file: {task}",
            now = chrono::Utc::now().to_rfc3339(),
            task = task_path.display(),
        );
        self.run_logged(&prompt, &log_path, header).await?;
        Ok(read_review_reply(repo_dir, pr_number, current.comment_id))
    }
}
