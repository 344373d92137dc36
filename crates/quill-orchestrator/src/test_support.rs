//! Recording fakes and git fixtures shared by the orchestrator tests.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::sync::Mutex;

use async_trait::async_trait;

use quill_agent::{CodingAgent, ReviewTodoItem, SufficiencyVerdict};
use quill_git::GitWorkspace;
use quill_platform::{
    Comment, HostingPlatform, Issue, PlatformError, PlatformResult, PullRequest, ReviewComment,
};

pub fn issue_fixture(number: u64, title: &str, body: &str) -> Issue {
    Issue {
        number,
        title: title.to_string(),
        body: body.to_string(),
        author: "alice".to_string(),
        labels: vec![],
        state: "open".to_string(),
        created_at: "2026-01-01T00:00:00Z".to_string(),
        updated_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

pub fn review_item_fixture(comment_id: u64, path: &str, line: Option<u64>) -> ReviewTodoItem {
    ReviewTodoItem {
        comment_id,
        path: path.to_string(),
        line,
        author: "carol".to_string(),
        body: "please rename this".to_string(),
    }
}

/// In-memory platform that records every mutating call as
/// `"<op>:<target>:<detail>"`.
pub struct MockPlatform {
    default_branch: String,
    issues: Mutex<HashMap<u64, Issue>>,
    comments: Mutex<HashMap<u64, Vec<Comment>>>,
    prs: Mutex<HashMap<u64, PullRequest>>,
    calls: Mutex<Vec<String>>,
    branch_error: Mutex<Option<PlatformError>>,
}

impl MockPlatform {
    pub fn new(default_branch: &str) -> Self {
        Self {
            default_branch: default_branch.to_string(),
            issues: Mutex::new(HashMap::new()),
            comments: Mutex::new(HashMap::new()),
            prs: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            branch_error: Mutex::new(None),
        }
    }

    pub fn add_issue(&self, issue: Issue) {
        self.issues.lock().expect("issues lock").insert(issue.number, issue);
    }

    pub fn add_pr(&self, pr: PullRequest) {
        self.prs.lock().expect("prs lock").insert(pr.number, pr);
    }

    pub fn fail_create_branch(&self, error: PlatformError) {
        *self.branch_error.lock().expect("branch lock") = Some(error);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl HostingPlatform for MockPlatform {
    async fn get_issue(&self, _repo: &str, issue_number: u64) -> PlatformResult<Issue> {
        self.issues
            .lock()
            .expect("issues lock")
            .get(&issue_number)
            .cloned()
            .ok_or_else(|| PlatformError::new(404, "issue not found"))
    }

    async fn get_issue_comments(
        &self,
        _repo: &str,
        issue_number: u64,
        _since: Option<&str>,
    ) -> PlatformResult<Vec<Comment>> {
        Ok(self
            .comments
            .lock()
            .expect("comments lock")
            .get(&issue_number)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_comment(&self, _repo: &str, issue_number: u64, body: &str) -> PlatformResult<()> {
        self.record(format!("create_comment:{issue_number}:{body}"));
        Ok(())
    }

    async fn set_labels(&self, _repo: &str, issue_number: u64, labels: &[&str]) -> PlatformResult<()> {
        self.record(format!("set_labels:{issue_number}:{}", labels.join(",")));
        Ok(())
    }

    async fn create_branch(&self, _repo: &str, branch: &str, _base: Option<&str>) -> PlatformResult<()> {
        if let Some(error) = self.branch_error.lock().expect("branch lock").clone() {
            return Err(error);
        }
        self.record(format!("create_branch:{branch}:"));
        Ok(())
    }

    async fn get_default_branch(&self, _repo: &str) -> PlatformResult<String> {
        Ok(self.default_branch.clone())
    }

    async fn create_pr(
        &self,
        _repo: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> PlatformResult<PullRequest> {
        self.record(format!("create_pr:{head}->{base}:{body}"));
        Ok(PullRequest {
            number: 1000,
            title: title.to_string(),
            body: body.to_string(),
            head_branch: head.to_string(),
            base_branch: base.to_string(),
            state: "open".to_string(),
            html_url: None,
        })
    }

    async fn get_pr(&self, _repo: &str, pr_number: u64) -> PlatformResult<PullRequest> {
        self.prs
            .lock()
            .expect("prs lock")
            .get(&pr_number)
            .cloned()
            .ok_or_else(|| PlatformError::new(404, "pr not found"))
    }

    async fn list_open_issues(&self, _repo: &str) -> PlatformResult<Vec<Issue>> {
        Ok(self.issues.lock().expect("issues lock").values().cloned().collect())
    }

    async fn list_review_comments(
        &self,
        _repo: &str,
        _pr_number: u64,
    ) -> PlatformResult<Vec<ReviewComment>> {
        Ok(vec![])
    }

    async fn reply_to_review_comment(
        &self,
        _repo: &str,
        pr_number: u64,
        comment_id: u64,
        body: &str,
    ) -> PlatformResult<()> {
        self.record(format!("reply:{pr_number}:{comment_id}:{body}"));
        Ok(())
    }
}

/// Agent with scripted answers; `generate_code` and `process_review_item`
/// pop their next result from a queue (empty queue = no progress).
pub struct ScriptedAgent {
    verdict: SufficiencyVerdict,
    plan: String,
    code_results: Mutex<Vec<Option<String>>>,
    review_replies: Mutex<Vec<Option<String>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    pub fn sufficient_with_plan(plan: &str) -> Self {
        Self {
            verdict: SufficiencyVerdict::sufficient(),
            plan: plan.to_string(),
            code_results: Mutex::new(Vec::new()),
            review_replies: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn insufficient(clarification: &str) -> Self {
        let mut agent = Self::sufficient_with_plan("");
        agent.verdict = SufficiencyVerdict::insufficient(clarification);
        agent
    }

    pub fn with_code_results(self, results: Vec<Option<String>>) -> Self {
        *self.code_results.lock().expect("code lock") = results;
        self
    }

    pub fn with_review_replies(self, replies: Vec<Option<String>>) -> Self {
        *self.review_replies.lock().expect("review lock") = replies;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl CodingAgent for ScriptedAgent {
    async fn evaluate_sufficiency(&self, issue: &Issue, _comments: &[Comment]) -> SufficiencyVerdict {
        self.calls.lock().expect("calls lock").push(format!("sufficiency:{}", issue.number));
        self.verdict.clone()
    }

    async fn generate_plan(&self, issue: &Issue, _comments: &[Comment]) -> anyhow::Result<String> {
        self.calls.lock().expect("calls lock").push(format!("plan:{}", issue.number));
        Ok(self.plan.clone())
    }

    async fn generate_code(&self, issue: &Issue, _comments: &[Comment]) -> anyhow::Result<Option<String>> {
        self.calls.lock().expect("calls lock").push(format!("code:{}", issue.number));
        let mut results = self.code_results.lock().expect("code lock");
        if results.is_empty() {
            Ok(None)
        } else {
            Ok(results.remove(0))
        }
    }

    async fn process_review_item(
        &self,
        pr_number: u64,
        _issue_number: u64,
        items: &[ReviewTodoItem],
        current_index: usize,
    ) -> anyhow::Result<Option<String>> {
        let comment_id = items[current_index - 1].comment_id;
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("review:{pr_number}:{current_index}:{comment_id}"));
        let mut replies = self.review_replies.lock().expect("review lock");
        if replies.is_empty() {
            Ok(None)
        } else {
            Ok(replies.remove(0))
        }
    }
}

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Builds a working clone with a local `origin` carrying `main` plus the
/// given branches. Returns the tempdir holding both and a workspace over
/// the clone.
pub fn git_fixture(branches: &[&str]) -> (tempfile::TempDir, GitWorkspace) {
    let root = tempfile::tempdir().expect("tempdir");
    let origin = root.path().join("origin.git");
    std::fs::create_dir(&origin).expect("mkdir origin");
    git(&origin, &["init", "--bare", "--initial-branch=main"]);

    let work = root.path().join("work");
    std::fs::create_dir(&work).expect("mkdir work");
    git(&work, &["init", "--initial-branch=main"]);
    git(&work, &["config", "user.name", "test"]);
    git(&work, &["config", "user.email", "test@example.invalid"]);
    std::fs::write(work.join("README.md"), "fixture\n").expect("write");
    git(&work, &["add", "-A"]);
    git(&work, &["commit", "-m", "initial"]);
    git(&work, &["remote", "add", "origin", origin.to_str().expect("utf8 path")]);
    git(&work, &["push", "origin", "main"]);
    for branch in branches {
        git(&work, &["branch", branch]);
        git(&work, &["push", "origin", branch]);
    }
    let workspace = GitWorkspace::new(&work);
    (root, workspace)
}
