//! Entity store operations over the record files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use quill_core::{current_unix_timestamp, write_text_atomic};
use tracing::{debug, info, warn};

use crate::record::{IssueRecord, IssueStatus, PrRecord, PrStatus, ThreadComment};

const STATE_DIR: &str = ".quill";
const ISSUES_DIR: &str = "issues";
const PRS_DIR: &str = "prs";

/// Fields for a record created on first observation of an issue.
#[derive(Debug, Clone)]
pub struct NewIssue {
    pub repo: String,
    pub issue_id: u64,
    pub title: String,
    pub description: String,
    pub author: String,
    pub assigned_to: Option<String>,
}

/// File-backed store anchored at one workspace root.
///
/// The dispatcher and scheduler are the only writers; everything else reads
/// records and requests transitions through these methods.
#[derive(Debug, Clone)]
pub struct EntityStore {
    root: PathBuf,
}

impl EntityStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn issues_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR).join(ISSUES_DIR)
    }

    fn prs_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR).join(PRS_DIR)
    }

    fn issue_path(&self, issue_id: u64) -> PathBuf {
        self.issues_dir().join(format!("{issue_id}.yaml"))
    }

    fn pr_path(&self, pr_id: u64) -> PathBuf {
        self.prs_dir().join(format!("{pr_id}.yaml"))
    }

    /// Loads an issue record. Missing and malformed files both come back as
    /// `None`; malformed content is logged and never raised to the caller.
    pub fn load_issue(&self, issue_id: u64) -> Option<IssueRecord> {
        load_record(&self.issue_path(issue_id))
    }

    /// Creates a new issue record with status `pending_plan` and a first
    /// thread entry synthesized from title + description. Fails when a
    /// record for the id already exists; creation is explicit, not upsert.
    pub fn create_issue(&self, fields: NewIssue) -> Result<IssueRecord> {
        let path = self.issue_path(fields.issue_id);
        if path.exists() {
            bail!("issue record {} already exists", fields.issue_id);
        }
        let now = current_unix_timestamp();
        let first_content = match (fields.title.trim(), fields.description.trim()) {
            ("", "") => "(no content)".to_string(),
            (title, "") => title.to_string(),
            ("", description) => description.to_string(),
            (title, description) => format!("{title}\n\n{description}"),
        };
        let record = IssueRecord {
            repo: fields.repo,
            issue_id: fields.issue_id,
            author: fields.author.clone(),
            title: fields.title,
            description: fields.description,
            status: IssueStatus::PendingPlan,
            assigned_at: fields.assigned_to.as_ref().map(|_| now),
            assigned_to: fields.assigned_to,
            created_at: now,
            updated_at: now,
            comments: vec![ThreadComment {
                comment_id: None,
                author: fields.author,
                content: first_content,
                created_at: now,
                updated_at: now,
                deleted_at: None,
            }],
        };
        self.save_issue(&record)?;
        info!(issue = record.issue_id, "created issue record, status pending_plan");
        Ok(record)
    }

    /// Full-file rewrite of one issue record.
    pub fn save_issue(&self, record: &IssueRecord) -> Result<()> {
        let raw = serde_yaml::to_string(record).context("failed to serialize issue record")?;
        write_text_atomic(&self.issue_path(record.issue_id), &raw)
    }

    /// Sets the lifecycle status, bumping `updated_at`. No-op when the
    /// record is missing so a close event racing a not-yet-created record
    /// never crashes the dispatcher.
    pub fn set_issue_status(&self, issue_id: u64, status: IssueStatus) {
        let Some(mut record) = self.load_issue(issue_id) else {
            warn!(issue = issue_id, "cannot set status: issue record not found");
            return;
        };
        record.status = status;
        record.updated_at = current_unix_timestamp();
        if let Err(error) = self.save_issue(&record) {
            warn!(issue = issue_id, %error, "failed to persist status change");
            return;
        }
        info!(issue = issue_id, status = %status, "issue status updated");
    }

    /// Appends one comment to the thread. No-op when the record is missing.
    pub fn append_comment(
        &self,
        issue_id: u64,
        author: &str,
        content: &str,
        comment_id: Option<u64>,
        created_at: Option<u64>,
        updated_at: Option<u64>,
    ) {
        let Some(mut record) = self.load_issue(issue_id) else {
            warn!(issue = issue_id, "cannot append comment: issue record not found");
            return;
        };
        let now = current_unix_timestamp();
        let created = created_at.unwrap_or(now);
        record.comments.push(ThreadComment {
            comment_id,
            author: author.to_string(),
            content: content.to_string(),
            created_at: created,
            updated_at: updated_at.unwrap_or(created),
            deleted_at: None,
        });
        record.updated_at = now;
        if let Err(error) = self.save_issue(&record) {
            warn!(issue = issue_id, %error, "failed to persist appended comment");
            return;
        }
        debug!(issue = issue_id, author, "appended comment to thread");
    }

    /// Edits an existing thread entry in place, matched by platform comment
    /// id. Returns whether an entry was updated.
    pub fn update_comment(
        &self,
        issue_id: u64,
        comment_id: u64,
        content: &str,
        updated_at: Option<u64>,
    ) -> bool {
        let Some(mut record) = self.load_issue(issue_id) else {
            warn!(issue = issue_id, "cannot update comment: issue record not found");
            return false;
        };
        let now = current_unix_timestamp();
        let Some(entry) = record
            .comments
            .iter_mut()
            .find(|entry| entry.comment_id == Some(comment_id))
        else {
            return false;
        };
        entry.content = content.to_string();
        entry.updated_at = updated_at.unwrap_or(now);
        record.updated_at = now;
        if let Err(error) = self.save_issue(&record) {
            warn!(issue = issue_id, %error, "failed to persist comment edit");
            return false;
        }
        true
    }

    /// Soft-deletes a thread entry (sets `deleted_at`, keeps the content as
    /// audit trail). Returns whether an entry was touched.
    pub fn soft_delete_comment(&self, issue_id: u64, comment_id: u64) -> bool {
        let Some(mut record) = self.load_issue(issue_id) else {
            warn!(issue = issue_id, "cannot delete comment: issue record not found");
            return false;
        };
        let now = current_unix_timestamp();
        let Some(entry) = record
            .comments
            .iter_mut()
            .find(|entry| entry.comment_id == Some(comment_id))
        else {
            return false;
        };
        entry.deleted_at = Some(now);
        record.updated_at = now;
        if let Err(error) = self.save_issue(&record) {
            warn!(issue = issue_id, %error, "failed to persist comment deletion");
            return false;
        }
        true
    }

    /// Records assignment to the given login, stamping `assigned_at`.
    pub fn set_assignment(&self, issue_id: u64, login: &str) {
        let Some(mut record) = self.load_issue(issue_id) else {
            warn!(issue = issue_id, "cannot set assignment: issue record not found");
            return;
        };
        let now = current_unix_timestamp();
        record.assigned_to = Some(login.to_string());
        record.assigned_at = Some(now);
        record.updated_at = now;
        if let Err(error) = self.save_issue(&record) {
            warn!(issue = issue_id, %error, "failed to persist assignment");
        }
    }

    /// Clears `assigned_to`/`assigned_at` together; status is untouched.
    pub fn clear_assignment(&self, issue_id: u64) {
        let Some(mut record) = self.load_issue(issue_id) else {
            warn!(issue = issue_id, "cannot clear assignment: issue record not found");
            return;
        };
        record.assigned_to = None;
        record.assigned_at = None;
        record.updated_at = current_unix_timestamp();
        if let Err(error) = self.save_issue(&record) {
            warn!(issue = issue_id, %error, "failed to persist unassignment");
        }
    }

    /// Updates title/description in place (issue edited event); status is
    /// untouched. No-op when the record is missing.
    pub fn update_content(&self, issue_id: u64, title: Option<&str>, description: Option<&str>) {
        let Some(mut record) = self.load_issue(issue_id) else {
            warn!(issue = issue_id, "cannot update content: issue record not found");
            return;
        };
        if let Some(title) = title {
            record.title = title.to_string();
        }
        if let Some(description) = description {
            record.description = description.to_string();
        }
        record.updated_at = current_unix_timestamp();
        if let Err(error) = self.save_issue(&record) {
            warn!(issue = issue_id, %error, "failed to persist content edit");
        }
    }

    /// Full scan over the issues directory, returning records with the
    /// given status sorted by ascending issue id. The working set is tens
    /// of issues, so a scan is acceptable; the stable order keeps
    /// "take next" deterministic.
    pub fn list_issues_by_status(&self, status: IssueStatus) -> Vec<IssueRecord> {
        let mut ids: Vec<u64> = match std::fs::read_dir(self.issues_dir()) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .filter_map(|entry| {
                    let path = entry.path();
                    if path.extension().and_then(|ext| ext.to_str()) != Some("yaml") {
                        return None;
                    }
                    path.file_stem()?.to_str()?.parse::<u64>().ok()
                })
                .collect(),
            Err(_) => return Vec::new(),
        };
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.load_issue(id))
            .filter(|record| record.status == status)
            .collect()
    }

    pub fn load_pr(&self, pr_id: u64) -> Option<PrRecord> {
        load_record(&self.pr_path(pr_id))
    }

    /// Idempotent upsert: creates the PR record on the first status-setting
    /// call and updates the status on every later one.
    pub fn set_pr_status(
        &self,
        pr_id: u64,
        status: PrStatus,
        repo: &str,
        linked_issue_id: Option<u64>,
    ) -> Result<PrRecord> {
        let now = current_unix_timestamp();
        let record = match self.load_pr(pr_id) {
            Some(mut existing) => {
                existing.status = status;
                existing.updated_at = now;
                if linked_issue_id.is_some() {
                    existing.linked_issue_id = linked_issue_id;
                }
                existing
            }
            None => PrRecord {
                pr_id,
                repo: repo.to_string(),
                status,
                linked_issue_id,
                created_at: now,
                updated_at: now,
            },
        };
        let raw = serde_yaml::to_string(&record).context("failed to serialize pr record")?;
        write_text_atomic(&self.pr_path(pr_id), &raw)?;
        info!(pr = pr_id, status = %status, "pr status recorded");
        Ok(record)
    }
}

fn load_record<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.is_file() {
        return None;
    }
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to read record file");
            return None;
        }
    };
    match serde_yaml::from_str(&raw) {
        Ok(record) => Some(record),
        Err(error) => {
            warn!(path = %path.display(), %error, "malformed record file, treating as missing");
            None
        }
    }
}
