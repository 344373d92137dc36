//! GitHub REST implementation of the hosting capability set.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::models::{Comment, Issue, PullRequest, ReviewComment};
use crate::{HostingPlatform, PlatformError, PlatformResult};

const PAGE_SIZE: u32 = 100;
const ERROR_BODY_LIMIT: usize = 600;

#[derive(Debug, Clone, Deserialize)]
struct GithubUser {
    login: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubLabel {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubIssue {
    number: u64,
    title: String,
    body: Option<String>,
    user: Option<GithubUser>,
    #[serde(default)]
    labels: Vec<GithubLabel>,
    state: String,
    created_at: String,
    updated_at: String,
    /// Present when the "issue" is actually a pull request.
    pull_request: Option<serde_json::Value>,
}

impl From<GithubIssue> for Issue {
    fn from(raw: GithubIssue) -> Self {
        Issue {
            number: raw.number,
            title: raw.title,
            body: raw.body.unwrap_or_default(),
            author: raw.user.map(|user| user.login).unwrap_or_default(),
            labels: raw.labels.into_iter().map(|label| label.name).collect(),
            state: raw.state,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GithubComment {
    id: u64,
    body: Option<String>,
    user: Option<GithubUser>,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubBranchRef {
    #[serde(rename = "ref")]
    branch: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubPull {
    number: u64,
    title: String,
    body: Option<String>,
    head: GithubBranchRef,
    base: GithubBranchRef,
    state: String,
    html_url: Option<String>,
}

impl From<GithubPull> for PullRequest {
    fn from(raw: GithubPull) -> Self {
        PullRequest {
            number: raw.number,
            title: raw.title,
            body: raw.body.unwrap_or_default(),
            head_branch: raw.head.branch,
            base_branch: raw.base.branch,
            state: raw.state,
            html_url: raw.html_url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GithubReviewComment {
    id: u64,
    body: Option<String>,
    user: Option<GithubUser>,
    path: Option<String>,
    line: Option<u64>,
    #[serde(default)]
    side: Option<String>,
    created_at: String,
    in_reply_to_id: Option<u64>,
}

impl From<GithubReviewComment> for ReviewComment {
    fn from(raw: GithubReviewComment) -> Self {
        ReviewComment {
            id: raw.id,
            body: raw.body.unwrap_or_default(),
            author: raw.user.map(|user| user.login).unwrap_or_default(),
            path: raw.path.unwrap_or_default(),
            line: raw.line,
            side: raw.side.unwrap_or_else(|| "RIGHT".to_string()),
            created_at: raw.created_at,
            in_reply_to_id: raw.in_reply_to_id,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GithubRepo {
    default_branch: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubRefObject {
    sha: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubRef {
    object: GithubRefObject,
}

/// GitHub adapter over reqwest, with the standard default headers.
#[derive(Clone)]
pub struct GithubPlatform {
    http: reqwest::Client,
    api_base: String,
}

impl GithubPlatform {
    pub fn new(api_base: &str, token: &str) -> PlatformResult<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("quill-bot"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .map_err(|error| PlatformError::transport(format!("invalid token: {error}")))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|error| {
                PlatformError::transport(format!("failed to build http client: {error}"))
            })?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: reqwest::Response) -> PlatformResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let mut message = response.text().await.unwrap_or_default();
        if message.len() > ERROR_BODY_LIMIT {
            message.truncate(ERROR_BODY_LIMIT);
            message.push_str("...");
        }
        Err(PlatformError::new(status.as_u16(), message))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> PlatformResult<T> {
        let response = self
            .http
            .get(format!("{}{path}", self.api_base))
            .query(query)
            .send()
            .await
            .map_err(|error| PlatformError::transport(error.to_string()))?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|error| PlatformError::transport(format!("invalid response body: {error}")))
    }

    async fn send_json(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &serde_json::Value,
    ) -> PlatformResult<reqwest::Response> {
        let response = self
            .http
            .request(method, format!("{}{path}", self.api_base))
            .json(body)
            .send()
            .await
            .map_err(|error| PlatformError::transport(error.to_string()))?;
        Self::check(response).await
    }

    /// Fetches one paginated list endpoint to exhaustion.
    async fn get_paged<T: DeserializeOwned>(
        &self,
        path: &str,
        base_query: &[(&str, &str)],
    ) -> PlatformResult<Vec<T>> {
        let mut page = 1_u32;
        let mut rows: Vec<T> = Vec::new();
        loop {
            let page_value = page.to_string();
            let per_page = PAGE_SIZE.to_string();
            let mut query: Vec<(&str, &str)> = base_query.to_vec();
            query.push(("per_page", per_page.as_str()));
            query.push(("page", page_value.as_str()));
            let chunk: Vec<T> = self.get_json(path, &query).await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);
            if chunk_len < PAGE_SIZE as usize {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(rows)
    }
}

#[async_trait]
impl HostingPlatform for GithubPlatform {
    async fn get_issue(&self, repo: &str, issue_number: u64) -> PlatformResult<Issue> {
        let raw: GithubIssue = self
            .get_json(&format!("/repos/{repo}/issues/{issue_number}"), &[])
            .await?;
        Ok(raw.into())
    }

    async fn get_issue_comments(
        &self,
        repo: &str,
        issue_number: u64,
        since: Option<&str>,
    ) -> PlatformResult<Vec<Comment>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(since) = since {
            query.push(("since", since));
        }
        let rows: Vec<GithubComment> = self
            .get_paged(&format!("/repos/{repo}/issues/{issue_number}/comments"), &query)
            .await?;
        Ok(rows
            .into_iter()
            .map(|raw| Comment {
                id: raw.id,
                body: raw.body.unwrap_or_default(),
                author: raw.user.map(|user| user.login).unwrap_or_default(),
                created_at: raw.created_at,
                updated_at: raw.updated_at,
            })
            .collect())
    }

    async fn create_comment(
        &self,
        repo: &str,
        issue_number: u64,
        body: &str,
    ) -> PlatformResult<()> {
        self.send_json(
            reqwest::Method::POST,
            &format!("/repos/{repo}/issues/{issue_number}/comments"),
            &json!({ "body": body }),
        )
        .await?;
        debug!(repo, issue = issue_number, "posted issue comment");
        Ok(())
    }

    async fn set_labels(
        &self,
        repo: &str,
        issue_number: u64,
        labels: &[&str],
    ) -> PlatformResult<()> {
        self.send_json(
            reqwest::Method::PUT,
            &format!("/repos/{repo}/issues/{issue_number}/labels"),
            &json!({ "labels": labels }),
        )
        .await?;
        Ok(())
    }

    async fn create_branch(
        &self,
        repo: &str,
        branch: &str,
        base: Option<&str>,
    ) -> PlatformResult<()> {
        let base_branch = match base {
            Some(base) => base.to_string(),
            None => self.get_default_branch(repo).await?,
        };
        let base_ref: GithubRef = self
            .get_json(&format!("/repos/{repo}/git/ref/heads/{base_branch}"), &[])
            .await?;
        self.send_json(
            reqwest::Method::POST,
            &format!("/repos/{repo}/git/refs"),
            &json!({
                "ref": format!("refs/heads/{branch}"),
                "sha": base_ref.object.sha,
            }),
        )
        .await?;
        debug!(repo, branch, base = base_branch, "created remote branch");
        Ok(())
    }

    async fn get_default_branch(&self, repo: &str) -> PlatformResult<String> {
        let raw: GithubRepo = self.get_json(&format!("/repos/{repo}"), &[]).await?;
        Ok(raw.default_branch)
    }

    async fn create_pr(
        &self,
        repo: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> PlatformResult<PullRequest> {
        let response = self
            .send_json(
                reqwest::Method::POST,
                &format!("/repos/{repo}/pulls"),
                &json!({ "title": title, "body": body, "head": head, "base": base }),
            )
            .await?;
        let raw: GithubPull = response
            .json()
            .await
            .map_err(|error| PlatformError::transport(format!("invalid response body: {error}")))?;
        Ok(raw.into())
    }

    async fn get_pr(&self, repo: &str, pr_number: u64) -> PlatformResult<PullRequest> {
        let raw: GithubPull = self
            .get_json(&format!("/repos/{repo}/pulls/{pr_number}"), &[])
            .await?;
        Ok(raw.into())
    }

    async fn list_open_issues(&self, repo: &str) -> PlatformResult<Vec<Issue>> {
        let rows: Vec<GithubIssue> = self
            .get_paged(&format!("/repos/{repo}/issues"), &[("state", "open")])
            .await?;
        Ok(rows
            .into_iter()
            .filter(|issue| issue.pull_request.is_none())
            .map(Into::into)
            .collect())
    }

    async fn list_review_comments(
        &self,
        repo: &str,
        pr_number: u64,
    ) -> PlatformResult<Vec<ReviewComment>> {
        let rows: Vec<GithubReviewComment> = self
            .get_paged(&format!("/repos/{repo}/pulls/{pr_number}/comments"), &[])
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn reply_to_review_comment(
        &self,
        repo: &str,
        pr_number: u64,
        comment_id: u64,
        body: &str,
    ) -> PlatformResult<()> {
        self.send_json(
            reqwest::Method::POST,
            &format!("/repos/{repo}/pulls/{pr_number}/comments/{comment_id}/replies"),
            &json!({ "body": body }),
        )
        .await?;
        Ok(())
    }
}
