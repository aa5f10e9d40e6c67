use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::models::{BranchProtection, Label, PullRequest, Review};

const USER_AGENT: &str = "ampel-bot";
const GITHUB_API: &str = "https://api.github.com";

pub type ApiResult<T> = Result<T, ApiError>;

/// Errors from GitHub API calls.
///
/// `NotFound` and `Conflict` are the only kinds callers may tolerate:
/// a missing label on remove, an absent branch protection, or losing a
/// label-creation race are all expected during normal operation. Everything
/// else must propagate.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("GitHub API error {status} {context}: {body}")]
    Status {
        status: StatusCode,
        context: String,
        body: String,
    },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn get_pull_request(&self, owner: &str, repo: &str, number: u64)
        -> ApiResult<PullRequest>;
    async fn list_reviews(&self, owner: &str, repo: &str, number: u64) -> ApiResult<Vec<Review>>;
    /// Usernames currently requested for review on the pull request.
    async fn list_review_requests(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> ApiResult<Vec<String>>;
    async fn get_label(&self, owner: &str, repo: &str, name: &str) -> ApiResult<Label>;
    async fn create_label(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        color: &str,
        description: &str,
    ) -> ApiResult<()>;
    async fn update_label(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        color: &str,
        description: &str,
    ) -> ApiResult<()>;
    async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        names: &[String],
    ) -> ApiResult<()>;
    /// Fails with `ApiError::NotFound` when the label is not on the issue.
    async fn remove_label(&self, owner: &str, repo: &str, number: u64, name: &str)
        -> ApiResult<()>;
    async fn get_branch_protection(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> ApiResult<BranchProtection>;
}

pub struct HttpGithubClient {
    client: Client,
    token: String,
}

impl HttpGithubClient {
    pub fn new(client: Client, token: String) -> Self {
        Self { client, token }
    }

    fn decorate(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
    }

    async fn send(&self, builder: RequestBuilder, context: &str) -> ApiResult<Response> {
        let resp = self.decorate(builder).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::NOT_FOUND => ApiError::NotFound(context.to_string()),
            StatusCode::CONFLICT => ApiError::Conflict(context.to_string()),
            // Duplicate label creation comes back as a 422 validation error
            // with code "already_exists".
            StatusCode::UNPROCESSABLE_ENTITY if body.contains("already_exists") => {
                ApiError::Conflict(context.to_string())
            }
            _ => ApiError::Status {
                status,
                context: context.to_string(),
                body,
            },
        })
    }
}

#[derive(Deserialize)]
struct ReviewRequests {
    #[serde(default)]
    users: Vec<super::models::Account>,
}

#[async_trait]
impl GithubApi for HttpGithubClient {
    async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> ApiResult<PullRequest> {
        let url = format!("{GITHUB_API}/repos/{owner}/{repo}/pulls/{number}");
        let resp = self
            .send(self.client.get(&url), &format!("fetching PR #{number}"))
            .await?;
        Ok(resp.json().await?)
    }

    async fn list_reviews(&self, owner: &str, repo: &str, number: u64) -> ApiResult<Vec<Review>> {
        let url = format!("{GITHUB_API}/repos/{owner}/{repo}/pulls/{number}/reviews");
        let resp = self
            .send(
                self.client.get(&url).query(&[("per_page", "100")]),
                &format!("listing reviews for PR #{number}"),
            )
            .await?;
        Ok(resp.json().await?)
    }

    async fn list_review_requests(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> ApiResult<Vec<String>> {
        let url = format!("{GITHUB_API}/repos/{owner}/{repo}/pulls/{number}/requested_reviewers");
        let resp = self
            .send(
                self.client.get(&url),
                &format!("listing review requests for PR #{number}"),
            )
            .await?;
        let requests: ReviewRequests = resp.json().await?;
        Ok(requests.users.into_iter().map(|u| u.login).collect())
    }

    async fn get_label(&self, owner: &str, repo: &str, name: &str) -> ApiResult<Label> {
        let url = format!("{GITHUB_API}/repos/{owner}/{repo}/labels/{name}");
        let resp = self
            .send(self.client.get(&url), &format!("fetching label '{name}'"))
            .await?;
        Ok(resp.json().await?)
    }

    async fn create_label(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        color: &str,
        description: &str,
    ) -> ApiResult<()> {
        let url = format!("{GITHUB_API}/repos/{owner}/{repo}/labels");
        let payload = serde_json::json!({
            "name": name,
            "color": color,
            "description": description,
        });
        self.send(
            self.client.post(&url).json(&payload),
            &format!("creating label '{name}'"),
        )
        .await?;
        Ok(())
    }

    async fn update_label(
        &self,
        owner: &str,
        repo: &str,
        name: &str,
        color: &str,
        description: &str,
    ) -> ApiResult<()> {
        let url = format!("{GITHUB_API}/repos/{owner}/{repo}/labels/{name}");
        let payload = serde_json::json!({
            "color": color,
            "description": description,
        });
        self.send(
            self.client.patch(&url).json(&payload),
            &format!("updating label '{name}'"),
        )
        .await?;
        Ok(())
    }

    async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        names: &[String],
    ) -> ApiResult<()> {
        let url = format!("{GITHUB_API}/repos/{owner}/{repo}/issues/{number}/labels");
        let payload = serde_json::json!({ "labels": names });
        self.send(
            self.client.post(&url).json(&payload),
            &format!("adding labels to PR #{number}"),
        )
        .await?;
        Ok(())
    }

    async fn remove_label(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        name: &str,
    ) -> ApiResult<()> {
        let url = format!("{GITHUB_API}/repos/{owner}/{repo}/issues/{number}/labels/{name}");
        self.send(
            self.client.delete(&url),
            &format!("removing label '{name}' from PR #{number}"),
        )
        .await?;
        Ok(())
    }

    async fn get_branch_protection(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> ApiResult<BranchProtection> {
        let url = format!("{GITHUB_API}/repos/{owner}/{repo}/branches/{branch}/protection");
        let resp = self
            .send(
                self.client.get(&url),
                &format!("fetching branch protection for '{branch}'"),
            )
            .await?;
        Ok(resp.json().await?)
    }
}
