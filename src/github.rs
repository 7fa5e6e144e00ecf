//! Commit lookups against the GitHub REST API

use serde::Deserialize;
use tracing::{debug, error};

use crate::error::{RelayError, Result};

/// Substituted for the commit message when the lookup fails.
pub const COMMIT_INFO_PLACEHOLDER: &str = "[ERROR WHILE FETCHING COMMIT INFO]";

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("build_notifier/", env!("CARGO_PKG_VERSION"));

/// Commit metadata shown in the notification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommitInfo {
    pub message: String,
    pub author_name: String,
}

impl CommitInfo {
    pub fn placeholder() -> Self {
        Self {
            message: COMMIT_INFO_PLACEHOLDER.to_string(),
            author_name: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GitCommitResponse {
    message: String,
    author: GitCommitAuthor,
}

#[derive(Debug, Deserialize)]
struct GitCommitAuthor {
    name: String,
}

/// Client for `GET /repos/{org}/{repo}/git/commits/{sha}`
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    org: String,
    token: String,
}

impl GithubClient {
    pub fn new(http: reqwest::Client, api_url: &str, org: &str, token: &str) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            org: org.to_string(),
            token: token.to_string(),
        }
    }

    pub fn commit_url(&self, repo_name: &str, sha: &str) -> String {
        format!(
            "{}/repos/{}/{}/git/commits/{}",
            self.api_url, self.org, repo_name, sha
        )
    }

    /// Fetch the message and author of a single commit.
    pub async fn fetch_commit(&self, repo_name: &str, sha: &str) -> Result<CommitInfo> {
        let url = self.commit_url(repo_name, sha);
        debug!("Fetching commit info from {}", url);

        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, GITHUB_ACCEPT)
            .header(reqwest::header::AUTHORIZATION, format!("token {}", self.token))
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| RelayError::Github(format!("request to {} failed: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RelayError::Github(format!(
                "{} returned {}: {}",
                url, status, text
            )));
        }

        let body: GitCommitResponse = resp
            .json()
            .await
            .map_err(|e| RelayError::Github(format!("malformed commit response: {}", e)))?;

        Ok(CommitInfo {
            message: body.message,
            author_name: body.author.name,
        })
    }

    /// Like [`fetch_commit`](Self::fetch_commit), but never fails: errors are logged
    /// and the placeholder is returned so the notification still goes out.
    pub async fn enrich(&self, repo_name: &str, sha: &str) -> CommitInfo {
        match self.fetch_commit(repo_name, sha).await {
            Ok(info) => info,
            Err(e) => {
                error!(repo = repo_name, sha = sha, "Failed to fetch commit info: {}", e);
                CommitInfo::placeholder()
            }
        }
    }
}
