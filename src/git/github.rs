//! GitHub REST v3 provider

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde::Deserialize;

use super::files::{format_github_files, join_github_patches, GitHubFile};
use super::http::ApiClient;
use super::{ChangeRequestSummary, CommitDetail, CommitSummary, SourceControlProvider};
use crate::config::ProviderSettings;
use crate::error::{Error, Result};
use crate::model::{FileChange, Provider};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";

#[derive(Debug, Deserialize)]
struct GitHubCommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    commit: GitHubCommitData,
    #[serde(default)]
    files: Vec<GitHubFile>,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitData {
    message: String,
    author: GitHubSignature,
}

#[derive(Debug, Deserialize)]
struct GitHubSignature {
    name: String,
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct GitHubPull {
    number: u64,
    title: String,
    user: GitHubUser,
    merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

/// Client for one `owner/repo` on GitHub
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    client: ApiClient,
    owner: String,
    repo: String,
}

impl GitHubProvider {
    pub fn new(owner: &str, repo: &str, settings: &ProviderSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));
        if let Some(ref token) = settings.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
                Error::Configuration("GitHub token is not a valid header value".to_string())
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        let base = settings.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        Ok(Self {
            client: ApiClient::new(base, headers, settings.timeout)?,
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    fn repo_path(&self) -> String {
        format!("/repos/{}/{}", self.owner, self.repo)
    }

    async fn pull_files(&self, number: u64) -> Result<Vec<GitHubFile>> {
        let path = format!("{}/pulls/{}/files", self.repo_path(), number);
        self.client.get_json(&path, &[]).await
    }
}

#[async_trait]
impl SourceControlProvider for GitHubProvider {
    fn kind(&self) -> Provider {
        Provider::GitHub
    }

    async fn list_commits(&self, branch: &str, max_count: usize) -> Result<Vec<CommitSummary>> {
        let path = format!("{}/commits", self.repo_path());
        let refs: Vec<GitHubCommitRef> = self
            .client
            .get_json(
                &path,
                &[("per_page", max_count.to_string()), ("sha", branch.to_string())],
            )
            .await?;

        Ok(refs
            .into_iter()
            .take(max_count)
            .map(|r| CommitSummary {
                sha: r.sha,
                message: None,
                author: None,
                date: None,
            })
            .collect())
    }

    async fn commit_detail(&self, summary: &CommitSummary) -> Result<CommitDetail> {
        let path = format!("{}/commits/{}", self.repo_path(), summary.sha);
        let detail: GitHubCommit = self.client.get_json(&path, &[]).await?;

        Ok(CommitDetail {
            message: detail.commit.message,
            author: detail.commit.author.name,
            date: detail.commit.author.date,
            files: format_github_files(&detail.files),
        })
    }

    async fn commit_diff(&self, sha: &str) -> Result<String> {
        let path = format!("{}/commits/{}", self.repo_path(), sha);
        self.client.get_text(&path, DIFF_MEDIA_TYPE).await
    }

    async fn list_change_requests(
        &self,
        branch: &str,
        max_count: usize,
    ) -> Result<Vec<ChangeRequestSummary>> {
        let path = format!("{}/pulls", self.repo_path());
        let pulls: Vec<GitHubPull> = self
            .client
            .get_json(
                &path,
                &[
                    ("per_page", max_count.to_string()),
                    ("state", "closed".to_string()),
                    ("base", branch.to_string()),
                ],
            )
            .await?;

        Ok(pulls
            .into_iter()
            .take(max_count)
            .map(|pr| ChangeRequestSummary {
                id: pr.number,
                title: pr.title,
                author: pr.user.login,
                merged_at: pr.merged_at,
            })
            .collect())
    }

    async fn change_request_files(&self, id: u64) -> Result<Vec<FileChange>> {
        Ok(format_github_files(&self.pull_files(id).await?))
    }

    async fn change_request_diff(&self, id: u64) -> Result<String> {
        Ok(join_github_patches(&self.pull_files(id).await?))
    }
}
