//! GitLab REST v4 provider

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use serde::Deserialize;

use super::files::{format_gitlab_files, join_gitlab_diffs, GitLabDiff};
use super::http::ApiClient;
use super::{ChangeRequestSummary, CommitDetail, CommitSummary, SourceControlProvider};
use crate::config::ProviderSettings;
use crate::error::{Error, Result};
use crate::model::{FileChange, Provider};

pub const DEFAULT_API_BASE: &str = "https://gitlab.com/api/v4";
const PRIVATE_TOKEN: &str = "private-token";

#[derive(Debug, Deserialize)]
struct GitLabCommit {
    id: String,
    message: String,
    author_name: String,
    committed_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct GitLabMergeRequest {
    iid: u64,
    title: String,
    author: GitLabUser,
    merged_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct GitLabChanges {
    #[serde(default)]
    changes: Vec<GitLabDiff>,
}

/// Client for one project on GitLab
#[derive(Debug, Clone)]
pub struct GitLabProvider {
    client: ApiClient,
    project_path: String,
}

impl GitLabProvider {
    /// `project_path` must already be URL-encoded (`group%2Fproject`)
    pub fn new(project_path: &str, settings: &ProviderSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(ref token) = settings.token {
            let value = HeaderValue::from_str(token).map_err(|_| {
                Error::Configuration("GitLab token is not a valid header value".to_string())
            })?;
            headers.insert(HeaderName::from_static(PRIVATE_TOKEN), value);
        }

        let base = settings.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        Ok(Self {
            client: ApiClient::new(base, headers, settings.timeout)?,
            project_path: project_path.to_string(),
        })
    }

    fn project(&self) -> String {
        format!("/projects/{}", self.project_path)
    }

    async fn commit_diffs(&self, sha: &str) -> Result<Vec<GitLabDiff>> {
        let path = format!("{}/repository/commits/{}/diff", self.project(), sha);
        self.client.get_json(&path, &[]).await
    }
}

#[async_trait]
impl SourceControlProvider for GitLabProvider {
    fn kind(&self) -> Provider {
        Provider::GitLab
    }

    async fn list_commits(&self, branch: &str, max_count: usize) -> Result<Vec<CommitSummary>> {
        let path = format!("{}/repository/commits", self.project());
        let commits: Vec<GitLabCommit> = self
            .client
            .get_json(
                &path,
                &[("per_page", max_count.to_string()), ("ref_name", branch.to_string())],
            )
            .await?;

        Ok(commits
            .into_iter()
            .take(max_count)
            .map(|c| CommitSummary {
                sha: c.id,
                message: Some(c.message),
                author: Some(c.author_name),
                date: Some(c.committed_date),
            })
            .collect())
    }

    async fn commit_detail(&self, summary: &CommitSummary) -> Result<CommitDetail> {
        let diffs = self.commit_diffs(&summary.sha).await?;

        // The list endpoint already returned the metadata
        Ok(CommitDetail {
            message: summary.message.clone().unwrap_or_default(),
            author: summary.author.clone().unwrap_or_default(),
            date: summary.date.unwrap_or_default(),
            files: format_gitlab_files(&diffs),
        })
    }

    async fn commit_diff(&self, sha: &str) -> Result<String> {
        Ok(join_gitlab_diffs(&self.commit_diffs(sha).await?))
    }

    async fn list_change_requests(
        &self,
        branch: &str,
        max_count: usize,
    ) -> Result<Vec<ChangeRequestSummary>> {
        let path = format!("{}/merge_requests", self.project());
        let requests: Vec<GitLabMergeRequest> = self
            .client
            .get_json(
                &path,
                &[
                    ("per_page", max_count.to_string()),
                    ("state", "merged".to_string()),
                    ("target_branch", branch.to_string()),
                ],
            )
            .await?;

        Ok(requests
            .into_iter()
            .take(max_count)
            .map(|mr| ChangeRequestSummary {
                id: mr.iid,
                title: mr.title,
                author: mr.author.username,
                merged_at: mr.merged_at,
            })
            .collect())
    }

    async fn change_request_files(&self, id: u64) -> Result<Vec<FileChange>> {
        let path = format!("{}/merge_requests/{}/changes", self.project(), id);
        let changes: GitLabChanges = self.client.get_json(&path, &[]).await?;
        Ok(format_gitlab_files(&changes.changes))
    }

    async fn change_request_diff(&self, id: u64) -> Result<String> {
        let path = format!("{}/merge_requests/{}/diffs", self.project(), id);
        let diffs: Vec<GitLabDiff> = self.client.get_json(&path, &[]).await?;
        Ok(join_gitlab_diffs(&diffs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeStatus;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> GitLabProvider {
        let settings = ProviderSettings {
            token: Some("glpat-test".to_string()),
            api_base: Some(server.uri()),
            timeout: None,
        };
        GitLabProvider::new("group%2Fproject", &settings).unwrap()
    }

    #[tokio::test]
    async fn test_list_commits_keeps_listing_metadata() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/group%2Fproject/repository/commits"))
            .and(query_param("ref_name", "main"))
            .and(query_param("per_page", "5"))
            .and(header("PRIVATE-TOKEN", "glpat-test"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{
                    "id": "f00d",
                    "message": "Bump version\n",
                    "author_name": "Grace",
                    "committed_date": "2024-04-01T10:00:00.000+02:00"
                }]"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let commits = provider(&mock_server).list_commits("main", 5).await.unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].sha, "f00d");
        assert_eq!(commits[0].author.as_deref(), Some("Grace"));
        assert_eq!(
            commits[0].date.unwrap().to_rfc3339(),
            "2024-04-01T08:00:00+00:00"
        );
    }

    #[tokio::test]
    async fn test_merge_request_files_and_diff() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/group%2Fproject/merge_requests/7/changes"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{
                    "iid": 7,
                    "changes": [
                        {"old_path": "a", "new_path": "a", "new_file": true, "renamed_file": false, "deleted_file": false, "diff": "@@ -0,0 +1 @@\n+a\n"},
                        {"old_path": "b", "new_path": "b", "new_file": false, "renamed_file": false, "deleted_file": true, "diff": "@@ -1 +0,0 @@\n-b\n"}
                    ]
                }"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/projects/group%2Fproject/merge_requests/7/diffs"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"old_path": "a", "new_path": "a", "new_file": true, "renamed_file": false, "deleted_file": false, "diff": "+a"},
                    {"old_path": "b", "new_path": "b", "new_file": false, "renamed_file": false, "deleted_file": true, "diff": "-b"}
                ]"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        let gitlab = provider(&mock_server);

        let files = gitlab.change_request_files(7).await.unwrap();
        let statuses: Vec<_> = files.iter().map(|f| f.status).collect();
        assert_eq!(statuses, vec![ChangeStatus::Added, ChangeStatus::Deleted]);

        let diff = gitlab.change_request_diff(7).await.unwrap();
        assert_eq!(diff, "+a\n-b");
    }

    #[tokio::test]
    async fn test_list_merge_requests_filters_merged() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/projects/group%2Fproject/merge_requests"))
            .and(query_param("state", "merged"))
            .and(query_param("target_branch", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"iid": 3, "title": "Refactor", "author": {"username": "grace"}, "merged_at": "2024-04-02T09:30:00Z"}]"#,
            ))
            .mount(&mock_server)
            .await;

        let requests = provider(&mock_server)
            .list_change_requests("main", 5)
            .await
            .unwrap();
        assert_eq!(requests[0].id, 3);
        assert_eq!(requests[0].author, "grace");
    }
}
