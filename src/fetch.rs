//! Provider-agnostic commit and merge request fetching

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::git::{self, SourceControlProvider};
use crate::model::{Commit, MergeRequest, Provider, RepoIdentifier};

/// Fetch up to `max_count` commits on `branch`, each with files and diff.
///
/// At most `concurrency` commits are enriched at once; output keeps the
/// provider's order and the first failure aborts the whole fetch.
pub async fn fetch_commits(
    provider: &dyn SourceControlProvider,
    branch: &str,
    max_count: usize,
    concurrency: usize,
) -> Result<Vec<Commit>> {
    if max_count == 0 {
        return Ok(Vec::new());
    }

    let summaries = provider.list_commits(branch, max_count).await?;
    tracing::info!(provider = %provider.kind(), count = summaries.len(), "listed commits");

    stream::iter(summaries.into_iter().take(max_count))
        .map(|summary| async move {
            let detail = provider.commit_detail(&summary).await?;
            let diff = provider.commit_diff(&summary.sha).await?;
            Ok::<_, Error>(Commit {
                sha: summary.sha,
                message: detail.message,
                author: detail.author,
                date: detail.date,
                files: detail.files,
                diff,
            })
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

/// Fetch up to `max_count` closed/merged change requests targeting `branch`
pub async fn fetch_merge_requests(
    provider: &dyn SourceControlProvider,
    branch: &str,
    max_count: usize,
    concurrency: usize,
) -> Result<Vec<MergeRequest>> {
    if max_count == 0 {
        return Ok(Vec::new());
    }

    let summaries = provider.list_change_requests(branch, max_count).await?;
    tracing::info!(provider = %provider.kind(), count = summaries.len(), "listed change requests");

    stream::iter(summaries.into_iter().take(max_count))
        .map(|summary| async move {
            let files = provider.change_request_files(summary.id).await?;
            let diff = provider.change_request_diff(summary.id).await?;
            Ok::<_, Error>(MergeRequest {
                id: summary.id,
                title: summary.title,
                author: summary.author,
                merged_at: summary.merged_at,
                files,
                diff,
            })
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

/// Everything fetched for one run
#[derive(Debug, Clone, Serialize)]
pub struct History {
    pub provider: Provider,
    pub repository: RepoIdentifier,
    pub branch: String,
    pub commits: Vec<Commit>,
    pub merge_requests: Vec<MergeRequest>,
}

/// Binds one repository and branch to a provider client
pub struct Analyzer {
    provider: Box<dyn SourceControlProvider>,
    identifier: RepoIdentifier,
    branch: String,
    max_commits: usize,
    max_merge_requests: usize,
    concurrency: usize,
}

impl Analyzer {
    /// Detect the provider, parse the URL and connect
    pub fn new(settings: &Settings) -> Result<Self> {
        let kind = match settings.provider {
            Some(kind) => kind,
            None => git::detect_provider(&settings.repo_url)?,
        };
        let identifier = git::parse_repo_url(&settings.repo_url, kind)?;
        let provider = git::connect(&identifier, settings.provider_settings(kind))?;

        Ok(Self {
            provider,
            identifier,
            branch: settings.branch.clone(),
            max_commits: settings.max_commits,
            max_merge_requests: settings.max_merge_requests,
            concurrency: settings.concurrency,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider.kind()
    }

    pub fn identifier(&self) -> &RepoIdentifier {
        &self.identifier
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub async fn fetch_commits(&self) -> Result<Vec<Commit>> {
        fetch_commits(
            self.provider.as_ref(),
            &self.branch,
            self.max_commits,
            self.concurrency,
        )
        .await
    }

    pub async fn fetch_merge_requests(&self) -> Result<Vec<MergeRequest>> {
        fetch_merge_requests(
            self.provider.as_ref(),
            &self.branch,
            self.max_merge_requests,
            self.concurrency,
        )
        .await
    }

    /// Commits first, then merge requests
    pub async fn fetch_history(&self) -> Result<History> {
        let commits = self.fetch_commits().await?;
        let merge_requests = self.fetch_merge_requests().await?;

        Ok(History {
            provider: self.provider(),
            repository: self.identifier.clone(),
            branch: self.branch.clone(),
            commits,
            merge_requests,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiConfig;
    use crate::config::ProviderSettings;
    use crate::git::{ChangeRequestSummary, CommitDetail, CommitSummary};
    use crate::model::{ChangeStatus, FileChange};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(repo_url: &str, api_base: &str) -> Settings {
        let provider = ProviderSettings {
            token: Some("token".to_string()),
            api_base: Some(api_base.to_string()),
            timeout: None,
        };
        Settings {
            repo_url: repo_url.to_string(),
            branch: "main".to_string(),
            provider: None,
            max_commits: 2,
            max_merge_requests: 2,
            concurrency: 1,
            github: provider.clone(),
            gitlab: provider,
            ai: AiConfig::default(),
            output: PathBuf::from("release_notes.md"),
        }
    }

    fn github_detail(message: &str, date: &str) -> String {
        format!(
            r#"{{
                "commit": {{"message": "{}", "author": {{"name": "Ada", "date": "{}"}}}},
                "files": [{{"filename": "src/lib.rs", "status": "modified", "additions": 3, "deletions": 1, "changes": 4}}]
            }}"#,
            message, date
        )
    }

    #[tokio::test]
    async fn test_github_two_commits_issue_five_requests() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/OwnerX/RepoY/commits"))
            .and(query_param("per_page", "2"))
            .and(query_param("sha", "main"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"[{"sha": "bbb"}, {"sha": "aaa"}]"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        for (sha, message, date) in [
            ("bbb", "Second", "2024-03-02T00:00:00Z"),
            ("aaa", "First", "2024-03-01T00:00:00Z"),
        ] {
            Mock::given(method("GET"))
                .and(path(format!("/repos/OwnerX/RepoY/commits/{}", sha)))
                .and(header("Accept", "application/vnd.github+json"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_string(github_detail(message, date)),
                )
                .expect(1)
                .mount(&mock_server)
                .await;

            Mock::given(method("GET"))
                .and(path(format!("/repos/OwnerX/RepoY/commits/{}", sha)))
                .and(header("Accept", "application/vnd.github.v3.diff"))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!("diff {}", sha)))
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        let analyzer =
            Analyzer::new(&settings("https://github.com/OwnerX/RepoY", &mock_server.uri()))
                .unwrap();
        assert_eq!(analyzer.provider(), Provider::GitHub);

        let commits = analyzer.fetch_commits().await.unwrap();
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].sha, "bbb");
        assert_eq!(commits[0].message, "Second");
        assert_eq!(commits[0].diff, "diff bbb");
        assert_eq!(commits[1].sha, "aaa");
        assert_eq!(commits[1].files[0].changes, 4);

        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 5);
    }

    #[tokio::test]
    async fn test_commit_list_404_aborts_without_enrichment() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/OwnerX/RepoY/commits"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let analyzer =
            Analyzer::new(&settings("https://github.com/OwnerX/RepoY", &mock_server.uri()))
                .unwrap();
        let result = analyzer.fetch_commits().await;

        assert_eq!(result.as_ref().err().and_then(|e| e.status()), Some(404));
        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn test_enrichment_failure_returns_no_partial_results() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/repos/OwnerX/RepoY/pulls"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[
                    {"number": 2, "title": "Two", "user": {"login": "ada"}, "merged_at": null},
                    {"number": 1, "title": "One", "user": {"login": "ada"}, "merged_at": null}
                ]"#,
            ))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/OwnerX/RepoY/pulls/2/files"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/repos/OwnerX/RepoY/pulls/1/files"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let analyzer =
            Analyzer::new(&settings("https://github.com/OwnerX/RepoY", &mock_server.uri()))
                .unwrap();

        match analyzer.fetch_merge_requests().await {
            Err(Error::HttpRequest { status, endpoint }) => {
                assert_eq!(status, 502);
                assert!(endpoint.ends_with("/pulls/1/files"));
            }
            other => panic!("expected HttpRequest error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_gitlab_history() {
        let mock_server = MockServer::start().await;
        let project = "/projects/group%2Fsub%2Fproject";

        Mock::given(method("GET"))
            .and(path(format!("{}/repository/commits", project)))
            .and(query_param("ref_name", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"id": "c0ffee", "message": "Fix crash", "author_name": "Grace", "committed_date": "2024-04-01T10:00:00Z"}]"#,
            ))
            .expect(1)
            .mount(&mock_server)
            .await;

        // Listed once for file stats and once for the joined diff
        Mock::given(method("GET"))
            .and(path(format!("{}/repository/commits/c0ffee/diff", project)))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"old_path": "a.rs", "new_path": "a.rs", "new_file": false, "renamed_file": false, "deleted_file": false,
                     "diff": "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -1 +1 @@\n-old\n+new\n"}]"#,
            ))
            .expect(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/merge_requests", project)))
            .and(query_param("state", "merged"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"iid": 9, "title": "Crash fix", "author": {"username": "grace"}, "merged_at": "2024-04-01T11:00:00Z"}]"#,
            ))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/merge_requests/9/changes", project)))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"changes": [{"new_path": "a.rs", "new_file": false, "renamed_file": false, "deleted_file": false, "diff": "x"}]}"#,
            ))
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("{}/merge_requests/9/diffs", project)))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"[{"new_path": "a.rs", "diff": "@@ -1 +1 @@"}]"#,
            ))
            .mount(&mock_server)
            .await;

        let analyzer = Analyzer::new(&settings(
            "https://gitlab.com/group/sub/project.git",
            &mock_server.uri(),
        ))
        .unwrap();
        let history = analyzer.fetch_history().await.unwrap();

        assert_eq!(history.provider, Provider::GitLab);
        assert_eq!(history.commits.len(), 1);
        let commit = &history.commits[0];
        assert_eq!(commit.author, "Grace");
        assert_eq!(
            commit.files,
            vec![FileChange {
                filename: "a.rs".to_string(),
                status: ChangeStatus::Modified,
                additions: 1,
                deletions: 1,
                changes: 2,
            }]
        );
        assert!(commit.diff.starts_with("diff --git a/a.rs"));

        assert_eq!(history.merge_requests.len(), 1);
        assert_eq!(history.merge_requests[0].id, 9);
        assert_eq!(history.merge_requests[0].diff, "@@ -1 +1 @@");
    }

    #[tokio::test]
    async fn test_unsupported_provider() {
        let result = Analyzer::new(&settings("https://bitbucket.org/a/b", "http://unused"));
        assert!(matches!(result, Err(Error::UnsupportedProvider(_))));
    }

    /// Provider whose later commits finish first
    struct SlowFirstProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SourceControlProvider for SlowFirstProvider {
        fn kind(&self) -> Provider {
            Provider::GitHub
        }

        async fn list_commits(
            &self,
            _branch: &str,
            max_count: usize,
        ) -> Result<Vec<CommitSummary>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..10)
                .take(max_count)
                .map(|i| CommitSummary {
                    sha: format!("sha{}", i),
                    message: None,
                    author: None,
                    date: None,
                })
                .collect())
        }

        async fn commit_detail(&self, summary: &CommitSummary) -> Result<CommitDetail> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let index: u64 = summary.sha.trim_start_matches("sha").parse().unwrap();
            tokio::time::sleep(Duration::from_millis(40 - index * 10)).await;
            Ok(CommitDetail {
                message: summary.sha.clone(),
                author: "bot".to_string(),
                date: "2024-01-01T00:00:00Z".parse().unwrap(),
                files: vec![],
            })
        }

        async fn commit_diff(&self, sha: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("diff {}", sha))
        }

        async fn list_change_requests(
            &self,
            _branch: &str,
            _max_count: usize,
        ) -> Result<Vec<ChangeRequestSummary>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }

        async fn change_request_files(&self, _id: u64) -> Result<Vec<FileChange>> {
            unreachable!("no change requests listed")
        }

        async fn change_request_diff(&self, _id: u64) -> Result<String> {
            unreachable!("no change requests listed")
        }
    }

    #[tokio::test]
    async fn test_concurrent_enrichment_keeps_provider_order() {
        let provider = SlowFirstProvider {
            calls: AtomicUsize::new(0),
        };

        let commits = fetch_commits(&provider, "main", 4, 4).await.unwrap();
        let shas: Vec<_> = commits.iter().map(|c| c.sha.as_str()).collect();
        assert_eq!(shas, vec!["sha0", "sha1", "sha2", "sha3"]);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1 + 4 * 2);
    }

    #[tokio::test]
    async fn test_zero_max_count_skips_requests() {
        let provider = SlowFirstProvider {
            calls: AtomicUsize::new(0),
        };

        assert!(fetch_commits(&provider, "main", 0, 1).await.unwrap().is_empty());
        assert!(fetch_merge_requests(&provider, "main", 0, 1).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
