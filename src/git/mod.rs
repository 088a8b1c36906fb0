//! Git hosting provider module
//!
//! Provides:
//! - Provider detection and repository URL parsing
//! - A `SourceControlProvider` abstraction over the GitHub and GitLab REST APIs
//! - File-change normalization

pub mod files;
pub mod github;
pub mod gitlab;
pub mod http;
pub mod remote;

pub use files::{
    approximate_line_counts, format_github_files, format_gitlab_files, gitlab_change_type,
};
pub use github::GitHubProvider;
pub use gitlab::GitLabProvider;
pub use remote::{detect_provider, parse_repo_url};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::ProviderSettings;
use crate::error::Result;
use crate::model::{FileChange, Provider, RepoIdentifier};

/// Entry from a commit list endpoint
///
/// GitLab's list already carries message, author and date; GitHub's summaries
/// leave them empty and the detail request fills them in.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitSummary {
    pub sha: String,
    pub message: Option<String>,
    pub author: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// Full commit metadata plus its changed files
#[derive(Debug, Clone, PartialEq)]
pub struct CommitDetail {
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub files: Vec<FileChange>,
}

/// Entry from a pull request / merge request list endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRequestSummary {
    /// PR number on GitHub, MR iid on GitLab
    pub id: u64,
    pub title: String,
    pub author: String,
    pub merged_at: Option<DateTime<Utc>>,
}

/// Capabilities every hosting provider exposes to the fetchers
#[async_trait]
pub trait SourceControlProvider: Send + Sync {
    fn kind(&self) -> Provider;

    /// Up to `max_count` most recent commits on `branch`, in provider order
    async fn list_commits(&self, branch: &str, max_count: usize) -> Result<Vec<CommitSummary>>;

    async fn commit_detail(&self, summary: &CommitSummary) -> Result<CommitDetail>;

    /// Raw unified diff of one commit
    async fn commit_diff(&self, sha: &str) -> Result<String>;

    /// Up to `max_count` closed/merged change requests targeting `branch`
    async fn list_change_requests(
        &self,
        branch: &str,
        max_count: usize,
    ) -> Result<Vec<ChangeRequestSummary>>;

    async fn change_request_files(&self, id: u64) -> Result<Vec<FileChange>>;

    async fn change_request_diff(&self, id: u64) -> Result<String>;
}

/// Build the provider client matching `identifier`
pub fn connect(
    identifier: &RepoIdentifier,
    settings: &ProviderSettings,
) -> Result<Box<dyn SourceControlProvider>> {
    if settings.token.is_none() {
        tracing::warn!(
            provider = %identifier.provider(),
            "no access token configured, requests will be unauthenticated"
        );
    }

    let provider: Box<dyn SourceControlProvider> = match identifier {
        RepoIdentifier::GitHub { owner, repo } => {
            Box::new(GitHubProvider::new(owner, repo, settings)?)
        }
        RepoIdentifier::GitLab { project_path } => {
            Box::new(GitLabProvider::new(project_path, settings)?)
        }
    };
    Ok(provider)
}
