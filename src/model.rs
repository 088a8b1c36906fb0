//! Normalized commit and merge request records shared by both providers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// Supported Git hosting providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    GitLab,
}

impl std::str::FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(Provider::GitHub),
            "gitlab" => Ok(Provider::GitLab),
            _ => Err(Error::Configuration(format!(
                "Unknown provider: {}. Use 'github' or 'gitlab'",
                s
            ))),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::GitHub => write!(f, "github"),
            Provider::GitLab => write!(f, "gitlab"),
        }
    }
}

/// Provider-specific addressing for a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RepoIdentifier {
    GitHub { owner: String, repo: String },
    /// Project path with every `/` already encoded as `%2F`
    GitLab { project_path: String },
}

impl RepoIdentifier {
    pub fn provider(&self) -> Provider {
        match self {
            RepoIdentifier::GitHub { .. } => Provider::GitHub,
            RepoIdentifier::GitLab { .. } => Provider::GitLab,
        }
    }
}

impl fmt::Display for RepoIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoIdentifier::GitHub { owner, repo } => write!(f, "{}/{}", owner, repo),
            RepoIdentifier::GitLab { project_path } => write!(f, "{}", project_path),
        }
    }
}

/// How a file was touched by a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    Added,
    Deleted,
    Renamed,
    Modified,
}

impl ChangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeStatus::Added => "added",
            ChangeStatus::Deleted => "deleted",
            ChangeStatus::Renamed => "renamed",
            ChangeStatus::Modified => "modified",
        }
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-file change statistics
///
/// For GitLab the three counters are estimated from the diff text and
/// must be treated as approximate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub filename: String,
    pub status: ChangeStatus,
    pub additions: u64,
    pub deletions: u64,
    pub changes: u64,
}

/// A single commit with its files and unified diff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub date: DateTime<Utc>,
    pub files: Vec<FileChange>,
    pub diff: String,
}

impl Commit {
    /// First seven characters of the SHA
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }

    /// First line of the commit message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// A merged (GitLab) or closed (GitHub) change request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub id: u64,
    pub title: String,
    pub author: String,
    pub merged_at: Option<DateTime<Utc>>,
    pub files: Vec<FileChange>,
    pub diff: String,
}
