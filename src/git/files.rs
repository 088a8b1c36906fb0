//! File-change normalization for both providers

use serde::Deserialize;

use crate::model::{ChangeStatus, FileChange};

/// File entry as returned by GitHub commit and pull request endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubFile {
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changes: u64,
    /// Absent for binary files and very large diffs
    #[serde(default)]
    pub patch: Option<String>,
}

/// Per-file diff entry as returned by GitLab diff endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct GitLabDiff {
    pub new_path: String,
    #[serde(default)]
    pub old_path: Option<String>,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
    #[serde(default)]
    pub diff: String,
}

/// Fold GitHub's status vocabulary into the normalized set
pub fn github_status(status: &str) -> ChangeStatus {
    match status {
        "added" => ChangeStatus::Added,
        "removed" | "deleted" => ChangeStatus::Deleted,
        "renamed" => ChangeStatus::Renamed,
        _ => ChangeStatus::Modified,
    }
}

pub fn format_github_files(files: &[GitHubFile]) -> Vec<FileChange> {
    files
        .iter()
        .map(|f| FileChange {
            filename: f.filename.clone(),
            status: github_status(&f.status),
            additions: f.additions,
            deletions: f.deletions,
            changes: f.changes,
        })
        .collect()
}

/// Join every available patch with newlines, skipping files without one
pub fn join_github_patches(files: &[GitHubFile]) -> String {
    files
        .iter()
        .filter_map(|f| f.patch.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Change type from GitLab's flags; new_file beats deleted_file beats renamed_file
pub fn gitlab_change_type(entry: &GitLabDiff) -> ChangeStatus {
    if entry.new_file {
        ChangeStatus::Added
    } else if entry.deleted_file {
        ChangeStatus::Deleted
    } else if entry.renamed_file {
        ChangeStatus::Renamed
    } else {
        ChangeStatus::Modified
    }
}

/// Estimate line stats by counting `"\n+"` and `"\n-"` in the diff text,
/// discounting one of each for the `+++`/`---` headers.
///
/// Approximate: lines that merely begin with `+`/`-` as content are counted,
/// and diffs without headers come out one short. Saturates at zero.
pub fn approximate_line_counts(diff: &str) -> (u64, u64, u64) {
    let plus = diff.matches("\n+").count() as u64;
    let minus = diff.matches("\n-").count() as u64;

    let additions = plus.saturating_sub(1);
    let deletions = minus.saturating_sub(1);
    let changes = (plus + minus).saturating_sub(2);
    (additions, deletions, changes)
}

pub fn format_gitlab_files(entries: &[GitLabDiff]) -> Vec<FileChange> {
    entries
        .iter()
        .map(|entry| {
            let (additions, deletions, changes) = approximate_line_counts(&entry.diff);
            FileChange {
                filename: entry.new_path.clone(),
                status: gitlab_change_type(entry),
                additions,
                deletions,
                changes,
            }
        })
        .collect()
}

pub fn join_gitlab_diffs(entries: &[GitLabDiff]) -> String {
    entries
        .iter()
        .map(|entry| entry.diff.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
