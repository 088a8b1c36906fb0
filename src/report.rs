use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{Commit, MergeRequest};

/// Print the analyzed commits the way a reviewer skims a log
pub fn print_commits(commits: &[Commit]) {
    println!("\n{}", "Commits Analyzed:".bold());

    if commits.is_empty() {
        println!("  {}", "No commits found".dimmed());
        return;
    }

    for commit in commits {
        println!(
            "  {} [{}] {}",
            "•".green(),
            commit.short_sha().yellow(),
            commit.summary()
        );
        println!(
            "    {} {} on {}",
            "by".dimmed(),
            commit.author.cyan(),
            commit.date.to_rfc3339()
        );
        println!("    {} {}", "files:".dimmed(), file_list(&commit.files));
    }
}

pub fn print_merge_requests(merge_requests: &[MergeRequest]) {
    println!("\n{}", "Merge Requests Analyzed:".bold());

    if merge_requests.is_empty() {
        println!(
            "  {}",
            "No merge requests found or configured to be skipped.".dimmed()
        );
        return;
    }

    for mr in merge_requests {
        println!(
            "  {} [!{}] {}",
            "•".green(),
            mr.id.to_string().yellow(),
            mr.title
        );
        let merged = mr
            .merged_at
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "not merged".to_string());
        println!("    {} {} on {}", "by".dimmed(), mr.author.cyan(), merged);
        println!("    {} {}", "files:".dimmed(), file_list(&mr.files));
    }
}

fn file_list(files: &[crate::model::FileChange]) -> String {
    if files.is_empty() {
        return "-".to_string();
    }
    files
        .iter()
        .map(|f| f.filename.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Delete release notes left over from an earlier run
pub fn remove_stale_output(path: &Path) -> Result<bool> {
    if path.exists() {
        fs::remove_file(path)?;
        tracing::info!(path = %path.display(), "removed stale release notes");
        return Ok(true);
    }
    Ok(false)
}

/// Write the notes through a temp file so a failed write leaves nothing behind
pub fn write_release_notes(path: &Path, notes: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = tmp_path(path);
    if let Err(e) = fs::write(&tmp, notes) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
