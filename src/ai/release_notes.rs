//! Release note generation from normalized commits and merge requests

use crate::error::{Error, Result};
use crate::model::{Commit, MergeRequest};

use super::providers::{AiClient, AiConfig};

/// Turns fetched history into a markdown release notes document
pub struct ReleaseNoteGenerator {
    client: AiClient,
}

impl ReleaseNoteGenerator {
    pub fn new(config: &AiConfig) -> Result<Self> {
        Ok(Self {
            client: AiClient::new(config)?,
        })
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub async fn generate(
        &self,
        commits: &[Commit],
        merge_requests: &[MergeRequest],
    ) -> Result<String> {
        let prompt = build_prompt(commits, merge_requests, self.client.language())?;
        tracing::debug!(prompt_len = prompt.len(), "built release notes prompt");
        self.client.complete(&prompt).await
    }
}

fn language_instruction(language: &str) -> &'static str {
    match language {
        "fr" => "Rédige les notes en français.",
        "es" => "Redacta las notas en español.",
        "de" => "Verfasse die Notizen auf Deutsch.",
        _ => "Write the notes in English.",
    }
}

/// Build the prompt with the history embedded as JSON
pub fn build_prompt(
    commits: &[Commit],
    merge_requests: &[MergeRequest],
    language: &str,
) -> Result<String> {
    let commits_json = serde_json::to_string_pretty(commits)
        .map_err(|e| Error::Generation(format!("Failed to serialize commits: {}", e)))?;
    let merge_requests_json = serde_json::to_string_pretty(merge_requests)
        .map_err(|e| Error::Generation(format!("Failed to serialize merge requests: {}", e)))?;

    Ok(format!(
        r#"Analyze these Git commits and merge requests to generate professional release notes.
Focus on:
- Code changes in diffs
- File modifications (added/modified/deleted/renamed)
- Commit message patterns
- Merge/Pull requests (if available)
- Impact analysis of changes

Use exactly these sections, each heading in bold:

1. Overview of changes

2. Commits analyzed
   For each commit: date, message, author, commit ID.

3. Technical breakdown by category
   New Features, Improvements, Bug Fixes, Other (omit empty categories).

4. Notable code modifications (categorized points)

5. Files changed summary, as a markdown table:
   | File | Changes | Status | Additions | Deletions |
   |------|---------|--------|-----------|-----------|

Commits to analyze:
{}

Merge requests to analyze:
{}

Output markdown with technical depth and highlight significant code changes.
Line counts for GitLab files are estimates.
Do not mention AI generation in any form.
{}"#,
        commits_json,
        merge_requests_json,
        language_instruction(language)
    ))
}
