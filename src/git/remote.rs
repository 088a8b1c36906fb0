//! Repository URL classification and parsing

use url::Url;

use crate::error::{Error, Result};
use crate::model::{Provider, RepoIdentifier};

const GITHUB_HOST: &str = "github.com";
const GITLAB_HOST: &str = "gitlab.com";

/// Split a remote into its host and path.
///
/// Accepts regular URLs (`https://host/path`) and scp-style remotes
/// (`git@host:path`). Returns `None` when neither form applies.
fn split_remote(repo_url: &str) -> Option<(String, String)> {
    let repo_url = repo_url.trim();

    if let Ok(parsed) = Url::parse(repo_url) {
        if let Some(host) = parsed.host_str() {
            return Some((host.to_string(), raw_path(repo_url).to_string()));
        }
    }

    // git@host:owner/repo.git
    let (user_host, path) = repo_url.split_once(':')?;
    if user_host.contains('/') {
        return None;
    }
    let host = user_host.rsplit('@').next()?;
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), path.to_string()))
}

/// Path of `scheme://authority/path?query#fragment` exactly as written.
///
/// `Url::path` percent-encodes spaces and non-ASCII characters, which would
/// leak into the GitLab project path.
fn raw_path(repo_url: &str) -> &str {
    let rest = repo_url
        .split_once("://")
        .map_or(repo_url, |(_, rest)| rest);
    let path = rest.find('/').map_or("", |start| &rest[start..]);
    let end = path.find(['?', '#']).unwrap_or(path.len());
    &path[..end]
}

/// Classify a repository URL by the hosting provider in its host segment
pub fn detect_provider(repo_url: &str) -> Result<Provider> {
    let host = split_remote(repo_url)
        .map(|(host, _)| host)
        .unwrap_or_else(|| repo_url.to_string());

    if host.contains(GITHUB_HOST) {
        Ok(Provider::GitHub)
    } else if host.contains(GITLAB_HOST) {
        Ok(Provider::GitLab)
    } else {
        Err(Error::UnsupportedProvider(repo_url.to_string()))
    }
}

/// Extract provider addressing from a repository URL
pub fn parse_repo_url(repo_url: &str, provider: Provider) -> Result<RepoIdentifier> {
    let (_, path) = split_remote(repo_url)
        .ok_or_else(|| Error::MalformedUrl(format!("cannot parse {}", repo_url)))?;
    let path = path.trim_matches('/');

    match provider {
        Provider::GitHub => {
            let mut parts = path.split('/').filter(|p| !p.is_empty());
            match (parts.next(), parts.next()) {
                (Some(owner), Some(repo)) => Ok(RepoIdentifier::GitHub {
                    owner: owner.to_string(),
                    repo: repo.strip_suffix(".git").unwrap_or(repo).to_string(),
                }),
                _ => Err(Error::MalformedUrl(format!(
                    "expected /owner/repo in {}",
                    repo_url
                ))),
            }
        }
        Provider::GitLab => {
            let project_path = path.strip_suffix(".git").unwrap_or(path);
            if project_path.is_empty() {
                return Err(Error::MalformedUrl(format!(
                    "missing project path in {}",
                    repo_url
                )));
            }
            Ok(RepoIdentifier::GitLab {
                project_path: project_path.replace('/', "%2F"),
            })
        }
    }
}
