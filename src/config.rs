use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai::{AiConfig, AiProvider};
use crate::error::{Error, Result};
use crate::model::Provider;

pub const CONFIG_FILE: &str = "relnotes.toml";
pub const DEFAULT_OUTPUT: &str = "release_notes.md";
pub const DEFAULT_MAX_COMMITS: usize = 5;
pub const DEFAULT_MAX_MERGE_REQUESTS: usize = 5;

/// Contents of `relnotes.toml`; every section is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub repository: RepositoryConfig,
    pub fetch: FetchConfig,
    pub github: ProviderConfig,
    pub gitlab: ProviderConfig,
    pub ai: AiConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub url: Option<String>,
    pub branch: Option<String>,
    /// Skip host detection (self-hosted instances)
    pub provider: Option<Provider>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub max_commits: Option<usize>,
    pub max_merge_requests: Option<usize>,
    /// Commits/PRs enriched at once (default: 1, fully sequential)
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Access token, may reference env vars like ${GITHUB_TOKEN}
    pub token: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            Error::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load an explicit path, or `relnotes.toml` when present, or defaults
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load(Path::new(CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }
}

/// Values given on the command line; they win over everything else
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub repo_url: Option<String>,
    pub branch: Option<String>,
    pub provider: Option<Provider>,
    pub max_commits: Option<usize>,
    pub max_merge_requests: Option<usize>,
    pub concurrency: Option<usize>,
    pub output: Option<PathBuf>,
    pub ai_provider: Option<String>,
    pub model: Option<String>,
}

/// Connection settings for one hosting provider
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub token: Option<String>,
    pub api_base: Option<String>,
    pub timeout: Option<Duration>,
}

/// Fully resolved run configuration, built once at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub repo_url: String,
    pub branch: String,
    pub provider: Option<Provider>,
    pub max_commits: usize,
    pub max_merge_requests: usize,
    pub concurrency: usize,
    pub github: ProviderSettings,
    pub gitlab: ProviderSettings,
    pub ai: AiConfig,
    pub output: PathBuf,
}

impl Settings {
    /// Resolve from the process environment
    pub fn from_env(config: Config, overrides: Overrides) -> Result<Self> {
        Self::resolve(config, overrides, &|key| std::env::var(key).ok())
    }

    /// Merge defaults < config file < environment < overrides
    pub fn resolve(
        config: Config,
        overrides: Overrides,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let env_var = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let expand = |value: String| -> String {
            shellexpand::env_with_context_no_errors(&value, |var| env(var)).into_owned()
        };

        let repo_url = overrides
            .repo_url
            .or_else(|| env_var("REPO_URL"))
            .or(config.repository.url)
            .ok_or_else(|| missing("REPO_URL", "repository.url"))?;
        let branch = overrides
            .branch
            .or_else(|| env_var("BRANCH_NAME"))
            .or(config.repository.branch)
            .ok_or_else(|| missing("BRANCH_NAME", "repository.branch"))?;

        let max_commits = match overrides.max_commits {
            Some(n) => n,
            None => parse_count(env_var("MAX_COMMITS"), "MAX_COMMITS")?
                .or(config.fetch.max_commits)
                .unwrap_or(DEFAULT_MAX_COMMITS),
        };
        let max_merge_requests = match overrides.max_merge_requests {
            Some(n) => n,
            None => parse_count(env_var("MAX_MERGE_REQUESTS"), "MAX_MERGE_REQUESTS")?
                .or(config.fetch.max_merge_requests)
                .unwrap_or(DEFAULT_MAX_MERGE_REQUESTS),
        };
        let concurrency = overrides
            .concurrency
            .or(config.fetch.concurrency)
            .unwrap_or(1)
            .max(1);
        let timeout = config.fetch.timeout_secs.map(Duration::from_secs);

        let github = ProviderSettings {
            token: env_var("GITHUB_TOKEN").or(config.github.token.map(expand)),
            api_base: config.github.api_base,
            timeout,
        };
        let gitlab = ProviderSettings {
            token: env_var("GITLAB_TOKEN").or(config.gitlab.token.map(expand)),
            api_base: config.gitlab.api_base,
            timeout,
        };

        let mut ai = config.ai;
        if let Some(provider) = overrides.ai_provider.or_else(|| env_var("RELNOTES_AI_PROVIDER")) {
            ai.provider = provider;
        }
        if let Some(model) = overrides.model.or_else(|| env_var("RELNOTES_MODEL")) {
            ai.model = Some(model);
        }
        let ai_provider: AiProvider = ai.provider.parse()?;
        ai.api_key = match ai.api_key.map(expand) {
            Some(key) => Some(key),
            None => ai_provider.api_key_var().and_then(env_var),
        };
        if ai.base_url.is_none() && ai_provider == AiProvider::Ollama {
            ai.base_url = env_var("OLLAMA_HOST");
        }

        let output = overrides
            .output
            .or(config.output.path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

        Ok(Self {
            repo_url,
            branch,
            provider: overrides.provider.or(config.repository.provider),
            max_commits,
            max_merge_requests,
            concurrency,
            github,
            gitlab,
            ai,
            output,
        })
    }

    pub fn provider_settings(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::GitHub => &self.github,
            Provider::GitLab => &self.gitlab,
        }
    }
}

fn missing(var: &str, key: &str) -> Error {
    Error::Configuration(format!(
        "Missing required value: set {} or `{}` in {}",
        var, key, CONFIG_FILE
    ))
}

fn parse_count(value: Option<String>, var: &str) -> Result<Option<usize>> {
    value
        .map(|v| {
            v.trim().parse::<usize>().map_err(|_| {
                Error::Configuration(format!("{} must be a non-negative integer, got '{}'", var, v))
            })
        })
        .transpose()
}
