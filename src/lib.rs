//! relnotes - release notes from Git hosting history
//!
//! A library for turning recent project history into release notes with:
//! - Provider detection and URL parsing for GitHub and GitLab
//! - One normalized schema for commits, merge requests and file changes
//! - Bounded, order-preserving enrichment of commits and merge requests
//! - Release note generation through Ollama, Anthropic, OpenAI or Gemini

pub mod ai;
pub mod config;
pub mod error;
pub mod fetch;
pub mod git;
pub mod model;
pub mod report;

pub use config::{Config, Overrides, ProviderSettings, Settings};
pub use error::{Error, Result};
pub use fetch::{fetch_commits, fetch_merge_requests, Analyzer, History};
pub use git::{detect_provider, parse_repo_url, SourceControlProvider};
pub use model::{ChangeStatus, Commit, FileChange, MergeRequest, Provider, RepoIdentifier};
