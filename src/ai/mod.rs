//! AI module for release note generation
//!
//! Provides:
//! - Release note prompt construction from normalized history
//! - Support for multiple text-generation providers (Ollama, Anthropic, OpenAI)

mod providers;
mod release_notes;

pub use providers::{AiClient, AiConfig, AiProvider};
pub use release_notes::{build_prompt, ReleaseNoteGenerator};
