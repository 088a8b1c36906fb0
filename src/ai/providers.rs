//! Text-generation provider implementations

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Supported text-generation backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiProvider {
    #[default]
    Ollama,
    Anthropic,
    OpenAI,
    Gemini,
}

impl AiProvider {
    /// Environment variable holding the API key, for hosted backends
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            AiProvider::Ollama => None,
            AiProvider::Anthropic => Some("ANTHROPIC_API_KEY"),
            AiProvider::OpenAI => Some("OPENAI_API_KEY"),
            AiProvider::Gemini => Some("GOOGLE_API_KEY"),
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            AiProvider::Ollama => "llama3.2",
            AiProvider::Anthropic => "claude-sonnet-4-20250514",
            AiProvider::OpenAI => "gpt-4o",
            AiProvider::Gemini => "gemini-1.5-flash-latest",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            AiProvider::Ollama => "http://localhost:11434",
            AiProvider::Anthropic => "https://api.anthropic.com",
            AiProvider::OpenAI => "https://api.openai.com",
            AiProvider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

impl std::str::FromStr for AiProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "" | "ollama" | "llama" => Ok(AiProvider::Ollama),
            "anthropic" | "claude" => Ok(AiProvider::Anthropic),
            "openai" | "gpt" => Ok(AiProvider::OpenAI),
            "gemini" | "google" => Ok(AiProvider::Gemini),
            _ => Err(Error::Configuration(format!(
                "Unknown AI provider: {}. Use 'ollama', 'anthropic', 'openai' or 'gemini'",
                s
            ))),
        }
    }
}

/// AI configuration (`[ai]` in relnotes.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// AI provider to use
    pub provider: String,
    /// API key (can use env var like ${ANTHROPIC_API_KEY})
    pub api_key: Option<String>,
    /// Model to use
    pub model: Option<String>,
    /// Override the API host (self-hosted Ollama, proxies)
    pub base_url: Option<String>,
    /// Language of the generated notes: en, fr, es or de
    pub language: String,
    pub max_tokens: u32,
    /// Sampling temperature, sent to Gemini
    pub temperature: f32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            api_key: None,
            model: None,
            base_url: None,
            language: "en".to_string(),
            max_tokens: 4096,
            temperature: 0.3,
        }
    }
}

/// Request to the Ollama `/api/chat` endpoint
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
}

/// Request to Anthropic Claude API
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ChatMessage>,
}

/// Response from Anthropic Claude API
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    #[serde(default)]
    text: String,
}

/// Request to OpenAI API
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

/// Response from OpenAI API
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: ChatMessage,
}

/// Request to the Gemini `generateContent` endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

/// AI client for making API calls
pub struct AiClient {
    provider: AiProvider,
    api_key: Option<String>,
    model: String,
    base_url: String,
    language: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl AiClient {
    /// Create a new AI client from resolved configuration
    pub fn new(config: &AiConfig) -> Result<Self> {
        let provider: AiProvider = config.provider.parse()?;

        if let Some(var) = provider.api_key_var() {
            if config.api_key.is_none() {
                return Err(Error::Configuration(format!(
                    "API key not found for {:?}. Set it in [ai] or via {}",
                    provider, var
                )));
            }
        }

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| provider.default_model().to_string());
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            provider,
            api_key: config.api_key.clone(),
            model,
            base_url,
            language: config.language.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            client: reqwest::Client::new(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Send a single user prompt and return the model's text
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::info!(provider = ?self.provider, model = %self.model, "requesting completion");

        let text = match self.provider {
            AiProvider::Ollama => self.call_ollama(prompt).await?,
            AiProvider::Anthropic => self.call_anthropic(prompt).await?,
            AiProvider::OpenAI => self.call_openai(prompt).await?,
            AiProvider::Gemini => self.call_gemini(prompt).await?,
        };

        if text.trim().is_empty() {
            return Err(Error::Generation(format!(
                "Empty response from {:?}",
                self.provider
            )));
        }
        Ok(text)
    }

    fn user_message(prompt: &str) -> Vec<ChatMessage> {
        vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }]
    }

    async fn call_ollama(&self, prompt: &str) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            messages: Self::user_message(prompt),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Failed to call Ollama: {}", e)))?;

        let result: OllamaResponse = read_json(response, "Ollama").await?;
        Ok(result.message.map(|m| m.content).unwrap_or_default())
    }

    async fn call_anthropic(&self, prompt: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: Self::user_message(prompt),
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.as_deref().unwrap_or_default())
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Failed to call Anthropic API: {}", e)))?;

        let result: AnthropicResponse = read_json(response, "Anthropic").await?;
        Ok(result
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join(""))
    }

    async fn call_openai(&self, prompt: &str) -> Result<String> {
        let request = OpenAIRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: Self::user_message(prompt),
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.as_deref().unwrap_or_default()),
            )
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Failed to call OpenAI API: {}", e)))?;

        let result: OpenAIResponse = read_json(response, "OpenAI").await?;
        Ok(result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn call_gemini(&self, prompt: &str) -> Result<String> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_tokens,
            },
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .header("x-goog-api-key", self.api_key.as_deref().unwrap_or_default())
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Failed to call Gemini API: {}", e)))?;

        let result: GeminiResponse = read_json(response, "Gemini").await?;
        Ok(result
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    backend: &str,
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(Error::Generation(format!(
            "{} API error ({}): {}",
            backend, status, error_text
        )));
    }

    response
        .json()
        .await
        .map_err(|e| Error::Generation(format!("Failed to parse {} response: {}", backend, e)))
}
