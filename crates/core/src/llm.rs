use crate::config::LlmConfig;
use crate::error::{ConfigError, LlmError};
use crate::retry::RetryPolicy;
use crate::traits::LanguageModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Together,
    Groq,
}

const TOGETHER_MODELS: &[(&str, &str)] = &[
    ("deepseek-ai/DeepSeek-V3", "DeepSeek V3"),
    ("Meta Llama 3.1 8B Instruct Awq Int4", "LLaMA 3.1 8B Int4"),
    ("Mistral (7B) Instruct", "Mistral 7B"),
];

const GROQ_MODELS: &[(&str, &str)] = &[
    ("llama-3.1-8b-instant", "LLaMA 3.1 8B Instant"),
    ("llama-3.3-70b-versatile", "LLaMA 3.3 70B Versatile"),
    ("deepseek-r1-distill-llama-70b", "DeepSeek R1 LLaMA 70B"),
    ("mistral-saba-24b", "Mistral Saba 24B"),
];

impl LlmProvider {
    pub const ALL: [LlmProvider; 2] = [LlmProvider::Together, LlmProvider::Groq];

    pub fn name(self) -> &'static str {
        match self {
            LlmProvider::Together => "together",
            LlmProvider::Groq => "groq",
        }
    }

    pub fn base_url(self) -> &'static str {
        match self {
            LlmProvider::Together => "https://api.together.xyz/v1",
            LlmProvider::Groq => "https://api.groq.com/openai/v1",
        }
    }

    /// `(model id, display name)` pairs; the first entry is the default.
    pub fn models(self) -> &'static [(&'static str, &'static str)] {
        match self {
            LlmProvider::Together => TOGETHER_MODELS,
            LlmProvider::Groq => GROQ_MODELS,
        }
    }

    pub fn default_model(self) -> &'static str {
        self.models()[0].0
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "together" => Ok(LlmProvider::Together),
            "groq" => Ok(LlmProvider::Groq),
            other => Err(ConfigError::Invalid(format!("unsupported provider: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop: Vec<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.7,
            top_p: 0.9,
            stop: Vec::new(),
        }
    }
}

impl GenerateOptions {
    pub fn with_max_tokens(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }
}

pub struct ChatCompletionClient {
    provider: LlmProvider,
    model: String,
    api_key: Option<String>,
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

impl ChatCompletionClient {
    pub fn new(
        provider: LlmProvider,
        model: Option<String>,
        api_key: Option<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            base_url: provider.base_url().to_string(),
            client: Client::new(),
            retry,
        }
    }

    pub fn from_config(config: &LlmConfig, retry: RetryPolicy) -> Self {
        Self::new(
            config.provider,
            config.model.clone(),
            config.api_key().map(str::to_string),
            retry,
        )
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, api_key: &str, body: &Value) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Provider {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let payload: Value = response.json().await?;
        parse_chat_response(&payload)
    }
}

pub(crate) fn chat_request_body(model: &str, prompt: &str, options: &GenerateOptions) -> Value {
    let mut body = json!({
        "model": model,
        "messages": [{ "role": "user", "content": prompt }],
        "max_tokens": options.max_tokens,
        "temperature": options.temperature,
        "top_p": options.top_p,
    });
    if !options.stop.is_empty() {
        body["stop"] = json!(options.stop);
    }
    body
}

pub(crate) fn parse_chat_response(payload: &Value) -> Result<String, LlmError> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(LlmError::EmptyResponse)
}

#[async_trait]
impl LanguageModel for ChatCompletionClient {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::Authentication {
                provider: self.provider.name().to_string(),
            })?;

        let body = chat_request_body(&self.model, prompt, options);
        let body = &body;
        debug!(provider = %self.provider, model = %self.model, prompt_chars = prompt.len(), "calling llm");
        self.retry
            .run("llm generate", move || self.complete(api_key, body))
            .await
    }
}
