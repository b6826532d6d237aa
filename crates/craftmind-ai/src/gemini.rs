//! Gemini text-generation provider

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use craftmind_traits::{GenerateError, TextGenerator};

use crate::error::{AiError, Result};
use crate::retry::GenRetryConfig;

const PROVIDER: &str = "Gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DISABLE_SYSTEM_PROXY_ENV: &str = "CRAFTMIND_DISABLE_SYSTEM_PROXY";

/// Tests talk to a local mock server, and some deployments sit behind a
/// system proxy that must not intercept the API traffic; both bypass the
/// proxy. Everything else uses reqwest defaults.
fn http_client() -> Client {
    let no_proxy = cfg!(test) || std::env::var_os(DISABLE_SYSTEM_PROXY_ENV).is_some();
    let mut builder = Client::builder();
    if no_proxy {
        builder = builder.no_proxy();
    }
    builder
        .build()
        .expect("reqwest client construction with default TLS")
}

/// Sampling knobs for a generation call.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        // Short in-game chat lines; higher temperature keeps remarks varied.
        Self {
            temperature: 0.8,
            max_output_tokens: 150,
        }
    }
}

/// Gemini client
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    options: GenerationOptions,
    retry: GenRetryConfig,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            options: GenerationOptions::default(),
            retry: GenRetryConfig::default(),
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (tests point this at a local mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set sampling options
    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: GenRetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn complete(&self, prompt: &str, system_prompt: &str) -> Result<String> {
        let request = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: system_prompt.to_string(),
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.options.temperature,
                max_output_tokens: self.options.max_output_tokens,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.try_once(&url, &request).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && attempt <= self.retry.max_retries => {
                    let hint = match &err {
                        AiError::Api { retry_after, .. } => *retry_after,
                        _ => None,
                    };
                    let delay = self.retry.delay_for(attempt, hint);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Gemini call failed, retrying: {err}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_once(&self, url: &str, request: &GeminiRequest) -> Result<String> {
        let response = self.client.post(url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(AiError::from_failed_response(response, PROVIDER).await);
        }

        let body: GeminiResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(AiError::EmptyCompletion(PROVIDER.to_string()));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
    ) -> std::result::Result<String, GenerateError> {
        self.complete(prompt, system_prompt)
            .await
            .map_err(|err| GenerateError::new(err.to_string()))
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiResponseContent,
}

#[derive(Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}
