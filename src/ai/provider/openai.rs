//! OpenAI-compatible Chat Completions Provider
//!
//! Works against api.openai.com and any server speaking the same protocol.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{
    ErrorClassifier, Generation, GenerationParams, ProviderConfig, ResponseMetadata,
    ResponseTiming, TextGenerator, TokenUsage,
};
use crate::types::{QuorumError, Result};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const PROVIDER_NAME: &str = "openai";

const SYSTEM_PROMPT: &str = "You are a careful data analyst. Ground every claim in the data \
you are given. If you reason before answering, wrap that reasoning in <thinking></thinking>.";

/// OpenAI API Provider with secure API key handling
pub struct OpenAiProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let api_key_str = config
            .api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                QuorumError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY env var or provide in config"
                        .to_string(),
                )
            })?;

        let api_base = config
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let model = config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                QuorumError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            api_key: SecretString::from(api_key_str),
            api_base,
            model,
            client,
        })
    }

    fn build_request(&self, prompt: &str, params: &GenerationParams) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: params.temperature,
            top_p: params.top_p,
            max_tokens: Some(params.max_tokens),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiProvider {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<Generation> {
        debug!(
            "OpenAI: generating (model: {}, temperature: {}, thinking_budget: {:?})",
            self.model, params.temperature, params.thinking_budget
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt, params);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ErrorClassifier::classify(&format!("OpenAI request failed: {}", e), PROVIDER_NAME)
            })?;

        let elapsed = start_time.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("OpenAI API error ({}): {}", status, body),
                PROVIDER_NAME,
            )
            .into());
        }

        let response_body: ChatCompletionResponse = response.json().await.map_err(|e| {
            QuorumError::generation(format!("Failed to parse OpenAI response: {}", e))
        })?;

        let usage = response_body
            .usage
            .map(|u| TokenUsage::from_openai(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let choice = response_body
            .choices
            .first()
            .ok_or_else(|| QuorumError::generation("No choices in OpenAI response"))?;
        let content = choice
            .message
            .content
            .as_deref()
            .ok_or_else(|| QuorumError::generation("No content in OpenAI response"))?;

        let mut metadata = ResponseMetadata::new(PROVIDER_NAME, &self.model);
        if let Some(reason) = &choice.finish_reason {
            metadata
                .extra
                .insert("finish_reason".to_string(), reason.clone());
        }

        Ok(Generation::from_raw(content).with_metrics(
            usage,
            ResponseTiming::from_duration(elapsed),
            metadata,
        ))
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.api_base);

        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!("OpenAI: API is available");
                Ok(true)
            }
            Ok(resp) => {
                warn!("OpenAI: API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("OpenAI: API check failed: {}", e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiProvider {
        OpenAiProvider::new(ProviderConfig {
            provider: "openai".into(),
            api_key: Some("sk-test".into()),
            api_base: Some("http://localhost:8080/v1/".into()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_new_trims_base_and_defaults_model() {
        let p = provider();
        assert_eq!(p.api_base, "http://localhost:8080/v1");
        assert_eq!(p.model(), DEFAULT_MODEL);
        assert!(!format!("{:?}", p).contains("sk-test"));
    }

    #[test]
    fn test_request_carries_sampling_params() {
        let p = provider();
        let params = GenerationParams::default().with_temperature(0.5);
        let request = p.build_request("how many orders?", &params);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][1]["content"], "how many orders?");
        assert!((json["temperature"].as_f64().unwrap() - 0.5).abs() < 1e-6);
        assert!(json["top_p"].is_number());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices":[{"message":{"content":"hi"},"finish_reason":"stop"}],
                       "usage":{"prompt_tokens":10,"completion_tokens":2}}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hi"));
        assert_eq!(parsed.usage.unwrap().completion_tokens, 2);
    }
}
