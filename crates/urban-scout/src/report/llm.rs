use std::time::Duration;

use reqwest::blocking::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{ConfigError, LlmError};
use crate::sanitize;

/// A text-in, text-out language model.
pub trait LanguageModel: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_content(self) -> Result<String, LlmError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// OpenAI-compatible `/chat/completions` client (Groq by default).
pub struct ChatCompletionClient {
    client: Client,
    url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: SecretString,
}

impl ChatCompletionClient {
    pub fn new(config: &LlmConfig, api_key: SecretString) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl LanguageModel for ChatCompletionClient {
    fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: sanitize::truncate_body(&text),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| LlmError::Request(format!("malformed response: {}", e)))?;
        let content = parsed.into_content()?;
        debug!(model = %self.model, chars = content.len(), "Completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "llama-3.1-8b-instant",
            temperature: 0.1,
            max_tokens: 1024,
            messages: [ChatMessage {
                role: "user",
                content: "hi",
            }],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "llama-3.1-8b-instant");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "hi");
        assert_eq!(value["max_tokens"], 1024);
    }

    #[test]
    fn test_response_content() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"id": "x", "choices": [{"index": 0, "message": {"role": "assistant", "content": "{\"summary\": \"ok\"}"}}]}"#,
        )
        .unwrap();
        assert_eq!(response.into_content().unwrap(), r#"{"summary": "ok"}"#);
    }

    #[test]
    fn test_empty_choices_is_error() {
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(response.into_content(), Err(LlmError::EmptyResponse)));

        let response: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(matches!(response.into_content(), Err(LlmError::EmptyResponse)));
    }

    #[test]
    fn test_url_joins_base() {
        let config = LlmConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            ..LlmConfig::default()
        };
        let client = ChatCompletionClient::new(&config, SecretString::from("k".to_string())).unwrap();
        assert_eq!(client.url, "https://api.example.com/v1/chat/completions");
        assert_eq!(client.model(), config.model);
    }

    #[test]
    fn test_unreachable_endpoint_is_request_error() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9/v1".to_string(),
            timeout_secs: 2,
            ..LlmConfig::default()
        };
        let client = ChatCompletionClient::new(&config, SecretString::from("k".to_string())).unwrap();
        assert!(matches!(client.complete("hi"), Err(LlmError::Request(_))));
    }
}
