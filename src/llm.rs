use crate::config::{LlmConfig, LlmProvider};
use crate::error::{ChatError, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// A hosted model that turns one prompt into one text reply
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct LlmClient {
    provider: LlmProvider,
    api_key: String,
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(provider: LlmProvider, api_key: String, model: String, base_url: String) -> Self {
        Self {
            provider,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.provider,
            config.api_key.clone(),
            config.model.clone(),
            config.base_url.clone(),
        )
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    async fn call_openai(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.1,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Llm(format!("LLM API call failed: {}", e)))?;

        let response_json = read_json(response).await?;
        extract_openai_content(&response_json)
    }

    async fn call_gemini(&self, prompt: &str) -> Result<String> {
        let model = self.model.trim_start_matches("models/");
        let body = serde_json::json!({
            "contents": [
                {"role": "user", "parts": [{"text": prompt}]}
            ]
        });

        let response = self
            .http
            .post(format!("{}/models/{}:generateContent", self.base_url, model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Llm(format!("LLM API call failed: {}", e)))?;

        let response_json = read_json(response).await?;
        extract_gemini_text(&response_json)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!("Calling {} model {} ({} prompt chars)", self.provider, self.model, prompt.len());
        match self.provider {
            LlmProvider::OpenAi => self.call_openai(prompt).await,
            LlmProvider::Gemini => self.call_gemini(prompt).await,
        }
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    // Check HTTP status
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ChatError::Llm(format!("LLM API error ({}): {}", status, error_text)));
    }

    response
        .json()
        .await
        .map_err(|e| ChatError::Llm(format!("Failed to parse LLM response: {}", e)))
}

fn api_error(response_json: &Value) -> Option<ChatError> {
    response_json.get("error").map(|error| {
        let detail = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        ChatError::Llm(format!("LLM API error: {}", detail))
    })
}

/// Text of the first choice in a chat-completions response
pub fn extract_openai_content(response_json: &Value) -> Result<String> {
    if let Some(err) = api_error(response_json) {
        return Err(err);
    }

    let choice = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|choices| choices.first())
        .ok_or_else(|| ChatError::Llm(format!("No choices in LLM response: {}", response_json)))?;

    // "length" still carries usable text; "content_filter" does not
    match choice.get("finish_reason").and_then(|r| r.as_str()) {
        Some("length") => warn!("LLM response was truncated due to length limit"),
        Some("content_filter") => {
            return Err(ChatError::Llm("LLM response was filtered by content policy".to_string()))
        }
        _ => {}
    }

    let content = choice["message"]["content"]
        .as_str()
        .ok_or_else(|| ChatError::Llm(format!("No content in LLM response: {}", response_json)))?;

    if content.is_empty() {
        return Err(ChatError::Llm("Empty content in LLM response".to_string()));
    }

    Ok(content.to_string())
}

/// Concatenated text parts of the first candidate in a `generateContent` response
pub fn extract_gemini_text(response_json: &Value) -> Result<String> {
    if let Some(err) = api_error(response_json) {
        return Err(err);
    }

    if let Some(reason) = response_json["promptFeedback"]["blockReason"].as_str() {
        return Err(ChatError::Llm(format!("Prompt was blocked: {}", reason)));
    }

    let candidate = response_json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| ChatError::Llm(format!("No candidates in LLM response: {}", response_json)))?;

    if candidate["finishReason"].as_str() == Some("MAX_TOKENS") {
        warn!("LLM response was truncated due to length limit");
    }

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .concat()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ChatError::Llm(format!(
            "Empty content in LLM response (finish reason: {})",
            candidate["finishReason"].as_str().unwrap_or("unknown")
        )));
    }

    Ok(text)
}
