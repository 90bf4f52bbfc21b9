//! Generative-model client (Gemini `generateContent` REST API).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::errors::LlmError;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A single prompt-in, structured-response-out generative model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate_content(&self, prompt: &str) -> Result<GenerateContentResponse, LlmError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

impl GenerateContentResponse {
    /// Text of the first candidate's first part, if the model produced any
    /// usable content.
    pub fn first_text(&self) -> Option<&str> {
        let part = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?;
        if part.text.is_empty() {
            None
        } else {
            Some(&part.text)
        }
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model_name: String,
}

impl GeminiClient {
    pub fn new(api_key: String, model_name: String) -> Self {
        Self::with_api_base(DEFAULT_API_BASE.to_string(), api_key, model_name)
    }

    pub fn with_api_base(api_base: String, api_key: String, model_name: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model_name,
        }
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate_content(&self, prompt: &str) -> Result<GenerateContentResponse, LlmError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.api_base, self.model_name
        );

        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Request(format!(
                "generateContent failed (HTTP {}): {}",
                status,
                text.chars().take(500).collect::<String>()
            )));
        }

        resp.json::<GenerateContentResponse>()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_text_reads_nested_candidate_content() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"hello"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.first_text(), Some("hello"));
    }

    #[test]
    fn empty_candidates_yield_no_text() {
        let resp: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(resp.first_text(), None);

        let resp: GenerateContentResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(resp.first_text(), None);

        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[]}}]}"#,
        )
        .unwrap();
        assert_eq!(resp.first_text(), None);

        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":null}]}"#,
        )
        .unwrap();
        assert_eq!(resp.first_text(), None);
    }
}
