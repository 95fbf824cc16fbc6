//! External AI diagnosis provider. The shipped implementation talks to
//! the Gemini `generateContent` REST API using the per-user settings
//! stored alongside the rest of the configuration. No retries; a failed
//! call is surfaced to the caller as-is.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::store::AiSettings;

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("尚未配置 API Key")]
    NotConfigured,
    #[error("AI 請求失敗: {0}")]
    Request(String),
}

#[async_trait]
pub trait AiProvider: Send + Sync + 'static {
    async fn ask(&self, settings: &AiSettings, message: &str) -> Result<String, AiError>;
}

pub struct GeminiProvider {
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[async_trait]
impl AiProvider for GeminiProvider {
    async fn ask(&self, settings: &AiSettings, message: &str) -> Result<String, AiError> {
        let api_key = settings
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(AiError::NotConfigured)?;

        let model = settings.model_name.as_deref().unwrap_or(DEFAULT_MODEL);
        let base_url = settings
            .base_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_BASE_URL);
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            base_url.trim_end_matches('/'),
            model,
            api_key
        );

        let request = GenerateContentRequest {
            system_instruction: settings.system_prompt.as_ref().map(|prompt| Content {
                parts: vec![Part {
                    text: prompt.clone(),
                }],
            }),
            contents: vec![Content {
                parts: vec![Part {
                    text: message.to_string(),
                }],
            }],
        };

        info!("Sending diagnosis request to model {}", model);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AiError::Request(format!(
                "status {}",
                response.status()
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AiError::Request(e.to_string()))?;

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

        if text.is_empty() {
            return Err(AiError::Request("empty response".to_string()));
        }

        Ok(text.trim().to_string())
    }
}
