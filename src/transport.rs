use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::error::{CompanionError, Result};
use crate::models::{ApiErrorEnvelope, GenerateContentRequest, GenerateContentResponse};

#[cfg(test)]
use mockall::automock;

/// A single round trip to the generative provider. Retrying is the
/// orchestrator's job, implementations make exactly one call.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn generate(&self, req: &GenerateContentRequest) -> Result<GenerateContentResponse>;
}

/// Long-lived HTTP client for the generateContent endpoint
pub struct GeminiTransport {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiTransport {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(CompanionError::Config(
                "Gemini API key is empty; refusing to build transport".to_string(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    async fn generate(&self, req: &GenerateContentRequest) -> Result<GenerateContentResponse> {
        let response = self
            .client
            .post(self.endpoint(&req.model))
            .header("x-goog-api-key", &self.api_key)
            .json(req)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                CompanionError::Internal(format!("Failed to parse Gemini API response: {e}"))
            });
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(api_error(status.as_u16(), &body))
    }
}

/// Build an `Api` error from a non-2xx body, preferring the provider's own message
fn api_error(status: u16, body: &str) -> CompanionError {
    let message = match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{code}: {}", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.chars().take(300).collect(),
    };
    CompanionError::Api { status, message }
}
