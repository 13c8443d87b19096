use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::OllamaConfig;
use crate::profile::GenerationProfile;

/// Anything that can turn a prompt into generated text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str, profile: &GenerationProfile) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: &'a GenerationProfile,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for Ollama's `/api/generate` endpoint (non-streaming).
pub struct OllamaClient {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build inference HTTP client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, prompt: &str, profile: &GenerationProfile) -> Result<String> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: profile,
        };

        debug!(
            "Sending generation request to {} (model: {}, num_predict: {})",
            self.config.url, self.config.model, profile.num_predict
        );

        let response = self
            .client
            .post(&self.config.url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to inference endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Inference endpoint error ({}): {}", status, error_body);
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse inference response")?;

        if generated.response.trim().is_empty() {
            anyhow::bail!("Inference endpoint returned empty text");
        }

        Ok(generated.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileKind;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, timeout_secs: u64) -> OllamaClient {
        OllamaClient::new(OllamaConfig {
            url: format!("{}/api/generate", server.uri()),
            model: "test-model".to_string(),
            timeout_secs,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_sends_profile_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_json(json!({
                "model": "test-model",
                "prompt": "hello",
                "stream": false,
                "options": {
                    "num_predict": 500,
                    "temperature": 0.8,
                    "top_k": 40,
                    "top_p": 0.9,
                    "repeat_penalty": 1.1,
                    "presence_penalty": 0.0,
                    "frequency_penalty": 0.0
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "test-model",
                "response": "富士山は日本一高い山です。",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, 5);
        let text = client
            .generate("hello", ProfileKind::Long.profile())
            .await
            .unwrap();
        assert_eq!(text, "富士山は日本一高い山です。");
    }

    #[tokio::test]
    async fn test_error_status_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let err = client_for(&server, 5)
            .generate("hello", ProfileKind::Short.profile())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_missing_response_field_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
            .mount(&server)
            .await;

        let result = client_for(&server, 5)
            .generate("hello", ProfileKind::Short.profile())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_empty_response_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "  \n"})))
            .mount(&server)
            .await;

        let result = client_for(&server, 5)
            .generate("hello", ProfileKind::Short.profile())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": "late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let result = client_for(&server, 1)
            .generate("hello", ProfileKind::Short.profile())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_failure() {
        let client = OllamaClient::new(OllamaConfig {
            url: "http://127.0.0.1:9/api/generate".to_string(),
            model: "test-model".to_string(),
            timeout_secs: 2,
        })
        .unwrap();
        assert!(client
            .generate("hello", ProfileKind::Short.profile())
            .await
            .is_err());
    }
}
