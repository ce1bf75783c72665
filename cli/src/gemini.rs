use anyhow::{Context, Result, bail};
use async_trait::async_trait;

use fitlog_core::normalize::{NutritionCandidate, parse_candidates};
use fitlog_core::recognition::{
    ApiErrorResponse, GenerateContentRequest, GenerateContentResponse, RecognitionRequest,
};

use crate::config::GeminiConfig;

/// Turns a recognition request into the model's raw reply text.
#[async_trait]
pub trait FoodRecognizer: Send + Sync {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<String>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    /// `None` when no API key is configured.
    pub fn from_config(config: &GeminiConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.api_key.clone() else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .user_agent(format!("fitlog/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Some(Self {
            client,
            endpoint: endpoint(&config.api_url, &config.model),
            api_key,
        }))
    }

    pub async fn generate_async(&self, body: &GenerateContentRequest) -> Result<String> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .context("Failed to reach Gemini API")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            bail!("Gemini API returned {status}: {message}");
        }

        let data: GenerateContentResponse = resp
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        let text = data.text().context("Gemini returned no text")?;
        tracing::debug!(raw = %text, "gemini raw response");
        Ok(text)
    }
}

#[async_trait]
impl FoodRecognizer for GeminiClient {
    async fn recognize(&self, request: &RecognitionRequest) -> Result<String> {
        let body = GenerateContentRequest::from_recognition(request)?;
        self.generate_async(&body).await
    }
}

fn endpoint(api_url: &str, model: &str) -> String {
    format!(
        "{}/v1beta/models/{model}:generateContent",
        api_url.trim_end_matches('/')
    )
}

/// Validate, ask the model and normalize its reply.
pub async fn analyze_food(
    recognizer: &dyn FoodRecognizer,
    request: &RecognitionRequest,
) -> Result<Vec<NutritionCandidate>> {
    request.validate()?;
    let raw = recognizer.recognize(request).await?;
    Ok(parse_candidates(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, routing::post};
    use std::time::Duration;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn config(api_url: String) -> GeminiConfig {
        GeminiConfig {
            api_url,
            api_key: Some("test-key".to_string()),
            model: "gemini-test".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    fn text_request() -> RecognitionRequest {
        RecognitionRequest {
            text: Some("an apple".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            endpoint("https://generativelanguage.googleapis.com/", "gemini-pro-latest"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro-latest:generateContent"
        );
    }

    #[test]
    fn test_no_key_means_unconfigured() {
        let mut cfg = config("http://localhost".to_string());
        cfg.api_key = None;
        assert!(GeminiClient::from_config(&cfg).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recognize_against_local_server() {
        let app = Router::new().route(
            "/v1beta/models/gemini-test:generateContent",
            post(
                |headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(headers.get("x-goog-api-key").unwrap(), "test-key");
                    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
                    assert!(prompt.contains("an apple"));
                    Json(serde_json::json!({
                        "candidates": [{"content": {"parts": [{
                            "text": "```json\n[{\"name\":\"Apple\",\"calories\":95,\"carbs\":25,\"protein\":0.5,\"fat\":0.3}]\n```"
                        }]}}]
                    }))
                },
            ),
        );
        let url = serve(app).await;
        let client = GeminiClient::from_config(&config(url)).unwrap().unwrap();

        let candidates = analyze_food(&client, &text_request()).await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Apple");
    }

    #[tokio::test]
    async fn test_api_error_message_surfaces() {
        let app = Router::new().route(
            "/v1beta/models/gemini-test:generateContent",
            post(|| async {
                (
                    axum::http::StatusCode::FORBIDDEN,
                    Json(serde_json::json!({
                        "error": {"code": 403, "message": "API key not valid.", "status": "PERMISSION_DENIED"}
                    })),
                )
            }),
        );
        let url = serve(app).await;
        let client = GeminiClient::from_config(&config(url)).unwrap().unwrap();

        let err = client.recognize(&text_request()).await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("403"));
        assert!(msg.contains("API key not valid."));
    }

    #[tokio::test]
    async fn test_analyze_rejects_empty_request() {
        struct Unreachable;

        #[async_trait]
        impl FoodRecognizer for Unreachable {
            async fn recognize(&self, _request: &RecognitionRequest) -> Result<String> {
                panic!("model must not be called for an empty request");
            }
        }

        let err = analyze_food(&Unreachable, &RecognitionRequest::default())
            .await
            .unwrap_err();
        assert!(format!("{err}").contains("text description"));
    }
}
