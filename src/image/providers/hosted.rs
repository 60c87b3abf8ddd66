//! Hosted image generation endpoint speaking the OpenAI images API.

use crate::error::{parse_retry_after, sanitize_error_message, PicturaError, Result};
use crate::image::provider::ImageProvider;
use crate::image::types::{GenerationRequest, ImageFormat, ImageOutput};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gpt-image-1";

/// Builder for HostedImageProvider.
#[derive(Debug, Clone, Default)]
pub struct HostedImageProviderBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
}

impl HostedImageProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `PICTURA_API_KEY`, then `OPENAI_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API root (e.g., a self-hosted OpenAI-compatible gateway).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the model identifier sent with each request.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<HostedImageProvider> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("PICTURA_API_KEY").ok())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                PicturaError::Auth(
                    "PICTURA_API_KEY / OPENAI_API_KEY not set and no API key provided".into(),
                )
            })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(HostedImageProvider {
            client: reqwest::Client::new(),
            api_key,
            generations_url: format!("{base_url}/images/generations"),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

/// Image provider backed by a hosted `images/generations` endpoint.
pub struct HostedImageProvider {
    client: reqwest::Client,
    api_key: String,
    generations_url: String,
    model: String,
}

impl HostedImageProvider {
    /// Creates a new `HostedImageProviderBuilder`.
    pub fn builder() -> HostedImageProviderBuilder {
        HostedImageProviderBuilder::new()
    }

    /// Returns the model identifier sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn parse_error(
        &self,
        status: u16,
        text: &str,
        headers: &reqwest::header::HeaderMap,
    ) -> PicturaError {
        let text = sanitize_error_message(text);
        if status == 402 {
            return PicturaError::Billing(text);
        }
        if status == 429 {
            // insufficient_quota is not transient
            if text.contains("insufficient_quota") || text.contains("exceeded your current quota") {
                return PicturaError::Billing(text);
            }
            let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
            return PicturaError::RateLimited { retry_after };
        }
        if status == 401 || status == 403 {
            return PicturaError::Auth(text);
        }
        let lower = text.to_lowercase();
        if lower.contains("safety") || lower.contains("blocked") || lower.contains("content_policy")
        {
            return PicturaError::ContentBlocked(text);
        }
        if status == 400 || status == 422 {
            return PicturaError::InvalidRequest(text);
        }
        PicturaError::Api {
            status,
            message: text,
        }
    }
}

#[async_trait]
impl ImageProvider for HostedImageProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ImageOutput>> {
        let start = Instant::now();
        let body = HostedImageRequest::from_generation_request(request, &self.model);

        let response = self
            .client
            .post(&self.generations_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(self.parse_error(status.as_u16(), &text, &headers));
        }

        let hosted_response: HostedImageResponse = response.json().await?;
        let outputs = hosted_response
            .data
            .into_iter()
            .map(HostedImageData::into_output)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            model = %self.model,
            images = outputs.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "image generation complete"
        );

        Ok(outputs)
    }

    fn name(&self) -> &str {
        "Hosted image API"
    }
}

#[derive(Debug, Serialize)]
struct HostedImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: &'static str,
    quality: &'static str,
}

impl HostedImageRequest {
    fn from_generation_request(req: &GenerationRequest, model: &str) -> Self {
        Self {
            model: model.to_string(),
            prompt: req.prompt.clone(),
            n: req.n,
            size: req.size.as_str(),
            quality: req.quality.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HostedImageResponse {
    #[serde(default)]
    data: Vec<HostedImageData>,
}

#[derive(Debug, Deserialize)]
struct HostedImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

impl HostedImageData {
    /// Prefers the hosted URL; inline base64 becomes a `data:` URL.
    fn into_output(self) -> Result<ImageOutput> {
        if let Some(url) = self.url {
            return Ok(ImageOutput::new(url));
        }
        if let Some(b64) = self.b64_json {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&b64)
                .map_err(|e| PicturaError::Decode(e.to_string()))?;
            let format = ImageFormat::from_magic_bytes(&bytes).unwrap_or_default();
            return Ok(ImageOutput::new(format!(
                "data:{};base64,{}",
                format.mime_type(),
                b64
            )));
        }
        Err(PicturaError::UnexpectedResponse(
            "image entry contained neither url nor b64_json".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::types::{ImageQuality, ImageSize};
    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    fn provider() -> HostedImageProvider {
        HostedImageProviderBuilder::new()
            .api_key("sk-test")
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let provider = HostedImageProviderBuilder::new().api_key("sk-test").build();
        assert!(provider.is_ok());
    }

    #[test]
    fn test_builder_rejects_blank_key() {
        let provider = HostedImageProviderBuilder::new().api_key("   ").build();
        assert!(matches!(provider, Err(PicturaError::Auth(_))));
    }

    #[test]
    fn test_builder_base_url_and_model() {
        let provider = HostedImageProviderBuilder::new()
            .api_key("sk-test")
            .base_url("http://localhost:8080/v1/")
            .model("dall-e-3")
            .build()
            .unwrap();
        assert_eq!(
            provider.generations_url,
            "http://localhost:8080/v1/images/generations"
        );
        assert_eq!(provider.model(), "dall-e-3");
    }

    #[test]
    fn test_builder_defaults() {
        let provider = provider();
        assert_eq!(
            provider.generations_url,
            "https://api.openai.com/v1/images/generations"
        );
        assert_eq!(provider.model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_request_serialization() {
        let req = GenerationRequest::new("a red fox")
            .with_size(ImageSize::Portrait)
            .with_quality(ImageQuality::High);
        let body = HostedImageRequest::from_generation_request(&req, "gpt-image-1");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["prompt"], "a red fox");
        assert_eq!(json["size"], "1024x1792");
        assert_eq!(json["quality"], "high");
        assert_eq!(json["n"], 1);
        assert_eq!(json["model"], "gpt-image-1");
    }

    #[test]
    fn test_response_url() {
        let json = r#"{"created": 1, "data": [{"url": "https://example.com/img.png", "revised_prompt": "A fox"}]}"#;
        let resp: HostedImageResponse = serde_json::from_str(json).unwrap();
        let output = resp.data.into_iter().next().unwrap().into_output().unwrap();
        assert_eq!(output.url, "https://example.com/img.png");
    }

    #[test]
    fn test_response_b64_becomes_data_url() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let b64 = base64::engine::general_purpose::STANDARD.encode(png);
        let json = format!(r#"{{"data": [{{"b64_json": "{b64}"}}]}}"#);
        let resp: HostedImageResponse = serde_json::from_str(&json).unwrap();
        let output = resp.data.into_iter().next().unwrap().into_output().unwrap();
        assert_eq!(output.url, format!("data:image/png;base64,{b64}"));
    }

    #[test]
    fn test_response_invalid_b64() {
        let data = HostedImageData {
            url: None,
            b64_json: Some("not base64!".into()),
        };
        assert!(matches!(data.into_output(), Err(PicturaError::Decode(_))));
    }

    #[test]
    fn test_response_empty_entry() {
        let data = HostedImageData {
            url: None,
            b64_json: None,
        };
        assert!(matches!(
            data.into_output(),
            Err(PicturaError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_response_missing_data_is_empty() {
        let resp: HostedImageResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.data.is_empty());
    }

    #[test]
    fn test_parse_error_classification() {
        let provider = provider();
        let headers = HeaderMap::new();

        assert!(matches!(
            provider.parse_error(401, "bad key", &headers),
            PicturaError::Auth(_)
        ));
        assert!(matches!(
            provider.parse_error(402, "no credits", &headers),
            PicturaError::Billing(_)
        ));
        assert!(matches!(
            provider.parse_error(429, "insufficient_quota", &headers),
            PicturaError::Billing(_)
        ));
        assert!(matches!(
            provider.parse_error(400, "rejected by safety system", &headers),
            PicturaError::ContentBlocked(_)
        ));
        assert!(matches!(
            provider.parse_error(400, "invalid size", &headers),
            PicturaError::InvalidRequest(_)
        ));
        assert!(matches!(
            provider.parse_error(500, "oops", &headers),
            PicturaError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_parse_error_rate_limit_retry_after() {
        let provider = provider();
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));

        match provider.parse_error(429, "slow down", &headers) {
            PicturaError::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(std::time::Duration::from_secs(12)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
