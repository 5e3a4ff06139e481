// src/services/generation_service.rs
use crate::catalog::StyleSpec;
use crate::errors::HeadshotError;
use crate::models::*;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use futures_util::future::join_all;
use log::{info, warn};
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_FAN_OUT: usize = 4;

/// One image payload returned by the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub media_type: String,
    pub data: Vec<u8>,
}

/// A remote "restyle this photo" call: image plus prompt in, one image out.
#[async_trait]
pub trait ImageGenerationClient: Send + Sync {
    async fn generate_variation(
        &self,
        image: &[u8],
        media_type: &str,
        prompt: &str,
    ) -> Result<GeneratedImage, HeadshotError>;
}

pub struct GeminiClient {
    api_key: String,
    model: String,
    api_base: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String, api_base: String) -> Self {
        Self {
            api_key,
            model,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

pub fn build_request_body(image: &[u8], media_type: &str, prompt: &str) -> Value {
    json!({
        "contents": [{
            "role": "user",
            "parts": [
                {
                    "inlineData": {
                        "mimeType": media_type,
                        "data": general_purpose::STANDARD.encode(image)
                    }
                },
                { "text": prompt }
            ]
        }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"]
        }
    })
}

/// Returns the first inline image payload found across all candidates.
pub fn extract_first_image(response: &Value) -> Result<GeneratedImage, HeadshotError> {
    let parts = response["candidates"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|candidate| candidate["content"]["parts"].as_array())
        .flatten();

    for part in parts {
        let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
            continue;
        };
        let data = inline["data"].as_str().unwrap_or_default();
        if data.is_empty() {
            continue;
        }

        let bytes = general_purpose::STANDARD
            .decode(data)
            .map_err(|e| HeadshotError::Generation(format!("Failed to decode image: {}", e)))?;
        let media_type = inline
            .get("mimeType")
            .or_else(|| inline.get("mime_type"))
            .and_then(Value::as_str)
            .unwrap_or("image/png")
            .to_string();

        return Ok(GeneratedImage {
            media_type,
            data: bytes,
        });
    }

    Err(HeadshotError::Generation(
        "No image data in response".to_string(),
    ))
}

#[async_trait]
impl ImageGenerationClient for GeminiClient {
    async fn generate_variation(
        &self,
        image: &[u8],
        media_type: &str,
        prompt: &str,
    ) -> Result<GeneratedImage, HeadshotError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request_body(image, media_type, prompt))
            .send()
            .await
            .map_err(|e| {
                HeadshotError::Generation(format!("Gemini request failed: {}", e.without_url()))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(HeadshotError::Generation(format!(
                "Gemini error ({}): {}",
                status, error_text
            )));
        }

        let result: Value = response.json().await.map_err(|e| {
            HeadshotError::Generation(format!(
                "Failed to parse Gemini response: {}",
                e.without_url()
            ))
        })?;

        extract_first_image(&result)
    }
}

pub fn build_prompt(style: &StyleSpec, index: usize, total: usize) -> String {
    format!(
        "Transform this photo into a professional headshot of the same person. \
         Keep their identity, facial features and expression recognizable. \
         Style: {}. {} Variation {} of {}: vary framing and lighting subtly.",
        style.title,
        style.prompt,
        index + 1,
        total
    )
}

/// Fans a photo out into a fixed number of concurrent style requests.
pub struct Orchestrator {
    client: Option<Arc<dyn ImageGenerationClient>>,
    fan_out: usize,
    request_timeout: Option<Duration>,
    fallback: Vec<ResultImage>,
}

impl Orchestrator {
    pub fn new(
        client: Option<Arc<dyn ImageGenerationClient>>,
        fan_out: usize,
        request_timeout: Option<Duration>,
        mut fallback: Vec<ResultImage>,
    ) -> Self {
        for (i, result) in fallback.iter_mut().enumerate() {
            result.selected = i == 0;
        }
        Self {
            client,
            fan_out: fan_out.max(1),
            request_timeout,
            fallback,
        }
    }

    pub fn fallback_set(&self, batch: u64) -> GenerationResultSet {
        GenerationResultSet {
            batch,
            results: self.fallback.clone(),
            used_fallback: true,
        }
    }

    /// Never fails: missing input, missing credential, or zero successes all yield
    /// the placeholder set with `used_fallback` set.
    pub async fn generate(
        &self,
        batch: u64,
        image: Option<&NormalizedImage>,
        style: &StyleSpec,
    ) -> GenerationResultSet {
        let (Some(client), Some(image)) = (self.client.as_deref(), image) else {
            info!(
                "Batch {}: generation unavailable (credential or image missing), using placeholders",
                batch
            );
            return self.fallback_set(batch);
        };

        let start = Instant::now();
        let requests = (0..self.fan_out).map(|index| {
            let prompt = build_prompt(style, index, self.fan_out);
            async move {
                let call = client.generate_variation(&image.data, image.media_type(), &prompt);
                let outcome = match self.request_timeout {
                    Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
                        Err(HeadshotError::Generation(format!(
                            "timed out after {:?}",
                            limit
                        )))
                    }),
                    None => call.await,
                };

                match outcome {
                    Ok(generated) => Some(ResultImage {
                        id: index as u32 + 1,
                        title: format!("{} #{}", style.title, index + 1),
                        category: Some(style.category.to_string()),
                        image: ImageData {
                            media_type: generated.media_type,
                            data: generated.data,
                        },
                        selected: false,
                    }),
                    Err(e) => {
                        warn!("Batch {}: variation {} failed: {}", batch, index + 1, e);
                        None
                    }
                }
            }
        });

        let mut results: Vec<ResultImage> = join_all(requests).await.into_iter().flatten().collect();

        if results.is_empty() {
            warn!(
                "Batch {}: all {} variations failed, using placeholders",
                batch, self.fan_out
            );
            return self.fallback_set(batch);
        }

        if let Some(first) = results.first_mut() {
            first.selected = true;
        }
        info!(
            "Batch {}: {}/{} variations succeeded in {}ms",
            batch,
            results.len(),
            self.fan_out,
            start.elapsed().as_millis()
        );

        GenerationResultSet {
            batch,
            results,
            used_fallback: false,
        }
    }
}
