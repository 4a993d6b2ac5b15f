//! Variant B: multimodal request with raw JPEG bytes rather than an
//! inline base64 string, no per-call token counts. Images are decoded from
//! the stored base64 before submission, and the response envelope carries
//! safety ratings instead of usage counters.

use super::ProviderResponse;
use crate::error::{PipelineError, Result};
use base64::Engine;
use serde_json::json;

pub struct VariantBProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    endpoint: String,
}

impl VariantBProvider {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            max_tokens,
            endpoint: "https://api.variant-b.example/v1/generate".to_string(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub async fn submit(&self, prompt: &str, images_base64: &[String]) -> Result<ProviderResponse> {
        let mut parts = vec![json!({ "text": prompt })];
        for image in images_base64.iter().take(5) {
            // Decode to raw bytes, then re-encode for the wire since JSON
            // cannot carry binary data directly.
            let raw = base64::engine::general_purpose::STANDARD
                .decode(image)
                .map_err(|_| PipelineError::ProviderEmptyResponse)?;
            let reencoded = base64::engine::general_purpose::STANDARD.encode(raw);
            parts.push(json!({
                "inline_data": {
                    "mime_type": "image/jpeg",
                    "data": reencoded,
                }
            }));
        }

        let body = json!({
            "model": self.model,
            "contents": [{ "parts": parts }],
            "generation_config": {
                "max_output_tokens": self.max_tokens,
                "temperature": 0.4,
            }
        });

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let envelope: serde_json::Value = response.json().await?;
        let summary = envelope["candidates"][0]["content"]["text"]
            .as_str()
            .unwrap_or("")
            .to_string();

        if summary.is_empty() {
            return Err(PipelineError::ProviderEmptyResponse);
        }

        let full_response = json!({
            "model": self.model,
            "finish_reason": envelope["candidates"][0]["finish_reason"],
            "safety_ratings": envelope["candidates"][0]["safety_ratings"],
            "content": summary,
        });

        Ok(ProviderResponse {
            summary,
            full_response,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn model_name_reflects_configuration() {
        let provider = VariantBProvider::new("key".to_string(), "variant-b-v1".to_string(), 500);
        assert_eq!(provider.model_name(), "variant-b-v1");
    }
}
