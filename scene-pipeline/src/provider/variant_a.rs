//! Variant A: native multimodal request, inline base64-encoded JPEGs,
//! token usage reported on success.

use super::ProviderResponse;
use crate::error::{PipelineError, Result};
use serde_json::json;

pub struct VariantAProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    endpoint: String,
}

impl VariantAProvider {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            max_tokens,
            endpoint: "https://api.variant-a.example/v1/messages".to_string(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub async fn submit(&self, prompt: &str, images_base64: &[String]) -> Result<ProviderResponse> {
        let mut content = Vec::new();
        for image in images_base64.iter().take(5) {
            content.push(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": "image/jpeg",
                    "data": image,
                }
            }));
        }
        content.push(json!({ "type": "text", "text": prompt }));

        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [{ "role": "user", "content": content }],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let envelope: serde_json::Value = response.json().await?;
        let summary = envelope["content"]
            .as_array()
            .and_then(|blocks| blocks.first())
            .and_then(|block| block["text"].as_str())
            .unwrap_or("")
            .to_string();

        if summary.is_empty() {
            return Err(PipelineError::ProviderEmptyResponse);
        }

        Ok(ProviderResponse {
            summary,
            full_response: envelope,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn model_name_reflects_configuration() {
        let provider = VariantAProvider::new("key".to_string(), "variant-a-v1".to_string(), 500);
        assert_eq!(provider.model_name(), "variant-a-v1");
    }
}
