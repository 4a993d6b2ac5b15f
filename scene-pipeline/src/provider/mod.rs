//! Provider Abstraction (C8). A uniform capability for submitting a scene
//! analysis request. Expressed as a trait so the dispatcher can be
//! exercised in tests against a fake implementation instead of a live HTTP
//! endpoint; the two real variants are still selected once at startup from
//! configuration and never swapped mid-flight.

mod fake;
mod prompt;
mod variant_a;
mod variant_b;

pub use fake::FakeProvider;
pub use prompt::build_analysis_prompt;
pub use variant_a::VariantAProvider;
pub use variant_b::VariantBProvider;

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Result of one successful provider call. `full_response` preserves the
/// provider-specific envelope verbatim for storage in `claude_analyses`.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub summary: String,
    pub full_response: serde_json::Value,
}

#[async_trait]
pub trait VisionProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;
    fn model_name(&self) -> &str;

    /// Submits text + images with a per-call timeout. Provider errors are
    /// reported, not retried — the dispatcher decides what to do with
    /// them: the analysis is not persisted, the semaphore permit is
    /// released, and the caller gets `None`.
    async fn submit(
        &self,
        prompt: &str,
        images_base64: &[String],
        timeout: Duration,
    ) -> Result<ProviderResponse>;
}

pub enum Provider {
    VariantA(VariantAProvider),
    VariantB(VariantBProvider),
}

#[async_trait]
impl VisionProvider for Provider {
    fn provider_name(&self) -> &'static str {
        match self {
            Provider::VariantA(_) => "variant_a",
            Provider::VariantB(_) => "variant_b",
        }
    }

    fn model_name(&self) -> &str {
        match self {
            Provider::VariantA(p) => p.model_name(),
            Provider::VariantB(p) => p.model_name(),
        }
    }

    async fn submit(
        &self,
        prompt: &str,
        images_base64: &[String],
        timeout: Duration,
    ) -> Result<ProviderResponse> {
        let call = async {
            match self {
                Provider::VariantA(p) => p.submit(prompt, images_base64).await,
                Provider::VariantB(p) => p.submit(prompt, images_base64).await,
            }
        };
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(crate::error::PipelineError::ProviderTimeout),
        }
    }
}
