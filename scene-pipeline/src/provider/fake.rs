//! Fake provider for exercising the dispatcher's persistence path without
//! a live HTTP endpoint.

use super::{ProviderResponse, VisionProvider};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Returns a fixed response and counts calls; never performs network I/O.
pub struct FakeProvider {
    response: ProviderResponse,
    calls: AtomicUsize,
}

impl FakeProvider {
    pub fn new(response: ProviderResponse) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionProvider for FakeProvider {
    fn provider_name(&self) -> &'static str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }

    async fn submit(
        &self,
        _prompt: &str,
        _images_base64: &[String],
        _timeout: Duration,
    ) -> Result<ProviderResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}
