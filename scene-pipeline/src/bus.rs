//! Bus Router (C7). Subscribes to the `axis-is/camera/+/*` topic patterns
//! and dispatches each message to an independent task so slow handlers
//! never block ingress. Every spawned handler task is tracked in
//! [`RouterContext::tasks`] rather than fired-and-forgotten, so the
//! lifecycle supervisor can drain or cancel them at shutdown.

use crate::correlator::RequestCorrelator;
use crate::db_store::{NewCameraEvent, RelationalStore};
use crate::dispatcher::AnalysisDispatcher;
use crate::kv_store::KvStore;
use crate::scene_memory::SceneMemory;
use crate::stats::PipelineStats;
use crate::trigger::TriggerEvaluator;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use scene_pipeline_config::Config;
use scene_pipeline_types::{CameraId, FrameMessage, MetadataMessage, StatusMessage};
use std::sync::Arc;
use std::time::Duration;

const TOPIC_FILTER: &str = "axis-is/camera/+/#";

pub struct RouterContext {
    pub kv: Arc<dyn KvStore>,
    pub db: Arc<dyn RelationalStore>,
    pub scene_memory: Arc<SceneMemory>,
    pub trigger: Arc<TriggerEvaluator>,
    pub correlator: Arc<RequestCorrelator>,
    pub dispatcher: Arc<AnalysisDispatcher>,
    pub stats: Arc<PipelineStats>,
    pub config: Arc<Config>,
    pub tasks: HandlerTasks,
}

/// Owns every per-message handler task spawned off the ingress loop, so
/// the lifecycle supervisor can wait for them (or cancel them) at shutdown
/// instead of leaking them as detached `tokio::spawn` calls.
pub struct HandlerTasks {
    inner: tokio::sync::Mutex<tokio::task::JoinSet<()>>,
}

impl HandlerTasks {
    pub fn new() -> Self {
        Self {
            inner: tokio::sync::Mutex::new(tokio::task::JoinSet::new()),
        }
    }

    pub async fn spawn<F>(&self, fut: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner.lock().await.spawn(fut);
    }

    /// Waits up to `grace_period` for every tracked task to finish, then
    /// aborts anything still running.
    pub async fn drain(&self, grace_period: Duration) {
        let mut set = self.inner.lock().await;
        let wait_all = async {
            while let Some(result) = set.join_next().await {
                if let Err(err) = result {
                    tracing::warn!(error = %err, "handler task panicked during shutdown");
                }
            }
        };
        if tokio::time::timeout(grace_period, wait_all).await.is_err() {
            tracing::warn!("handler tasks did not finish within grace period, aborting");
            set.abort_all();
            while set.join_next().await.is_some() {}
        }
    }
}

impl Default for HandlerTasks {
    fn default() -> Self {
        Self::new()
    }
}

pub struct BusRouter {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl BusRouter {
    pub fn connect(config: &Config) -> Self {
        let mut options = MqttOptions::new(
            "scene-pipeline",
            config.mqtt_broker.clone(),
            config.mqtt_port,
        );
        options.set_keep_alive(Duration::from_secs(config.mqtt_keepalive));
        if let (Some(username), Some(password)) =
            (config.mqtt_username.clone(), config.mqtt_password.clone())
        {
            options.set_credentials(username, password);
        }
        let (client, eventloop) = AsyncClient::new(options, 64);
        Self { client, eventloop }
    }

    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    pub async fn subscribe(&self) -> crate::error::Result<()> {
        self.client
            .subscribe(TOPIC_FILTER, QoS::AtLeastOnce)
            .await
            .map_err(crate::error::PipelineError::from)
    }

    /// Runs the ingress loop until `shutdown` resolves. Cancellation of
    /// this task is observed cooperatively between messages and must not
    /// prevent the shutdown path in C9 from running.
    pub async fn run(
        mut self,
        ctx: Arc<RouterContext>,
        mut shutdown: tokio::sync::oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("bus router received shutdown signal");
                    break;
                }
                notification = self.eventloop.poll() => {
                    match notification {
                        Ok(Event::Incoming(Incoming::Publish(publish))) => {
                            let task_ctx = ctx.clone();
                            ctx.tasks
                                .spawn(async move {
                                    dispatch(task_ctx, publish.topic, publish.payload.to_vec())
                                        .await;
                                })
                                .await;
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!(error = %err, "bus connection error, reconnecting");
                            tokio::time::sleep(Duration::from_secs(ctx.config.mqtt_reconnect_delay))
                                .await;
                        }
                    }
                }
            }
        }
    }
}

async fn dispatch(ctx: Arc<RouterContext>, topic: String, payload: Vec<u8>) {
    let segments: Vec<&str> = topic.split('/').collect();
    if segments.len() < 4 {
        tracing::debug!(topic = %topic, "dropping malformed topic");
        ctx.stats.record_malformed_dropped();
        return;
    }
    let camera_id = CameraId::new(segments[2]);
    let class = segments[3];

    let result = match class {
        "metadata" => handle_metadata(&ctx, &camera_id, &payload).await,
        "frame" => handle_frame(&ctx, &camera_id, &payload).await,
        "status" => handle_status(&ctx, &camera_id, &payload).await,
        "event" => {
            tracing::info!(camera_id = %camera_id, "event message received (placeholder)");
            Ok(())
        }
        "alert" => {
            tracing::warn!(camera_id = %camera_id, "alert message received (placeholder)");
            Ok(())
        }
        other => {
            tracing::debug!(topic = %topic, class = other, "unrecognized topic class");
            Ok(())
        }
    };

    if let Err(err) = result {
        tracing::warn!(camera_id = %camera_id, class, error = %err, "handler failed");
        ctx.stats.record_malformed_dropped();
    }
}

async fn handle_metadata(
    ctx: &RouterContext,
    camera_id: &CameraId,
    payload: &[u8],
) -> crate::error::Result<()> {
    let msg: MetadataMessage = match serde_json::from_slice(payload) {
        Ok(msg) => msg,
        Err(err) => {
            tracing::debug!(camera_id = %camera_id, error = %err, "malformed metadata payload");
            ctx.stats.record_malformed_dropped();
            return Ok(());
        }
    };
    let motion_score = msg.motion_score.unwrap_or(0.0);
    let object_count = msg.object_count.unwrap_or(0);

    ctx.scene_memory
        .add_metadata(
            camera_id,
            msg.timestamp_us,
            msg.sequence,
            motion_score,
            object_count,
            msg.scene_hash,
            msg.detections.clone(),
        )
        .await?;

    let metadata_json = serde_json::to_value(&msg)?;
    let event_id = ctx
        .db
        .insert_event(NewCameraEvent {
            camera_id: camera_id.as_str().to_string(),
            timestamp_us: msg.timestamp_us,
            frame_id: msg.sequence,
            metadata: metadata_json.clone(),
            motion_score: msg.motion_score,
            object_count: msg.object_count,
            scene_hash: msg.scene_hash,
        })
        .await?;

    let cooldown_active = !ctx.kv.check_request_cooldown(camera_id).await?;
    let outcome = ctx
        .trigger
        .evaluate(
            camera_id,
            msg.motion_score,
            &msg.detections,
            msg.scene_hash,
            cooldown_active,
        )
        .await;

    if outcome.fire {
        let correlator = ctx.correlator.clone();
        let camera_id = camera_id.clone();
        let reason = outcome.reason;
        let timestamp_us = msg.timestamp_us;
        ctx.tasks
            .spawn(async move {
                if let Err(err) = correlator
                    .request(&camera_id, reason, Some(event_id), metadata_json, timestamp_us)
                    .await
                {
                    tracing::warn!(camera_id = %camera_id, error = %err, "frame request failed");
                }
            })
            .await;
    }

    Ok(())
}

async fn handle_frame(
    ctx: &RouterContext,
    camera_id: &CameraId,
    payload: &[u8],
) -> crate::error::Result<()> {
    let msg: FrameMessage = match serde_json::from_slice(payload) {
        Ok(msg) => msg,
        Err(err) => {
            tracing::debug!(camera_id = %camera_id, error = %err, "malformed frame payload");
            ctx.stats.record_malformed_dropped();
            return Ok(());
        }
    };

    ctx.scene_memory
        .add_frame_image(camera_id, msg.request_id, msg.timestamp_us, msg.image_base64)
        .await?;

    if let Some((event_id, trigger_metadata)) = ctx.correlator.match_frame(msg.request_id).await? {
        let trigger_metadata: MetadataMessage = serde_json::from_value(trigger_metadata)?;
        let dispatcher = ctx.dispatcher.clone();
        let camera_id = camera_id.clone();
        ctx.tasks
            .spawn(async move {
                dispatcher
                    .analyze(
                        &camera_id,
                        event_id,
                        trigger_metadata.motion_score.unwrap_or(0.0),
                        &trigger_metadata.detections,
                    )
                    .await;
            })
            .await;
    }

    Ok(())
}

async fn handle_status(
    ctx: &RouterContext,
    camera_id: &CameraId,
    payload: &[u8],
) -> crate::error::Result<()> {
    let _status: StatusMessage = match serde_json::from_slice(payload) {
        Ok(status) => status,
        Err(err) => {
            tracing::debug!(camera_id = %camera_id, error = %err, "malformed status payload");
            ctx.stats.record_malformed_dropped();
            return Ok(());
        }
    };
    // Status upserts only the TTL on the existing state hash; the
    // scene-hash field the trigger evaluator reads is untouched.
    let current = ctx.kv.get_camera_state(camera_id).await?.unwrap_or_default();
    ctx.kv
        .set_camera_state(camera_id, current, ctx.config.camera_state_ttl_secs)
        .await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn topic_with_fewer_than_four_segments_is_rejected() {
        let segments: Vec<&str> = "axis-is/camera/cam-1".split('/').collect();
        assert!(segments.len() < 4);
    }

    #[test]
    fn topic_class_is_fourth_segment() {
        let segments: Vec<&str> = "axis-is/camera/cam-1/metadata".split('/').collect();
        assert_eq!(segments[3], "metadata");
    }
}
