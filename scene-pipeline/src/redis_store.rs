//! Redis-backed [`KvStore`] implementation. Key layout:
//! `camera:{id}:state`, `camera:{id}:last_request`, `camera:{id}:scene_memory`,
//! `frame_request:{request_id}:event_id` / `:metadata`.

use crate::error::{PipelineError, Result};
use crate::kv_store::{CameraState, KvStore};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use scene_pipeline_types::{CameraId, RequestId, SceneMemoryEntry};

pub struct RedisKvStore {
    conn: ConnectionManager,
}

impl RedisKvStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(PipelineError::from)?;
        let conn = client.get_connection_manager().await.map_err(PipelineError::from)?;
        Ok(Self { conn })
    }

    fn state_key(camera_id: &CameraId) -> String {
        format!("camera:{camera_id}:state")
    }

    fn cooldown_key(camera_id: &CameraId) -> String {
        format!("camera:{camera_id}:last_request")
    }

    fn scene_memory_key(camera_id: &CameraId) -> String {
        format!("camera:{camera_id}:scene_memory")
    }

    fn pending_event_key(request_id: RequestId) -> String {
        format!("frame_request:{request_id}:event_id")
    }

    fn pending_metadata_key(request_id: RequestId) -> String {
        format!("frame_request:{request_id}:metadata")
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get_camera_state(&self, camera_id: &CameraId) -> Result<Option<CameraState>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(Self::state_key(camera_id), "last_scene_hash").await?;
        Ok(raw.map(|v| CameraState {
            last_scene_hash: v.parse().ok(),
        }))
    }

    async fn set_camera_state(
        &self,
        camera_id: &CameraId,
        state: CameraState,
        ttl_secs: u64,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = Self::state_key(camera_id);
        if let Some(hash) = state.last_scene_hash {
            let _: () = conn.hset(&key, "last_scene_hash", hash).await?;
        }
        let _: () = conn.expire(&key, ttl_secs as i64).await?;
        Ok(())
    }

    async fn check_request_cooldown(&self, camera_id: &CameraId) -> Result<bool> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(Self::cooldown_key(camera_id)).await?;
        Ok(!exists)
    }

    async fn set_request_cooldown(&self, camera_id: &CameraId, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::cooldown_key(camera_id), "1", ttl_secs)
            .await?;
        Ok(())
    }

    async fn scene_memory_insert(
        &self,
        camera_id: &CameraId,
        entry: SceneMemoryEntry,
        max_entries: usize,
        ttl_secs: u64,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = Self::scene_memory_key(camera_id);

        // Duplicate-score replacement semantics (see DESIGN.md): ZADD
        // alone would leave the stale member behind since upgrading an
        // entry changes its serialized member string even though its
        // score (timestamp_us) is unchanged. Remove any existing member
        // at that score first.
        let stale: Vec<String> = conn
            .zrangebyscore(&key, entry.timestamp_us, entry.timestamp_us)
            .await?;
        if !stale.is_empty() {
            let _: () = conn.zrem(&key, stale).await?;
        }

        let payload = serde_json::to_string(&entry).map_err(PipelineError::from)?;
        let _: () = conn.zadd(&key, payload, entry.timestamp_us).await?;
        let _: () = conn.expire(&key, ttl_secs as i64).await?;

        let overflow = (max_entries as isize) + 1;
        let _: () = conn.zremrangebyrank(&key, 0, -overflow).await?;
        Ok(())
    }

    async fn scene_memory_all(&self, camera_id: &CameraId) -> Result<Vec<SceneMemoryEntry>> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.zrange(Self::scene_memory_key(camera_id), 0, -1).await?;
        raw.into_iter()
            .map(|s| serde_json::from_str(&s).map_err(PipelineError::from))
            .collect()
    }

    async fn set_pending_request(
        &self,
        request_id: RequestId,
        event_id: Option<i64>,
        metadata_json: serde_json::Value,
        ttl_secs: u64,
    ) -> Result<()> {
        let mut conn = self.conn.clone();
        if let Some(event_id) = event_id {
            let _: () = conn
                .set_ex(Self::pending_event_key(request_id), event_id, ttl_secs)
                .await?;
        }
        let _: () = conn
            .set_ex(
                Self::pending_metadata_key(request_id),
                metadata_json.to_string(),
                ttl_secs,
            )
            .await?;
        Ok(())
    }

    async fn take_pending_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<(Option<i64>, serde_json::Value)>> {
        let mut conn = self.conn.clone();
        let event_key = Self::pending_event_key(request_id);
        let metadata_key = Self::pending_metadata_key(request_id);

        // GET-then-DEL as separate round-trips lets two concurrent callers
        // for the same duplicate-delivered frame both observe the metadata
        // key before either DEL runs. Read and delete both keys in a single
        // Lua script instead so at most one caller ever sees the value.
        let script = redis::Script::new(
            r"
            local metadata = redis.call('GET', KEYS[1])
            if metadata == false then
                return false
            end
            local event_id = redis.call('GET', KEYS[2])
            redis.call('DEL', KEYS[1])
            redis.call('DEL', KEYS[2])
            return {metadata, event_id}
            ",
        );
        let result: Option<(String, Option<i64>)> = script
            .key(&metadata_key)
            .key(&event_key)
            .invoke_async(&mut conn)
            .await?;

        let Some((metadata_raw, event_id)) = result else {
            return Ok(None);
        };

        let metadata_json = serde_json::from_str(&metadata_raw).map_err(PipelineError::from)?;
        Ok(Some((event_id, metadata_json)))
    }
}
