//! Key-Value Store Adapter (C1): camera state, cooldown marks, the
//! per-camera scene-memory sorted set, and the pending-frame-request side
//! table, expressed as small typed wrappers over an external pool rather
//! than ad-hoc client calls scattered through the codebase.

use crate::error::Result;
use async_trait::async_trait;
use scene_pipeline_types::{CameraId, RequestId, SceneMemoryEntry};
use std::collections::HashMap;
use std::sync::Mutex;

/// Typed view over the key-value backend. All mutation is expected to be
/// atomic at the store layer; no in-process locks guard scene memory.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_camera_state(&self, camera_id: &CameraId) -> Result<Option<CameraState>>;
    async fn set_camera_state(
        &self,
        camera_id: &CameraId,
        state: CameraState,
        ttl_secs: u64,
    ) -> Result<()>;

    /// Returns `true` if no cooldown mark is present for `camera_id`.
    async fn check_request_cooldown(&self, camera_id: &CameraId) -> Result<bool>;
    async fn set_request_cooldown(&self, camera_id: &CameraId, ttl_secs: u64) -> Result<()>;

    /// Insert or replace the entry whose `timestamp_us` matches
    /// `entry.timestamp_us` (duplicate-score replacement semantics, see
    /// DESIGN.md), then trim to `max_entries`.
    async fn scene_memory_insert(
        &self,
        camera_id: &CameraId,
        entry: SceneMemoryEntry,
        max_entries: usize,
        ttl_secs: u64,
    ) -> Result<()>;

    /// All entries for `camera_id`, ordered by ascending `timestamp_us`.
    async fn scene_memory_all(&self, camera_id: &CameraId) -> Result<Vec<SceneMemoryEntry>>;

    async fn set_pending_request(
        &self,
        request_id: RequestId,
        event_id: Option<i64>,
        metadata_json: serde_json::Value,
        ttl_secs: u64,
    ) -> Result<()>;

    /// Read and delete the side-table pair in one step (idempotent under
    /// duplicate delivery). Returns `None` on miss (TTL expiry or a
    /// duplicate frame for an already-matched request).
    async fn take_pending_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<(Option<i64>, serde_json::Value)>>;
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CameraState {
    pub last_scene_hash: Option<i64>,
}

/// In-memory fake used by unit tests; no real Redis instance is required
/// to exercise the trigger and scene-memory properties. TTLs are accepted but not
/// enforced by wall-clock expiry — tests that care about expiry call
/// [`InMemoryKvStore::expire_pending_request`] explicitly instead of
/// sleeping in real time.
#[derive(Default)]
pub struct InMemoryKvStore {
    camera_state: Mutex<HashMap<String, CameraState>>,
    cooldowns: Mutex<HashMap<String, ()>>,
    scene_memory: Mutex<HashMap<String, Vec<SceneMemoryEntry>>>,
    pending_requests: Mutex<HashMap<uuid::Uuid, (Option<i64>, serde_json::Value)>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper simulating TTL expiry of a pending-request entry.
    pub fn expire_pending_request(&self, request_id: RequestId) {
        self.pending_requests
            .lock()
            .unwrap()
            .remove(&request_id.as_uuid());
    }

    /// Test helper simulating cooldown-mark expiry.
    pub fn clear_cooldown(&self, camera_id: &CameraId) {
        self.cooldowns.lock().unwrap().remove(camera_id.as_str());
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get_camera_state(&self, camera_id: &CameraId) -> Result<Option<CameraState>> {
        Ok(self
            .camera_state
            .lock()
            .unwrap()
            .get(camera_id.as_str())
            .cloned())
    }

    async fn set_camera_state(
        &self,
        camera_id: &CameraId,
        state: CameraState,
        _ttl_secs: u64,
    ) -> Result<()> {
        self.camera_state
            .lock()
            .unwrap()
            .insert(camera_id.as_str().to_string(), state);
        Ok(())
    }

    async fn check_request_cooldown(&self, camera_id: &CameraId) -> Result<bool> {
        Ok(!self
            .cooldowns
            .lock()
            .unwrap()
            .contains_key(camera_id.as_str()))
    }

    async fn set_request_cooldown(&self, camera_id: &CameraId, _ttl_secs: u64) -> Result<()> {
        self.cooldowns
            .lock()
            .unwrap()
            .insert(camera_id.as_str().to_string(), ());
        Ok(())
    }

    async fn scene_memory_insert(
        &self,
        camera_id: &CameraId,
        entry: SceneMemoryEntry,
        max_entries: usize,
        _ttl_secs: u64,
    ) -> Result<()> {
        let mut guard = self.scene_memory.lock().unwrap();
        let entries = guard.entry(camera_id.as_str().to_string()).or_default();
        // Duplicate-score replacement: drop any existing entry at this
        // timestamp before inserting the (possibly upgraded) replacement.
        entries.retain(|e| e.timestamp_us != entry.timestamp_us);
        entries.push(entry);
        entries.sort_by_key(|e| e.timestamp_us);
        if entries.len() > max_entries {
            let overflow = entries.len() - max_entries;
            entries.drain(0..overflow);
        }
        Ok(())
    }

    async fn scene_memory_all(&self, camera_id: &CameraId) -> Result<Vec<SceneMemoryEntry>> {
        Ok(self
            .scene_memory
            .lock()
            .unwrap()
            .get(camera_id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn set_pending_request(
        &self,
        request_id: RequestId,
        event_id: Option<i64>,
        metadata_json: serde_json::Value,
        _ttl_secs: u64,
    ) -> Result<()> {
        self.pending_requests
            .lock()
            .unwrap()
            .insert(request_id.as_uuid(), (event_id, metadata_json));
        Ok(())
    }

    async fn take_pending_request(
        &self,
        request_id: RequestId,
    ) -> Result<Option<(Option<i64>, serde_json::Value)>> {
        Ok(self
            .pending_requests
            .lock()
            .unwrap()
            .remove(&request_id.as_uuid()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn scene_memory_insert_trims_to_max_entries() {
        let store = InMemoryKvStore::new();
        let camera = CameraId::new("cam-1");
        for i in 0..35 {
            let entry = SceneMemoryEntry::from_metadata_only(
                1_000_000 + i,
                None,
                0.0,
                0,
                None,
                Vec::new(),
            );
            store.scene_memory_insert(&camera, entry, 30, 600).await.unwrap();
        }
        let all = store.scene_memory_all(&camera).await.unwrap();
        assert_eq!(all.len(), 30);
        assert_eq!(all.first().unwrap().timestamp_us, 1_000_005);
    }

    #[tokio::test]
    async fn scene_memory_insert_replaces_same_timestamp() {
        let store = InMemoryKvStore::new();
        let camera = CameraId::new("cam-1");
        let entry = SceneMemoryEntry::from_metadata_only(1_000_000, None, 0.1, 1, None, Vec::new());
        store.scene_memory_insert(&camera, entry, 30, 600).await.unwrap();

        let mut upgraded =
            SceneMemoryEntry::from_metadata_only(1_000_000, None, 0.1, 1, None, Vec::new());
        upgraded.has_image = true;
        upgraded.image_base64 = Some("abc".to_string());
        store.scene_memory_insert(&camera, upgraded, 30, 600).await.unwrap();

        let all = store.scene_memory_all(&camera).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].has_image);
    }

    #[tokio::test]
    async fn pending_request_is_consumed_at_most_once() {
        let store = InMemoryKvStore::new();
        let rid = RequestId::new();
        store
            .set_pending_request(rid, Some(42), serde_json::json!({"a": 1}), 300)
            .await
            .unwrap();

        let first = store.take_pending_request(rid).await.unwrap();
        assert!(first.is_some());
        let second = store.take_pending_request(rid).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn expired_pending_request_is_treated_as_a_miss() {
        let store = InMemoryKvStore::new();
        let rid = RequestId::new();
        store
            .set_pending_request(rid, Some(7), serde_json::json!({"a": 1}), 300)
            .await
            .unwrap();

        store.expire_pending_request(rid);

        let result = store.take_pending_request(rid).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn cleared_cooldown_allows_a_new_request() {
        let store = InMemoryKvStore::new();
        let camera = CameraId::new("cam-1");
        store.set_request_cooldown(&camera, 60).await.unwrap();
        assert!(!store.check_request_cooldown(&camera).await.unwrap());

        store.clear_cooldown(&camera);
        assert!(store.check_request_cooldown(&camera).await.unwrap());
    }
}
