//! Relational Store Adapter (C2): schema bootstrap, insert event, insert
//! analysis, read recent analyses.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use scene_pipeline_types::{AnalysisRow, CameraEventRow};
use std::sync::Mutex;

#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Creates `camera_events`, `claude_analyses`, and `alerts` plus their
    /// indexes if they do not already exist. A failure here is fatal to
    /// the lifecycle and aborts startup.
    async fn bootstrap_schema(&self) -> Result<()>;

    async fn insert_event(&self, event: NewCameraEvent) -> Result<i64>;

    async fn insert_analysis(&self, analysis: NewAnalysis) -> Result<i64>;

    async fn recent_analyses(&self, camera_id: &str, limit: i64) -> Result<Vec<AnalysisRow>>;
}

#[derive(Debug, Clone)]
pub struct NewCameraEvent {
    pub camera_id: String,
    pub timestamp_us: i64,
    pub frame_id: Option<i64>,
    pub metadata: serde_json::Value,
    pub motion_score: Option<f64>,
    pub object_count: Option<i32>,
    pub scene_hash: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub camera_id: String,
    pub trigger_event_id: Option<i64>,
    pub timestamp_us: i64,
    pub summary: String,
    pub full_response: serde_json::Value,
    pub frames_analyzed: i32,
    pub duration_ms: i32,
}

pub struct PostgresStore {
    pool: sqlx::PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, pool_size: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .map_err(PipelineError::from)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl RelationalStore for PostgresStore {
    async fn bootstrap_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS camera_events (
                id BIGSERIAL,
                camera_id VARCHAR(64) NOT NULL,
                timestamp_us BIGINT NOT NULL,
                frame_id BIGINT,
                metadata JSONB NOT NULL,
                motion_score DOUBLE PRECISION,
                object_count INT,
                scene_hash BIGINT,
                created_at TIMESTAMPTZ DEFAULT NOW(),
                PRIMARY KEY (id, timestamp_us)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|source| PipelineError::StoreSchema { source })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_camera_events_camera_time \
             ON camera_events(camera_id, timestamp_us DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|source| PipelineError::StoreSchema { source })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_camera_events_motion \
             ON camera_events(motion_score) WHERE motion_score > 0.5",
        )
        .execute(&self.pool)
        .await
        .map_err(|source| PipelineError::StoreSchema { source })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS claude_analyses (
                id BIGSERIAL PRIMARY KEY,
                camera_id VARCHAR(64) NOT NULL,
                trigger_event_id BIGINT,
                timestamp_us BIGINT NOT NULL,
                summary TEXT NOT NULL,
                full_response JSONB,
                frames_analyzed INT DEFAULT 0,
                analysis_duration_ms INT,
                created_at TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|source| PipelineError::StoreSchema { source })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_claude_analyses_camera_time \
             ON claude_analyses(camera_id, timestamp_us DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|source| PipelineError::StoreSchema { source })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id BIGSERIAL PRIMARY KEY,
                camera_id VARCHAR(64) NOT NULL,
                analysis_id BIGINT REFERENCES claude_analyses(id),
                alert_type VARCHAR(64) NOT NULL,
                severity INT NOT NULL,
                message TEXT NOT NULL,
                metadata JSONB,
                acknowledged BOOLEAN DEFAULT FALSE,
                created_at TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|source| PipelineError::StoreSchema { source })?;

        Ok(())
    }

    async fn insert_event(&self, event: NewCameraEvent) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO camera_events
                (camera_id, timestamp_us, frame_id, metadata, motion_score, object_count, scene_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(event.camera_id)
        .bind(event.timestamp_us)
        .bind(event.frame_id)
        .bind(event.metadata)
        .bind(event.motion_score)
        .bind(event.object_count)
        .bind(event.scene_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn insert_analysis(&self, analysis: NewAnalysis) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO claude_analyses
                (camera_id, trigger_event_id, timestamp_us, summary, full_response,
                 frames_analyzed, analysis_duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(analysis.camera_id)
        .bind(analysis.trigger_event_id)
        .bind(analysis.timestamp_us)
        .bind(analysis.summary)
        .bind(analysis.full_response)
        .bind(analysis.frames_analyzed)
        .bind(analysis.duration_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    async fn recent_analyses(&self, camera_id: &str, limit: i64) -> Result<Vec<AnalysisRow>> {
        let rows = sqlx::query_as::<_, AnalysisRowSql>(
            r#"
            SELECT id, camera_id, trigger_event_id, timestamp_us, summary, full_response,
                   frames_analyzed, analysis_duration_ms, created_at
            FROM claude_analyses
            WHERE camera_id = $1
            ORDER BY timestamp_us DESC
            LIMIT $2
            "#,
        )
        .bind(camera_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(sqlx::FromRow)]
struct AnalysisRowSql {
    id: i64,
    camera_id: String,
    trigger_event_id: Option<i64>,
    timestamp_us: i64,
    summary: String,
    full_response: Option<serde_json::Value>,
    frames_analyzed: i32,
    analysis_duration_ms: Option<i32>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<AnalysisRowSql> for AnalysisRow {
    fn from(row: AnalysisRowSql) -> Self {
        AnalysisRow {
            id: row.id,
            camera_id: row.camera_id,
            trigger_event_id: row.trigger_event_id,
            timestamp_us: row.timestamp_us,
            summary: row.summary,
            full_response: row.full_response.unwrap_or(serde_json::Value::Null),
            frames_analyzed: row.frames_analyzed,
            analysis_duration_ms: row.analysis_duration_ms.unwrap_or(0),
            created_at: row.created_at,
        }
    }
}

/// In-memory fake for tests; never touches a real Postgres instance.
#[derive(Default)]
pub struct InMemoryRelationalStore {
    events: Mutex<Vec<CameraEventRow>>,
    analyses: Mutex<Vec<AnalysisRow>>,
}

impl InMemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CameraEventRow> {
        self.events.lock().unwrap().clone()
    }

    pub fn analyses(&self) -> Vec<AnalysisRow> {
        self.analyses.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelationalStore for InMemoryRelationalStore {
    async fn bootstrap_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_event(&self, event: NewCameraEvent) -> Result<i64> {
        let mut events = self.events.lock().unwrap();
        let id = events.len() as i64 + 1;
        events.push(CameraEventRow {
            id,
            camera_id: event.camera_id,
            timestamp_us: event.timestamp_us,
            frame_id: event.frame_id,
            metadata: event.metadata,
            motion_score: event.motion_score,
            object_count: event.object_count,
            scene_hash: event.scene_hash,
            created_at: chrono::Utc::now(),
        });
        Ok(id)
    }

    async fn insert_analysis(&self, analysis: NewAnalysis) -> Result<i64> {
        let mut analyses = self.analyses.lock().unwrap();
        let id = analyses.len() as i64 + 1;
        analyses.push(AnalysisRow {
            id,
            camera_id: analysis.camera_id,
            trigger_event_id: analysis.trigger_event_id,
            timestamp_us: analysis.timestamp_us,
            summary: analysis.summary,
            full_response: analysis.full_response,
            frames_analyzed: analysis.frames_analyzed,
            analysis_duration_ms: analysis.duration_ms,
            created_at: chrono::Utc::now(),
        });
        Ok(id)
    }

    async fn recent_analyses(&self, camera_id: &str, limit: i64) -> Result<Vec<AnalysisRow>> {
        let mut rows: Vec<AnalysisRow> = self
            .analyses
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.camera_id == camera_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| std::cmp::Reverse(a.timestamp_us));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn insert_event_then_insert_analysis_links_trigger_event_id() {
        let store = InMemoryRelationalStore::new();
        let event_id = store
            .insert_event(NewCameraEvent {
                camera_id: "cam-1".to_string(),
                timestamp_us: 1_000_000,
                frame_id: Some(1),
                metadata: serde_json::json!({}),
                motion_score: Some(0.9),
                object_count: Some(0),
                scene_hash: None,
            })
            .await
            .unwrap();

        let analysis_id = store
            .insert_analysis(NewAnalysis {
                camera_id: "cam-1".to_string(),
                trigger_event_id: Some(event_id),
                timestamp_us: 1_000_100,
                summary: "nothing notable".to_string(),
                full_response: serde_json::json!({}),
                frames_analyzed: 3,
                duration_ms: 120,
            })
            .await
            .unwrap();
        assert_eq!(analysis_id, 1);

        let recent = store.recent_analyses("cam-1", 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].trigger_event_id, Some(event_id));
    }
}
