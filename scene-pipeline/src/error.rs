//! Error taxonomy for the pipeline core. `StoreSchema` is the only variant
//! the lifecycle (C9) treats as fatal; everything else is handled locally
//! at the handler boundary and surfaces only through `tracing` and
//! [`crate::stats::PipelineStats`].

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("bus error: {source}")]
    Bus {
        #[from]
        source: rumqttc::ClientError,
    },
    #[error("malformed payload: {source}")]
    Payload {
        #[from]
        source: serde_json::Error,
    },
    #[error("key-value store error: {source}")]
    KvStoreTransient {
        #[from]
        source: redis::RedisError,
    },
    #[error("relational store error: {source}")]
    DbStoreTransient {
        #[from]
        source: sqlx::Error,
    },
    #[error("relational store schema bootstrap failed: {source}")]
    StoreSchema { source: sqlx::Error },
    #[error("provider call failed: {source}")]
    Provider {
        #[from]
        source: reqwest::Error,
    },
    #[error("provider call timed out")]
    ProviderTimeout,
    #[error("provider returned an empty response")]
    ProviderEmptyResponse,
    #[error("config error: {source}")]
    Config {
        #[from]
        source: scene_pipeline_config::ConfigError,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
