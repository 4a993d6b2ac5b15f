//! Binary entry point: CLI flags, logging init, and the C9 lifecycle.

use clap::Parser;
use scene_pipeline::bus::{BusRouter, HandlerTasks, RouterContext};
use scene_pipeline::correlator::RequestCorrelator;
use scene_pipeline::db_store::{PostgresStore, RelationalStore};
use scene_pipeline::dispatcher::AnalysisDispatcher;
use scene_pipeline::lifecycle::Lifecycle;
use scene_pipeline::provider::{Provider, VariantAProvider, VariantBProvider};
use scene_pipeline::redis_store::RedisKvStore;
use scene_pipeline::scene_memory::SceneMemory;
use scene_pipeline::stats::PipelineStats;
use scene_pipeline_config::{Config, ProviderKind};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "scene-pipeline-daemon", version, about)]
struct Cli {
    /// Path to a TOML configuration file. Falls back to built-in defaults
    /// plus environment overrides when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds to wait for in-flight handlers to finish during shutdown.
    #[arg(long, default_value_t = 10)]
    shutdown_grace_secs: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _logging_guard = env_tracing_logger::init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Arc::new(Config::load(cli.config.as_deref())?);
    tracing::info!(app_name = %config.app_name, "starting");

    // Startup order: C2 (pool + schema bootstrap) -> C1 (pool) ->
    // C7 (connect + subscribe) -> background ingress task.
    let db: Arc<dyn RelationalStore> = Arc::new(
        PostgresStore::connect(&config.database_url, config.database_pool_size).await?,
    );
    db.bootstrap_schema().await?;
    tracing::info!("relational store ready");

    let kv = Arc::new(RedisKvStore::connect(&config.redis_url).await?);
    tracing::info!("key-value store ready");

    let provider = Arc::new(build_provider(&config));

    let stats = Arc::new(PipelineStats::new());
    let scene_memory = Arc::new(SceneMemory::new(
        kv.clone(),
        config.scene_memory_frames,
        config.scene_memory_ttl_secs,
    ));
    let trigger = Arc::new(scene_pipeline::trigger::TriggerEvaluator::new(
        kv.clone(),
        config.clone(),
    ));

    let bus = BusRouter::connect(&config);
    bus.subscribe().await?;
    let correlator = Arc::new(RequestCorrelator::new(
        kv.clone(),
        bus.client(),
        config.clone(),
        stats.clone(),
    ));
    let dispatcher = Arc::new(AnalysisDispatcher::new(
        scene_memory.clone(),
        db.clone(),
        provider,
        stats.clone(),
        config.max_concurrent_analyses,
        Duration::from_secs(config.provider_timeout_secs),
    ));

    let ctx = Arc::new(RouterContext {
        kv: kv.clone(),
        db: db.clone(),
        scene_memory,
        trigger,
        correlator,
        dispatcher,
        stats,
        config: config.clone(),
        tasks: HandlerTasks::new(),
    });

    tracing::info!("all services started successfully");
    let lifecycle = Lifecycle::start(bus, ctx, Duration::from_secs(cli.shutdown_grace_secs));

    wait_for_shutdown_signal().await;
    tracing::info!("shutting down");
    lifecycle.shutdown().await;
    tracing::info!("shutdown complete");

    Ok(())
}

fn build_provider(config: &Config) -> Provider {
    match config.ai_provider {
        ProviderKind::VariantA => Provider::VariantA(VariantAProvider::new(
            config.variant_a_api_key.clone().unwrap_or_default(),
            config.variant_a_model.clone(),
            config.variant_a_max_tokens,
        )),
        ProviderKind::VariantB => Provider::VariantB(VariantBProvider::new(
            config.variant_b_api_key.clone().unwrap_or_default(),
            config.variant_b_model.clone(),
            config.variant_b_max_tokens,
        )),
    }
}

/// Ctrl-C sets a one-shot channel rather than calling into async code
/// directly from the signal handler, since the handler closure can only
/// move its captured non-`Copy` resources once.
async fn wait_for_shutdown_signal() {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = std::sync::Mutex::new(Some(tx));
    ctrlc::set_handler(move || {
        if let Some(tx) = tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    })
    .expect("failed to install Ctrl-C handler");
    let _ = rx.await;
}
