//! Lifecycle (C9). Ordered startup and shutdown.
//!
//! Startup order: C2 (pool + schema bootstrap) -> C1 (pool) -> C7 (connect
//! + subscribe) -> background ingress task.
//! Shutdown order: stop ingress -> drain in-flight handler tasks -> close
//! C1 -> close C2.
//! C1/C2 here are connection-managed clients with no explicit `close()`
//! call exposed by their crates (`redis::aio::ConnectionManager` and
//! `sqlx::PgPool` both close on drop); "close" is therefore just dropping
//! the `Arc`, which happens naturally once the lifecycle handle is
//! dropped after the ingress task has stopped.

use crate::bus::{BusRouter, RouterContext};
use std::sync::Arc;
use std::time::Duration;

/// Handle returned by [`Lifecycle::start`]; call [`Lifecycle::shutdown`] to
/// run the ordered shutdown path. Dropping it without calling `shutdown`
/// leaves the ingress task running — callers should always shut down
/// explicitly (the daemon binary does this from its Ctrl-C handler).
pub struct Lifecycle {
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    ingress_task: tokio::task::JoinHandle<()>,
    ctx: Arc<RouterContext>,
    grace_period: Duration,
}

impl Lifecycle {
    /// Runs the startup order and spawns the ingress task. `ctx` must
    /// already have a connected `BusRouter` (C7 connect + subscribe having
    /// already happened) by the time this is called.
    pub fn start(bus: BusRouter, ctx: Arc<RouterContext>, grace_period: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let run_ctx = ctx.clone();
        let ingress_task = tokio::spawn(async move {
            bus.run(run_ctx, shutdown_rx).await;
        });

        Self {
            shutdown_tx: Some(shutdown_tx),
            ingress_task,
            ctx,
            grace_period,
        }
    }

    /// Stop ingress, then wait up to the grace period for in-flight
    /// handlers to finish before returning. Cancellation of the ingress
    /// task itself must not prevent this from completing.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        match tokio::time::timeout(self.grace_period, &mut self.ingress_task).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::warn!(error = %err, "ingress task panicked during shutdown"),
            Err(_) => {
                tracing::warn!("ingress task did not stop within grace period, aborting");
                self.ingress_task.abort();
            }
        }

        self.ctx.tasks.drain(self.grace_period).await;
    }
}
