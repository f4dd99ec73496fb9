//! # Watch Loop
//!
//! Controller watch loop that monitors `Bucket` resources and triggers
//! reconciliation when changes are detected.
//!
//! kube-runtime's `Controller` is the work queue: it never runs two
//! reconciliations of the same object at once, while different objects are
//! reconciled concurrently up to `MAX_CONCURRENT_RECONCILIATIONS`.
//!
//! The controller stream only ends on its own after SIGINT/SIGTERM
//! (`shutdown_on_signal`). A restart happens only when the error policy asks
//! for one, in which case the stream is dropped first so no object is left
//! waiting behind a sleeping poll.

use crate::constants::{WATCH_BACKOFF_MAX_MS, WATCH_BACKOFF_START_MS};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::Bucket;
use crate::runtime::error_policy::{
    handle_controller_error, handle_reconciliation_error, WatchErrorAction,
};
use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{controller, watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

/// Run the controller watch loop
///
/// Returns once a shutdown signal has been received and in-flight
/// reconciliations have drained.
///
/// # Errors
/// Currently never fails; the signature leaves room for fatal watch errors.
pub async fn run_watch_loop(
    buckets: Api<Bucket>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let mut watch_backoff_ms = WATCH_BACKOFF_START_MS;
    let concurrency = reconciler.config.max_concurrent_reconciliations;
    let restart_delay_secs = reconciler.config.watch_restart_delay_secs;

    // Fail the readiness probe as soon as a shutdown signal arrives
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let shutdown_server_state = server_state.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        shutdown_server_state.set_ready(false);
        let _ = shutdown_tx.send(true);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        let watch_span = tracing::span!(
            tracing::Level::INFO,
            "controller.watch",
            operation = "watch_loop"
        );

        info!(
            "Starting controller watch loop (max {} concurrent reconciliations)...",
            concurrency
        );
        let mut stream = Controller::new(buckets.clone(), watcher::Config::default().any_semantic())
            .with_config(controller::Config::default().concurrency(concurrency))
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, reconciler.clone())
            .boxed();

        let restart_after = async {
            while let Some(result) = stream.next().await {
                match result {
                    Ok((object, _action)) => {
                        watch_backoff_ms = WATCH_BACKOFF_START_MS;
                        debug!(resource = %object, "watch.event.success");
                    }
                    Err(e) => {
                        let action = handle_controller_error(
                            &e,
                            &mut watch_backoff_ms,
                            WATCH_BACKOFF_MAX_MS,
                            restart_delay_secs,
                        );
                        if let WatchErrorAction::Restart(delay) = action {
                            return Some(delay);
                        }
                    }
                }
            }
            None
        }
        .instrument(watch_span)
        .await;
        drop(stream);

        let Some(delay) = restart_after else {
            info!("Controller stream ended after shutdown signal, exiting watch loop");
            break;
        };

        warn!(
            "Restarting controller watch in {}ms...",
            delay.as_millis()
        );
        if !wait_for_restart(delay, &mut shutdown_rx).await {
            info!("Shutdown requested during restart delay, exiting watch loop");
            break;
        }
    }

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
    Ok(())
}

/// Sleep for `delay` unless shutdown is requested first
///
/// Returns `false` when the loop should exit instead of restarting.
async fn wait_for_restart(delay: Duration, shutdown_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep(delay) => true,
        _ = shutdown_rx.wait_for(|stop| *stop) => false,
    }
}

/// Resolve on SIGINT or SIGTERM
///
/// Kubernetes stops pods with SIGTERM; SIGINT covers local runs.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_restart_proceeds_after_delay() {
        let (_tx, mut rx) = watch::channel(false);
        assert!(wait_for_restart(Duration::from_millis(10), &mut rx).await);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_restart() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();

        let started = std::time::Instant::now();
        assert!(!wait_for_restart(Duration::from_secs(3600), &mut rx).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_shutdown_during_delay_wakes_the_loop() {
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(true);
        });

        assert!(!wait_for_restart(Duration::from_secs(3600), &mut rx).await);
    }
}
