//! # Initialization
//!
//! Operator initialization logic including rustls setup, tracing, metrics,
//! server startup, and Kubernetes client setup.

use crate::config::{ControllerConfig, ServerConfig};
use crate::constants::CONTROLLER_NAME;
use crate::controller::reconciler::{KubeBucketStore, Reconciler};
use crate::controller::server::{start_server, ServerState};
use crate::crd::Bucket;
use crate::observability;
use crate::observability::events::KubeEventPublisher;
use crate::provider::gcp::GcsREST;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Everything the watch loop needs
pub struct InitializationResult {
    /// API for the Bucket CRD, scoped to `WATCH_NAMESPACE` when set
    pub buckets: Api<Bucket>,
    /// Reconciler context
    pub reconciler: Arc<Reconciler>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .finish_non_exhaustive()
    }
}

/// Initialize the operator runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - GCS client, event publisher and reconciler setup
///
/// # Errors
/// Returns an error if any of the steps above fails
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before anything opens a TLS connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        return Err(anyhow::anyhow!("Failed to install rustls crypto provider"));
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gcs_bucket_operator=info".into()),
        )
        .init();

    info!("Starting GCS Bucket Operator");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let controller_config = ControllerConfig::from_env();
    let server_config = ServerConfig::from_env();
    info!(?controller_config, ?server_config, "Loaded configuration");

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());

    // Start the HTTP server in the background and wait until it is bound, so
    // that readiness probes pass before reconciliation starts.
    let server_state_clone = server_state.clone();
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let buckets: Api<Bucket> = match controller_config.watch_namespace.as_deref() {
        Some(namespace) => {
            info!("Watching Bucket resources in namespace {}", namespace);
            Api::namespaced(client.clone(), namespace)
        }
        None => {
            info!("Watching Bucket resources in all namespaces");
            Api::all(client.clone())
        }
    };
    check_crd_installed(&buckets).await;

    let provider = GcsREST::from_config(&controller_config)?;
    let reconciler = Arc::new(Reconciler::new(
        Arc::new(KubeBucketStore::new(client.clone())),
        Arc::new(provider),
        Arc::new(KubeEventPublisher::new(client.clone(), CONTROLLER_NAME)),
        controller_config,
    ));

    info!("Operator initialized, starting watch loop...");

    Ok(InitializationResult {
        buckets,
        reconciler,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = server_config.startup_timeout();
    let poll_interval = server_config.poll_interval();
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Log a startup summary, or a hint when the CRD is not installed yet
///
/// The watch itself picks up every existing resource, so nothing is
/// reconciled here.
async fn check_crd_installed(buckets: &Api<Bucket>) {
    match buckets.list(&ListParams::default()).await {
        Ok(list) => {
            info!(
                "CRD is queryable, found {} existing Bucket resources",
                list.items.len()
            );
        }
        Err(e) => {
            warn!(
                "Failed to list Bucket resources ({}). Is the CRD installed? Generate it with `crdgen | kubectl apply -f -`",
                e
            );
        }
    }
}
