//! # Initialization
//!
//! Controller start-up: rustls provider, tracing, metrics, HTTP server, Kubernetes
//! client, and the reconciler context.

use crate::config::{ControllerConfig, ServerConfig, SharedControllerConfig, SharedServerConfig};
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::crd::GitOpsDeployment;
use crate::observability;
use anyhow::{Context, Result};
use kube::{api::Api, api::ListParams, Client};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default log filter when `RUST_LOG` is unset
const DEFAULT_LOG_FILTER: &str = "gitops_deploy_controller=info";

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    /// GitOpsDeployment API across all namespaces
    pub deployments: Api<GitOpsDeployment>,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    pub controller_config: SharedControllerConfig,
    pub server_config: SharedServerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` selects the filter; `log_format` of `json` switches to JSON lines.
///
/// # Errors
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(log_format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if log_format.eq_ignore_ascii_case("json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}

/// Initialize the controller runtime
///
/// # Errors
/// Returns an error if metrics registration, the HTTP server, or the Kubernetes
/// client cannot be set up.
pub async fn initialize(
    controller_config: ControllerConfig,
    server_config: ServerConfig,
) -> Result<InitializationResult> {
    // Must happen before any TLS connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider already installed");
    }

    init_tracing(&controller_config.log_format)?;

    info!("Starting GitOps Deploy Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(config = ?controller_config, "Controller configuration");

    observability::metrics::register_metrics()?;

    let controller_config: SharedControllerConfig = Arc::new(controller_config);
    let server_config: SharedServerConfig = Arc::new(server_config);

    let server_state = Arc::new(ServerState::new());
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
    let deployments: Api<GitOpsDeployment> = Api::all(client.clone());

    log_existing_deployments(&deployments).await;

    tokio::fs::create_dir_all(&controller_config.mirror_root)
        .await
        .with_context(|| {
            format!(
                "Failed to create mirror root {}",
                controller_config.mirror_root.display()
            )
        })?;

    let reconciler = Arc::new(Reconciler::from_client(
        client.clone(),
        controller_config.clone(),
    ));

    info!("Controller initialized, starting watch loop...");
    Ok(InitializationResult {
        client,
        deployments,
        reconciler,
        server_state,
        controller_config,
        server_config,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = std::time::Duration::from_secs(server_config.startup_timeout_secs);
    let poll_interval = std::time::Duration::from_millis(server_config.poll_interval_ms);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.ready() {
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

/// Log a per-namespace summary of existing deployments; also proves the CRD is queryable
async fn log_existing_deployments(deployments: &Api<GitOpsDeployment>) {
    match deployments.list(&ListParams::default()).await {
        Ok(list) => {
            let mut by_namespace: std::collections::BTreeMap<String, Vec<String>> =
                std::collections::BTreeMap::new();
            for item in &list.items {
                by_namespace
                    .entry(item.metadata.namespace.clone().unwrap_or_else(|| "default".to_string()))
                    .or_default()
                    .push(item.metadata.name.clone().unwrap_or_default());
            }
            info!(
                total = list.items.len(),
                namespaces = by_namespace.len(),
                "Found existing GitOpsDeployment resources"
            );
            for (namespace, mut names) in by_namespace {
                names.sort();
                info!(namespace = %namespace, count = names.len(), "  {}", names.join(", "));
            }
        }
        Err(e) => {
            warn!(
                error = %e,
                "Failed to list GitOpsDeployment resources; is the CRD installed? The watch will keep retrying"
            );
        }
    }
}
