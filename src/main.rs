//! # GitOps Deploy Controller
//!
//! A Kubernetes controller that continuously applies manifests stored in Git.
//!
//! ## Overview
//!
//! For every `GitOpsDeployment` resource the controller:
//!
//! 1. **Mirrors the repository** - clones the requested branch once, then pulls on each cycle
//! 2. **Walks the manifest path** - every `.yaml` file below `spec.path`, in sorted order
//! 3. **Applies each document** - create when absent, otherwise replace, in the `default` namespace
//! 4. **Reports status** - `synced`, `lastSyncTime` and a `Ready` condition
//! 5. **Requeues** - after `spec.interval`, or with Fibonacci backoff after a failure
//!
//! Configuration comes from environment variables (see `config`); the flags below
//! override them.

use anyhow::Result;
use clap::Parser;
use gitops_deploy_controller::config::load_config;
use gitops_deploy_controller::runtime::{initialization, watch_loop};
use std::path::PathBuf;

/// GitOps Deploy Controller
#[derive(Debug, Parser)]
#[command(name = "gitops-deploy-controller", version, about, long_about = None)]
struct Args {
    /// Port for the metrics and probe server (overrides METRICS_PORT)
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Directory holding one mirror per deployment (overrides MIRROR_ROOT)
    #[arg(long)]
    mirror_root: Option<PathBuf>,

    /// Timeout for a single git invocation in seconds, 0 disables (overrides GIT_TIMEOUT_SECS)
    #[arg(long)]
    git_timeout_secs: Option<u64>,

    /// Add a finalizer so deleting a deployment also deletes what it applied
    #[arg(long)]
    enable_finalizer: bool,

    /// Maximum number of deployments reconciled at once (overrides MAX_CONCURRENT_RECONCILIATIONS)
    #[arg(long)]
    max_concurrent_reconciliations: Option<u16>,

    /// Log format, `json` or `text` (overrides LOG_FORMAT)
    #[arg(long)]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (mut controller_config, mut server_config) = load_config();

    if let Some(port) = args.metrics_port {
        server_config.metrics_port = port;
    }
    if let Some(root) = args.mirror_root {
        controller_config.mirror_root = root;
    }
    if let Some(secs) = args.git_timeout_secs {
        controller_config.git_timeout_secs = secs;
    }
    if args.enable_finalizer {
        controller_config.finalizer_enabled = true;
    }
    if let Some(concurrency) = args.max_concurrent_reconciliations {
        controller_config.max_concurrent_reconciliations = concurrency.max(1);
    }
    if let Some(format) = args.log_format {
        controller_config.log_format = format;
    }

    let init = initialization::initialize(controller_config, server_config).await?;

    watch_loop::run_watch_loop(
        init.deployments,
        init.reconciler,
        init.server_state,
        init.controller_config,
    )
    .await
}
