//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use super::{env_var_or_default, env_var_or_default_bool, env_var_or_default_str};
use std::path::PathBuf;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Root directory holding one local mirror per deployment
    /// Mirror path is `<mirror_root>/<namespace>/<name>`
    pub mirror_root: PathBuf,
    /// Remote name pulled from on every cycle
    pub git_remote: String,
    /// Upper bound for a single git invocation (seconds)
    /// 0 disables the timeout
    pub git_timeout_secs: u64,
    /// Enable the finalizer-gated Terminating phase
    /// When false, deleting a deployment leaves applied objects and the mirror in place
    pub finalizer_enabled: bool,
    /// Fibonacci error backoff lower bound (minutes)
    pub backoff_min_minutes: u64,
    /// Fibonacci error backoff upper bound (minutes)
    pub backoff_max_minutes: u64,
    /// Exponential backoff starting value for watch stream errors (milliseconds)
    pub watch_backoff_start_ms: u64,
    /// Exponential backoff maximum value for watch stream errors (milliseconds)
    pub watch_backoff_max_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Maximum concurrent reconciliations
    /// Distinct deployments run concurrently up to this bound, one cycle per deployment at a time
    pub max_concurrent_reconciliations: u16,
    /// Log format (json, text)
    pub log_format: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            mirror_root: PathBuf::from(DEFAULT_MIRROR_ROOT),
            git_remote: DEFAULT_GIT_REMOTE.to_string(),
            git_timeout_secs: DEFAULT_GIT_TIMEOUT_SECS,
            finalizer_enabled: false,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            watch_backoff_start_ms: DEFAULT_WATCH_BACKOFF_START_MS,
            watch_backoff_max_ms: DEFAULT_WATCH_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            log_format: "json".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            mirror_root: PathBuf::from(env_var_or_default_str("MIRROR_ROOT", DEFAULT_MIRROR_ROOT)),
            git_remote: env_var_or_default_str("GIT_REMOTE", DEFAULT_GIT_REMOTE),
            git_timeout_secs: env_var_or_default("GIT_TIMEOUT_SECS", DEFAULT_GIT_TIMEOUT_SECS),
            finalizer_enabled: env_var_or_default_bool("ENABLE_FINALIZER", false),
            backoff_min_minutes: env_var_or_default(
                "BACKOFF_MIN_MINUTES",
                DEFAULT_BACKOFF_MIN_MINUTES,
            ),
            backoff_max_minutes: env_var_or_default(
                "BACKOFF_MAX_MINUTES",
                DEFAULT_BACKOFF_MAX_MINUTES,
            ),
            watch_backoff_start_ms: env_var_or_default(
                "WATCH_BACKOFF_START_MS",
                DEFAULT_WATCH_BACKOFF_START_MS,
            ),
            watch_backoff_max_ms: env_var_or_default(
                "WATCH_BACKOFF_MAX_MS",
                DEFAULT_WATCH_BACKOFF_MAX_MS,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
        }
    }

    /// Get git timeout as a duration, `None` when disabled
    #[must_use]
    pub fn git_timeout(&self) -> Option<Duration> {
        (self.git_timeout_secs > 0).then(|| Duration::from_secs(self.git_timeout_secs))
    }

    /// Get watch restart delay after end duration
    #[must_use]
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}
