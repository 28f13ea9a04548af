//! # Controller Configuration
//!
//! Controller-level configuration loaded from environment variables (populated from ConfigMap).
//!
//! All configuration has sensible defaults and can be overridden via environment variables.
//! Environment variables are populated from a ConfigMap using `envFrom` in the deployment.
//! Command-line flags parsed in `main.rs` take precedence over both.

mod controller;
mod server;

pub use controller::ControllerConfig;
pub use server::ServerConfig;

use std::sync::Arc;

/// Controller configuration shared between the reconciler and the runtime
pub type SharedControllerConfig = Arc<ControllerConfig>;

/// Server configuration shared with the HTTP server task
pub type SharedServerConfig = Arc<ServerConfig>;

/// Load configuration from environment variables with defaults
#[must_use]
pub fn load_config() -> (ControllerConfig, ServerConfig) {
    (ControllerConfig::from_env(), ServerConfig::from_env())
}

/// Read environment variable or return default value
pub(crate) fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T
where
    <T as std::str::FromStr>::Err: std::fmt::Debug,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
pub(crate) fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Read environment variable as string or return default
pub(crate) fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    let v_lower = value.to_lowercase();
    v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_truthy_values() {
        for value in ["true", "TRUE", "1", "yes", "On"] {
            assert!(parse_bool(value), "{value} should be truthy");
        }
    }

    #[test]
    fn test_parse_bool_falsy_values() {
        for value in ["false", "0", "no", "off", "", "enabled"] {
            assert!(!parse_bool(value), "{value} should be falsy");
        }
    }

    #[test]
    fn test_env_var_or_default_missing_key() {
        let value: u64 = env_var_or_default("GITOPS_TEST_SURELY_UNSET_KEY", 42);
        assert_eq!(value, 42);
    }
}
