//! # Server Configuration
//!
//! Service-level settings loaded from environment variables.

use crate::pipeline::{KubectlManifestGenerator, KubesealSealer};
use std::path::PathBuf;
use std::time::Duration;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines
    Text,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Service configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port
    pub port: u16,
    /// HTTP bind address
    pub bind_address: String,
    /// Working directory holding per-request artifacts and sealed manifests
    pub upload_dir: PathBuf,
    /// Base name of the env file; the Secret is named `<base>-secret`
    pub secret_base_name: String,
    /// kubectl binary name or path
    pub kubectl_path: String,
    /// kubeseal binary name or path
    pub kubeseal_path: String,
    /// Upper bound for each external tool invocation (seconds)
    pub tool_timeout_secs: u64,
    /// Name of the sealed-secrets controller service (kubeseal `--controller-name`)
    pub controller_name: Option<String>,
    /// Namespace of the sealed-secrets controller (kubeseal `--controller-namespace`)
    pub controller_namespace: Option<String>,
    /// Public certificate to seal offline (kubeseal `--cert`)
    pub sealing_cert: Option<PathBuf>,
    /// Log format (json, text)
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            port: DEFAULT_PORT,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            secret_base_name: DEFAULT_SECRET_BASE_NAME.to_string(),
            kubectl_path: DEFAULT_KUBECTL_PATH.to_string(),
            kubeseal_path: DEFAULT_KUBESEAL_PATH.to_string(),
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            controller_name: None,
            controller_namespace: None,
            sealing_cert: None,
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            port: env_var_or_default("PORT", DEFAULT_PORT),
            bind_address: env_var_or_default_str("BIND_ADDRESS", DEFAULT_BIND_ADDRESS),
            upload_dir: PathBuf::from(env_var_or_default_str("UPLOAD_DIR", DEFAULT_UPLOAD_DIR)),
            secret_base_name: env_var_or_default_str("SECRET_BASE_NAME", DEFAULT_SECRET_BASE_NAME),
            kubectl_path: env_var_or_default_str("KUBECTL_PATH", DEFAULT_KUBECTL_PATH),
            kubeseal_path: env_var_or_default_str("KUBESEAL_PATH", DEFAULT_KUBESEAL_PATH),
            tool_timeout_secs: env_var_or_default("TOOL_TIMEOUT_SECS", DEFAULT_TOOL_TIMEOUT_SECS),
            controller_name: env_var_opt("SEALED_SECRETS_CONTROLLER_NAME"),
            controller_namespace: env_var_opt("SEALED_SECRETS_CONTROLLER_NAMESPACE"),
            sealing_cert: env_var_opt("SEALED_SECRETS_CERT").map(PathBuf::from),
            log_format: LogFormat::parse(&env_var_or_default_str("LOG_FORMAT", "text")),
        }
    }

    /// Get tool timeout duration
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Address the HTTP server binds to
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// kubectl-backed manifest generator for this configuration
    pub fn manifest_generator(&self) -> KubectlManifestGenerator {
        KubectlManifestGenerator::new(&self.kubectl_path, self.tool_timeout())
    }

    /// kubeseal-backed sealer for this configuration
    pub fn sealer(&self) -> KubesealSealer {
        KubesealSealer {
            binary: self.kubeseal_path.clone(),
            timeout: self.tool_timeout(),
            controller_name: self.controller_name.clone(),
            controller_namespace: self.controller_namespace.clone(),
            cert: self.sealing_cert.clone(),
        }
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read an optional, non-empty environment variable
fn env_var_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
