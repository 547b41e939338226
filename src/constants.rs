//! # Constants
//!
//! Shared constants used throughout the service.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables (see [`crate::config::ServerConfig`]) or `sealctl` flags.

/// Default HTTP port for the form, downloads, metrics and health probes
pub const DEFAULT_PORT: u16 = 5000;

/// Default bind address for the HTTP server
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Default working directory for per-request artifacts and sealed manifests
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default base name of the env file; the generated Secret is named `<base>-secret`
pub const DEFAULT_SECRET_BASE_NAME: &str = "custom-env";

/// Namespace used when the requested one is missing or unknown,
/// and the sole entry of the fallback namespace list
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default `kubectl` binary (resolved through `PATH`)
pub const DEFAULT_KUBECTL_PATH: &str = "kubectl";

/// Default `kubeseal` binary (resolved through `PATH`)
pub const DEFAULT_KUBESEAL_PATH: &str = "kubeseal";

/// Default upper bound for a single external tool invocation (seconds)
/// kubectl and kubeseal can hang when the cluster or the controller is unreachable
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Suffix appended to the base name to form the Secret name
pub const SECRET_NAME_SUFFIX: &str = "-secret";

/// Suffix of every persisted sealed manifest; downloads are restricted to it
pub const SEALED_FILE_SUFFIX: &str = "-sealed.yaml";

/// Maximum number of stderr characters carried into user-visible errors
pub const MAX_TOOL_STDERR_CHARS: usize = 500;
