//! # Secret Manifest Generation
//!
//! Turns a validated [`EnvSet`] into a plaintext Kubernetes `Secret` manifest.
//!
//! The env set is written to the request's working directory and handed to a
//! [`ManifestGenerator`]. The production generator runs
//! `kubectl create secret generic ... --dry-run=client -o yaml`, which renders
//! the manifest locally without creating anything in the cluster.

use crate::pipeline::env::EnvSet;
use crate::pipeline::process::{ToolError, ToolInvocation};
use crate::pipeline::storage::{RequestId, WorkDir, WorkingStorage};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Capability that renders a Secret manifest from an env file
#[async_trait]
pub trait ManifestGenerator: Send + Sync {
    /// Render a `Secret` named `secret_name` in `namespace` from the
    /// `KEY=VALUE` lines in `env_file`; returns the manifest YAML
    async fn generate(
        &self,
        secret_name: &str,
        namespace: &str,
        env_file: &Path,
    ) -> Result<Vec<u8>, ToolError>;
}

/// [`ManifestGenerator`] backed by a client-side `kubectl` dry run
#[derive(Debug, Clone)]
pub struct KubectlManifestGenerator {
    pub binary: String,
    pub timeout: Duration,
}

impl KubectlManifestGenerator {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Arguments passed to kubectl
    pub fn args(secret_name: &str, namespace: &str, env_file: &Path) -> Vec<OsString> {
        let mut from_env_file = OsString::from("--from-env-file=");
        from_env_file.push(env_file);
        vec![
            "create".into(),
            "secret".into(),
            "generic".into(),
            secret_name.into(),
            from_env_file,
            format!("--namespace={namespace}").into(),
            "--dry-run=client".into(),
            "-o".into(),
            "yaml".into(),
        ]
    }
}

#[async_trait]
impl ManifestGenerator for KubectlManifestGenerator {
    async fn generate(
        &self,
        secret_name: &str,
        namespace: &str,
        env_file: &Path,
    ) -> Result<Vec<u8>, ToolError> {
        let mut invocation = ToolInvocation::new("kubectl", self.binary.clone(), self.timeout);
        invocation.args = Self::args(secret_name, namespace, env_file);
        invocation.run(None).await
    }
}

/// Everything needed to build the manifest for one submission
#[derive(Debug, Clone)]
pub struct SecretRequest {
    pub request_id: RequestId,
    pub secret_name: String,
    pub namespace: String,
    pub env: EnvSet,
}

/// Unencrypted Secret manifest
///
/// Owns the request's working directory: dropping the manifest removes the
/// plaintext env file and manifest file from disk.
pub struct PlaintextManifest {
    pub request_id: RequestId,
    pub secret_name: String,
    pub namespace: String,
    yaml: Zeroizing<String>,
    work_dir: WorkDir,
}

impl std::fmt::Debug for PlaintextManifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaintextManifest")
            .field("request_id", &self.request_id)
            .field("secret_name", &self.secret_name)
            .field("namespace", &self.namespace)
            .field("yaml", &"<redacted>")
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

impl PlaintextManifest {
    pub fn yaml(&self) -> &str {
        &self.yaml
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    /// Remove the plaintext artifacts now
    pub fn discard(self) {
        self.work_dir.close();
    }
}

/// Error raised while building the plaintext manifest
#[derive(Debug, Error)]
pub enum BuildError {
    /// The manifest generator exited unsuccessfully
    #[error("Secret manifest generation failed (exit code {}): {stderr}", crate::pipeline::process::describe_exit_code(.exit_code))]
    ToolFailure {
        exit_code: Option<i32>,
        stderr: String,
    },
    /// The manifest generator did not finish in time
    #[error("Secret manifest generation timed out after {0:?}")]
    Timeout(Duration),
    /// The manifest generator could not be started
    #[error("Secret manifest generator unavailable: {0}")]
    Unavailable(String),
    /// The manifest generator produced something that is not UTF-8 text
    #[error("Secret manifest generator returned invalid output: {0}")]
    InvalidOutput(String),
    /// Working storage could not be written
    #[error("Working storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ToolError> for BuildError {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::Failed {
                exit_code, stderr, ..
            } => BuildError::ToolFailure { exit_code, stderr },
            ToolError::TimedOut { timeout, .. } => BuildError::Timeout(timeout),
            ToolError::Unavailable { reason, .. } => BuildError::Unavailable(reason),
            ToolError::Io { source, .. } => BuildError::Io(source),
        }
    }
}

/// Builds plaintext Secret manifests
#[derive(Clone)]
pub struct SecretManifestBuilder {
    generator: Arc<dyn ManifestGenerator>,
    storage: WorkingStorage,
    env_file_name: String,
}

impl std::fmt::Debug for SecretManifestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretManifestBuilder")
            .field("storage", &self.storage)
            .field("env_file_name", &self.env_file_name)
            .finish_non_exhaustive()
    }
}

impl SecretManifestBuilder {
    /// `env_file_name` is the base name of the env file inside each working directory
    pub fn new(
        generator: Arc<dyn ManifestGenerator>,
        storage: WorkingStorage,
        env_file_name: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            storage,
            env_file_name: env_file_name.into(),
        }
    }

    /// Build the plaintext manifest for a request
    ///
    /// On failure the working directory is removed before returning.
    pub async fn build(&self, request: &SecretRequest) -> Result<PlaintextManifest, BuildError> {
        let work_dir = self.storage.create_work_dir(request.request_id)?;

        let env_file = work_dir.file(&self.env_file_name);
        tokio::fs::write(&env_file, request.env.to_env_file().as_bytes()).await?;
        debug!(
            "Wrote {} env entries to {}",
            request.env.len(),
            env_file.display()
        );

        let output = self
            .generator
            .generate(&request.secret_name, &request.namespace, &env_file)
            .await?;
        let yaml = Zeroizing::new(
            String::from_utf8(output).map_err(|e| BuildError::InvalidOutput(e.to_string()))?,
        );

        let manifest_file = work_dir.file(&format!("{}.yaml", request.secret_name));
        tokio::fs::write(&manifest_file, yaml.as_bytes()).await?;

        info!(
            "Built Secret manifest {}/{} ({} keys)",
            request.namespace,
            request.secret_name,
            request.env.len()
        );

        Ok(PlaintextManifest {
            request_id: request.request_id,
            secret_name: request.secret_name.clone(),
            namespace: request.namespace.clone(),
            yaml,
            work_dir,
        })
    }
}
