//! # Sealing
//!
//! Encrypts a plaintext Secret manifest into a Bitnami `SealedSecret`.
//!
//! The manifest is streamed to a [`Sealer`] on stdin; the production sealer runs
//! `kubeseal --format yaml`, which encrypts with the public key of the
//! sealed-secrets controller. The result is parsed into [`SealedSecret`] and
//! persisted for download. The plaintext artifacts are discarded as soon as the
//! sealer returns, whether it succeeded or not.

use crate::pipeline::manifest::PlaintextManifest;
use crate::pipeline::process::{describe_exit_code, ToolError, ToolInvocation};
use crate::pipeline::storage::{RequestId, WorkingStorage};
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// `kind` of a sealed secret document
pub const SEALED_SECRET_KIND: &str = "SealedSecret";

/// Capability that encrypts a Secret manifest
#[async_trait]
pub trait Sealer: Send + Sync {
    /// Seal the Secret manifest YAML and return the SealedSecret YAML
    async fn seal(&self, manifest_yaml: &[u8]) -> Result<Vec<u8>, ToolError>;
}

/// [`Sealer`] backed by the `kubeseal` binary
#[derive(Debug, Clone)]
pub struct KubesealSealer {
    pub binary: String,
    pub timeout: Duration,
    /// `--controller-name`, kubeseal's default when unset
    pub controller_name: Option<String>,
    /// `--controller-namespace`, kubeseal's default when unset
    pub controller_namespace: Option<String>,
    /// `--cert`; seals offline with this public certificate instead of asking the controller
    pub cert: Option<PathBuf>,
}

impl KubesealSealer {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            controller_name: None,
            controller_namespace: None,
            cert: None,
        }
    }

    /// Arguments passed to kubeseal
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--format".into(), "yaml".into()];
        if let Some(name) = &self.controller_name {
            args.push("--controller-name".into());
            args.push(name.into());
        }
        if let Some(namespace) = &self.controller_namespace {
            args.push("--controller-namespace".into());
            args.push(namespace.into());
        }
        if let Some(cert) = &self.cert {
            args.push("--cert".into());
            args.push(cert.into());
        }
        args
    }
}

#[async_trait]
impl Sealer for KubesealSealer {
    async fn seal(&self, manifest_yaml: &[u8]) -> Result<Vec<u8>, ToolError> {
        let mut invocation = ToolInvocation::new("kubeseal", self.binary.clone(), self.timeout);
        invocation.args = self.args();
        invocation.run(Some(manifest_yaml)).await
    }
}

/// `bitnami.com/v1alpha1` SealedSecret document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecret {
    pub api_version: String,
    pub kind: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub spec: SealedSecretSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedSecretSpec {
    /// Key to base64 ciphertext
    #[serde(default)]
    pub encrypted_data: BTreeMap<String, String>,
    /// Metadata applied to the Secret the controller unseals
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<serde_yaml::Value>,
}

/// Parse sealer output into a [`SealedSecret`]
pub fn parse_sealed_secret(yaml: &str) -> Result<SealedSecret, SealError> {
    let document: SealedSecret = serde_yaml::from_str(yaml)
        .map_err(|e| SealError::MalformedOutput(format!("not a SealedSecret document: {e}")))?;
    if document.kind != SEALED_SECRET_KIND {
        return Err(SealError::MalformedOutput(format!(
            "expected kind {SEALED_SECRET_KIND}, got {}",
            document.kind
        )));
    }
    Ok(document)
}

/// Sealed manifest, safe to display and store
#[derive(Debug, Clone)]
pub struct SealedManifest {
    pub request_id: RequestId,
    pub document: SealedSecret,
    /// Sealer output exactly as returned
    pub yaml: String,
    /// File name under the working storage, used for the download link
    pub file_name: String,
    /// Path at which the sealed YAML was persisted
    pub path: PathBuf,
}

impl SealedManifest {
    pub fn secret_name(&self) -> Option<&str> {
        self.document.metadata.name.as_deref()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.document.metadata.namespace.as_deref()
    }

    pub fn encrypted_keys(&self) -> impl Iterator<Item = &str> {
        self.document.spec.encrypted_data.keys().map(String::as_str)
    }
}

/// Error raised while sealing
#[derive(Debug, Error)]
pub enum SealError {
    /// The sealer exited unsuccessfully (e.g. controller or key unavailable)
    #[error("Sealing failed (exit code {}): {stderr}", describe_exit_code(.exit_code))]
    ToolFailure {
        exit_code: Option<i32>,
        stderr: String,
    },
    /// The sealer did not finish in time
    #[error("Sealing timed out after {0:?}")]
    Timeout(Duration),
    /// The sealer could not be started
    #[error("Sealer unavailable: {0}")]
    Unavailable(String),
    /// The sealer succeeded but its output is not a SealedSecret
    #[error("Sealer returned malformed output: {0}")]
    MalformedOutput(String),
    /// The sealed manifest could not be persisted
    #[error("Working storage error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ToolError> for SealError {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::Failed {
                exit_code, stderr, ..
            } => SealError::ToolFailure { exit_code, stderr },
            ToolError::TimedOut { timeout, .. } => SealError::Timeout(timeout),
            ToolError::Unavailable { reason, .. } => SealError::Unavailable(reason),
            ToolError::Io { source, .. } => SealError::Io(source),
        }
    }
}

/// Seals plaintext manifests and persists the result
#[derive(Clone)]
pub struct SecretSealer {
    sealer: Arc<dyn Sealer>,
    storage: WorkingStorage,
}

impl std::fmt::Debug for SecretSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretSealer")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl SecretSealer {
    pub fn new(sealer: Arc<dyn Sealer>, storage: WorkingStorage) -> Self {
        Self { sealer, storage }
    }

    /// Seal a plaintext manifest
    ///
    /// Consumes the manifest; its plaintext artifacts are removed before this returns.
    pub async fn seal(&self, manifest: PlaintextManifest) -> Result<SealedManifest, SealError> {
        let result = self.sealer.seal(manifest.yaml().as_bytes()).await;

        let request_id = manifest.request_id;
        let secret_name = manifest.secret_name.clone();
        manifest.discard();

        let output = result?;
        let yaml = String::from_utf8(output)
            .map_err(|e| SealError::MalformedOutput(format!("output is not valid UTF-8: {e}")))?;
        let document = parse_sealed_secret(&yaml)?;

        let path = self
            .storage
            .persist_sealed(request_id, &secret_name, &yaml)
            .await?;

        info!(
            "Sealed {} keys into {}",
            document.spec.encrypted_data.len(),
            path.display()
        );

        Ok(SealedManifest {
            request_id,
            document,
            yaml,
            file_name: WorkingStorage::sealed_file_name(request_id, &secret_name),
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KUBESEAL_OUTPUT: &str = r"---
apiVersion: bitnami.com/v1alpha1
kind: SealedSecret
metadata:
  creationTimestamp: null
  name: custom-env-secret
  namespace: default
spec:
  encryptedData:
    DB_HOST: AgBy3i4OJSWK+PiTySYZZA==
    DB_PORT: AgCtr8OJSWK+PiTySYZZB==
  template:
    metadata:
      creationTimestamp: null
      name: custom-env-secret
      namespace: default
";

    #[test]
    fn test_parse_kubeseal_output() {
        let document = parse_sealed_secret(KUBESEAL_OUTPUT).expect("valid output");
        assert_eq!(document.api_version, "bitnami.com/v1alpha1");
        assert_eq!(document.metadata.name.as_deref(), Some("custom-env-secret"));
        assert_eq!(document.metadata.namespace.as_deref(), Some("default"));
        let keys: Vec<&String> = document.spec.encrypted_data.keys().collect();
        assert_eq!(keys, vec!["DB_HOST", "DB_PORT"]);
        assert!(document.spec.template.is_some());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_sealed_secret("this is: [not, closed").expect_err("must fail");
        assert!(matches!(err, SealError::MalformedOutput(_)));
    }

    #[test]
    fn test_parse_rejects_plain_secret() {
        let yaml = "apiVersion: v1\nkind: Secret\nmetadata:\n  name: x\nspec: {}\n";
        let err = parse_sealed_secret(yaml).expect_err("must fail");
        assert_eq!(
            err.to_string(),
            "Sealer returned malformed output: expected kind SealedSecret, got Secret"
        );
    }

    #[test]
    fn test_kubeseal_args() {
        let mut sealer = KubesealSealer::new("kubeseal", Duration::from_secs(30));
        let plain: Vec<OsString> = vec!["--format".into(), "yaml".into()];
        assert_eq!(sealer.args(), plain);

        sealer.controller_name = Some("sealed-secrets".to_string());
        sealer.controller_namespace = Some("kube-system".to_string());
        sealer.cert = Some(PathBuf::from("/etc/sealed/cert.pem"));
        let args: Vec<String> = sealer
            .args()
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--format",
                "yaml",
                "--controller-name",
                "sealed-secrets",
                "--controller-namespace",
                "kube-system",
                "--cert",
                "/etc/sealed/cert.pem",
            ]
        );
    }

    #[test]
    fn test_tool_failure_message_carries_exit_code() {
        let err = SealError::from(ToolError::Failed {
            tool: "kubeseal".to_string(),
            exit_code: Some(1),
            stderr: "cannot fetch certificate".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "Sealing failed (exit code 1): cannot fetch certificate"
        );
    }

    #[test]
    fn test_timeout_message_keeps_sub_second_precision() {
        let err = SealError::from(ToolError::TimedOut {
            tool: "kubeseal".to_string(),
            timeout: Duration::from_millis(1500),
        });
        assert_eq!(err.to_string(), "Sealing timed out after 1.5s");
    }
}
