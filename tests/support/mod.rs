//! Shared fakes for pipeline and server tests.
//!
//! `FakeGenerator` renders a real `v1/Secret` from the env file, like
//! `kubectl create secret generic --from-env-file`. `FakeSealer` wraps each value
//! with a per-call nonce and base64, so sealing is non-deterministic but
//! reversible with [`unseal`].

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use sealed_secret_generator::namespaces::StaticNamespaces;
use sealed_secret_generator::pipeline::{
    ManifestGenerator, Pipeline, SealedSecret, SealedSecretSpec, Sealer, SecretManifestBuilder,
    SecretSealer, ToolError, WorkingStorage,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const KNOWN_NAMESPACES: [&str; 2] = ["default", "payments"];

#[derive(Default)]
pub struct FakeGenerator {
    pub calls: AtomicUsize,
    /// Env file paths seen, with the file contents at the time of the call
    pub seen: Mutex<Vec<(PathBuf, String)>>,
    pub delay: Option<Duration>,
}

impl FakeGenerator {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ManifestGenerator for FakeGenerator {
    async fn generate(
        &self,
        secret_name: &str,
        namespace: &str,
        env_file: &Path,
    ) -> Result<Vec<u8>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let contents = tokio::fs::read_to_string(env_file)
            .await
            .expect("env file must exist while the generator runs");
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        // Re-read after the delay: a concurrent request must not have overwritten it
        let after = tokio::fs::read_to_string(env_file)
            .await
            .expect("env file must still exist");
        assert_eq!(contents, after, "env file changed during generation");
        self.seen
            .lock()
            .expect("lock")
            .push((env_file.to_path_buf(), contents.clone()));

        let data: BTreeMap<String, ByteString> = contents
            .lines()
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
            .collect();
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(secret_name.to_string()),
                namespace: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            data: Some(data),
            ..Secret::default()
        };
        Ok(serde_yaml::to_string(&secret)
            .expect("Failed to serialize Secret in test")
            .into_bytes())
    }
}

pub struct FailingGenerator;

#[async_trait]
impl ManifestGenerator for FailingGenerator {
    async fn generate(&self, _: &str, _: &str, _: &Path) -> Result<Vec<u8>, ToolError> {
        Err(ToolError::Failed {
            tool: "kubectl".to_string(),
            exit_code: Some(1),
            stderr: "error: failed to create secret".to_string(),
        })
    }
}

#[derive(Default)]
pub struct FakeSealer {
    pub calls: AtomicUsize,
    nonce: AtomicUsize,
}

#[async_trait]
impl Sealer for FakeSealer {
    async fn seal(&self, manifest_yaml: &[u8]) -> Result<Vec<u8>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let secret: Secret =
            serde_yaml::from_slice(manifest_yaml).expect("sealer input must be a Secret");
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);

        let encrypted_data = secret
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| {
                let mut payload = format!("{nonce}:").into_bytes();
                payload.extend_from_slice(&value.0);
                (key, general_purpose::STANDARD.encode(payload))
            })
            .collect();

        let sealed = SealedSecret {
            api_version: "bitnami.com/v1alpha1".to_string(),
            kind: "SealedSecret".to_string(),
            metadata: secret.metadata,
            spec: SealedSecretSpec {
                encrypted_data,
                template: None,
            },
        };
        Ok(serde_yaml::to_string(&sealed)
            .expect("Failed to serialize SealedSecret in test")
            .into_bytes())
    }
}

/// Reverse [`FakeSealer`]
pub fn unseal(sealed: &SealedSecret) -> BTreeMap<String, String> {
    sealed
        .spec
        .encrypted_data
        .iter()
        .map(|(key, ciphertext)| {
            let payload = general_purpose::STANDARD
                .decode(ciphertext)
                .expect("fake ciphertext is base64");
            let payload = String::from_utf8(payload).expect("fake payload is UTF-8");
            let (_nonce, value) = payload.split_once(':').expect("fake payload has a nonce");
            (key.clone(), value.to_string())
        })
        .collect()
}

/// Sealer that always fails with a fixed error
pub struct ErrSealer(pub fn() -> ToolError);

#[async_trait]
impl Sealer for ErrSealer {
    async fn seal(&self, _: &[u8]) -> Result<Vec<u8>, ToolError> {
        Err((self.0)())
    }
}

/// Sealer whose output is not a SealedSecret
pub struct GarbageSealer;

#[async_trait]
impl Sealer for GarbageSealer {
    async fn seal(&self, _: &[u8]) -> Result<Vec<u8>, ToolError> {
        Ok(b"error: this is not yaml: [".to_vec())
    }
}

pub fn pipeline(
    storage: &WorkingStorage,
    generator: Arc<dyn ManifestGenerator>,
    sealer: Arc<dyn Sealer>,
) -> Pipeline {
    Pipeline::new(
        SecretManifestBuilder::new(generator, storage.clone(), "custom-env"),
        SecretSealer::new(sealer, storage.clone()),
        Arc::new(StaticNamespaces(
            KNOWN_NAMESPACES.iter().map(ToString::to_string).collect(),
        )),
        "custom-env",
    )
}

/// Names of everything directly under `dir`, sorted
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read dir in test")
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}
