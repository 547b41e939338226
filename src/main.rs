//! # Sealed Secret Generator
//!
//! Web service that converts `KEY=VALUE` environment definitions into Bitnami
//! SealedSecret manifests.
//!
//! ## Overview
//!
//! 1. **Form** - the operator pastes env definitions and picks a namespace
//! 2. **Validation** - keys are checked and duplicates rejected
//! 3. **Secret manifest** - rendered by `kubectl create secret generic --dry-run=client`
//! 4. **Sealing** - encrypted by `kubeseal` with the cluster's public key
//! 5. **Download** - the sealed YAML is kept for download and safe to commit
//!
//! Configuration comes from environment variables, see [`ServerConfig`].

use anyhow::{Context, Result};
use sealed_secret_generator::config::ServerConfig;
use sealed_secret_generator::namespaces::KubeNamespaceSource;
use sealed_secret_generator::observability::{logging, metrics};
use sealed_secret_generator::pipeline::{
    Pipeline, SecretManifestBuilder, SecretSealer, WorkingStorage,
};
use sealed_secret_generator::server::{start_server, AppState};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env();
    logging::init(config.log_format);

    // Required for rustls 0.23+ before the Kubernetes client opens a connection
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    info!("Starting Sealed Secret Generator");
    info!(
        "Build info: timestamp={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_GIT_HASH")
    );

    metrics::register_metrics()?;

    let storage = WorkingStorage::open(&config.upload_dir).with_context(|| {
        format!(
            "Failed to create upload directory {}",
            config.upload_dir.display()
        )
    })?;

    let namespaces = Arc::new(KubeNamespaceSource::connect().await);
    let pipeline = Pipeline::new(
        SecretManifestBuilder::new(
            Arc::new(config.manifest_generator()),
            storage.clone(),
            config.secret_base_name.clone(),
        ),
        SecretSealer::new(Arc::new(config.sealer()), storage.clone()),
        namespaces,
        config.secret_base_name.clone(),
    );

    let state = Arc::new(AppState::new(pipeline, storage)?);
    start_server(&config.listen_address(), state).await
}
