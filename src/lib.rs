//! Sealed Secret Generator Library
//!
//! Turns `KEY=VALUE` environment definitions into Bitnami `SealedSecret`
//! manifests that are safe to commit to version control.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sealed_secret_generator::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::from_env();
//! let storage = WorkingStorage::open(&config.upload_dir)?;
//! let pipeline = Pipeline::new(
//!     SecretManifestBuilder::new(
//!         Arc::new(config.manifest_generator()),
//!         storage.clone(),
//!         config.secret_base_name.clone(),
//!     ),
//!     SecretSealer::new(Arc::new(config.sealer()), storage),
//!     Arc::new(KubeNamespaceSource::connect().await),
//!     config.secret_base_name.clone(),
//! );
//!
//! let sealed = pipeline.submit("DB_HOST=localhost\nDB_PORT=5432", "default").await?;
//! println!("{}", sealed.yaml);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod namespaces;
pub mod observability;
pub mod pipeline;
pub mod prelude;
pub mod server;
