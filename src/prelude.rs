//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use sealed_secret_generator::prelude::*;
//! ```

pub use crate::config::{LogFormat, ServerConfig};
pub use crate::namespaces::{KubeNamespaceSource, NamespaceList, NamespaceSource, StaticNamespaces};
pub use crate::pipeline::{
    validate, BuildError, EnvSet, KubectlManifestGenerator, KubesealSealer, ManifestGenerator,
    Pipeline, PipelineError, SealError, SealedManifest, Sealer, SecretManifestBuilder,
    SecretSealer, ValidationError, WorkingStorage,
};
