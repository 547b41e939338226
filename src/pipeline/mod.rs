//! # Env-to-SealedSecret Pipeline
//!
//! - `env`: validates `KEY=VALUE` text
//! - `manifest`: renders the plaintext Secret manifest (`kubectl` dry run)
//! - `seal`: encrypts it into a SealedSecret (`kubeseal`)
//! - `orchestrator`: runs the three as one submission
//! - `process`: bounded external tool execution
//! - `storage`: per-request working directories and the sealed artifact store

pub mod env;
pub mod manifest;
pub mod orchestrator;
pub mod process;
pub mod seal;
pub mod storage;

pub use env::{validate, EnvEntry, EnvSet, ValidationError};
pub use manifest::{
    BuildError, KubectlManifestGenerator, ManifestGenerator, PlaintextManifest,
    SecretManifestBuilder, SecretRequest,
};
pub use orchestrator::{Pipeline, PipelineError, PipelineStage};
pub use process::{ToolError, ToolInvocation};
pub use seal::{
    parse_sealed_secret, KubesealSealer, SealError, SealedManifest, SealedSecret,
    SealedSecretSpec, Sealer, SecretSealer,
};
pub use storage::{RequestId, WorkDir, WorkingStorage};
