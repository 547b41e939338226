//! # Pipeline Orchestration
//!
//! One submission moves linearly through
//! `Received → Validated → ManifestBuilt → Sealed → Done`,
//! or stops at the first failing stage. Nothing is retried.

use crate::constants::SECRET_NAME_SUFFIX;
use crate::namespaces::{self, NamespaceList, NamespaceSource};
use crate::observability::metrics;
use crate::pipeline::env::{self, ValidationError};
use crate::pipeline::manifest::{BuildError, SecretManifestBuilder, SecretRequest};
use crate::pipeline::seal::{SealError, SealedManifest, SecretSealer};
use crate::pipeline::storage::RequestId;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

/// Stage of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Validated,
    ManifestBuilt,
    Sealed,
    Done,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::ManifestBuilt => "manifest_built",
            PipelineStage::Sealed => "sealed",
            PipelineStage::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a submission failed
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Nothing but whitespace was submitted
    #[error("No input provided")]
    EmptyInput,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Seal(#[from] SealError),
}

impl PipelineError {
    /// Last stage reached before the failure
    pub fn stage(&self) -> PipelineStage {
        match self {
            PipelineError::EmptyInput | PipelineError::Validation(_) => PipelineStage::Received,
            PipelineError::Build(_) => PipelineStage::Validated,
            PipelineError::Seal(_) => PipelineStage::ManifestBuilt,
        }
    }

    /// Caused by the submitted text rather than the environment
    pub fn is_user_error(&self) -> bool {
        matches!(self, PipelineError::EmptyInput | PipelineError::Validation(_))
    }
}

/// Composes validation, manifest building and sealing
#[derive(Clone)]
pub struct Pipeline {
    builder: SecretManifestBuilder,
    sealer: SecretSealer,
    namespaces: Arc<dyn NamespaceSource>,
    secret_base_name: String,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("builder", &self.builder)
            .field("sealer", &self.sealer)
            .field("secret_base_name", &self.secret_base_name)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn new(
        builder: SecretManifestBuilder,
        sealer: SecretSealer,
        namespaces: Arc<dyn NamespaceSource>,
        secret_base_name: impl Into<String>,
    ) -> Self {
        Self {
            builder,
            sealer,
            namespaces,
            secret_base_name: secret_base_name.into(),
        }
    }

    /// Name of the Secret every submission produces
    pub fn secret_name(&self) -> String {
        format!("{}{SECRET_NAME_SUFFIX}", self.secret_base_name)
    }

    /// Namespaces currently offered, with fallback
    pub async fn namespaces(&self) -> NamespaceList {
        namespaces::discover(self.namespaces.as_ref()).await
    }

    /// Run one submission end to end
    ///
    /// `namespace` falls back to `default` when empty or unknown.
    pub async fn submit(
        &self,
        raw_env_text: &str,
        namespace: &str,
    ) -> Result<SealedManifest, PipelineError> {
        let request_id = RequestId::new();
        let span = info_span!("pipeline.submit", request.id = %request_id, namespace = %namespace);

        async move {
            let result = self.run(request_id, raw_env_text, namespace).await;
            match &result {
                Ok(sealed) => {
                    info!("Submission sealed to {}", sealed.file_name);
                    metrics::increment_submissions("sealed");
                }
                Err(e) if e.is_user_error() => {
                    info!("Submission rejected at stage {}: {}", e.stage(), e);
                    metrics::increment_submissions("rejected");
                }
                Err(e) => {
                    warn!("Submission failed at stage {}: {}", e.stage(), e);
                    metrics::increment_submissions("failed");
                    metrics::increment_stage_failures(e.stage().as_str());
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        request_id: RequestId,
        raw_env_text: &str,
        namespace: &str,
    ) -> Result<SealedManifest, PipelineError> {
        let mut stage = PipelineStage::Received;

        if raw_env_text.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let env = env::validate(strip_blank_edges(raw_env_text))?;
        stage = advance(stage, PipelineStage::Validated);

        let namespace = self.namespaces().await.resolve(Some(namespace));
        let request = SecretRequest {
            request_id,
            secret_name: self.secret_name(),
            namespace,
            env,
        };

        let manifest = self.builder.build(&request).await?;
        stage = advance(stage, PipelineStage::ManifestBuilt);

        let sealed = self.sealer.seal(manifest).await?;
        stage = advance(stage, PipelineStage::Sealed);

        advance(stage, PipelineStage::Done);
        Ok(sealed)
    }
}

/// Drop leading whitespace and trailing blank lines from a submission
///
/// Trailing spaces on the last line are part of its value and are kept.
fn strip_blank_edges(text: &str) -> &str {
    let text = text.trim_start();
    let mut end = text.len();
    loop {
        let body = text[..end].trim_end_matches(['\r', '\n']);
        match body.rfind('\n') {
            Some(newline) if body[newline + 1..].trim().is_empty() => end = newline,
            _ => return body,
        }
    }
}

fn advance(from: PipelineStage, to: PipelineStage) -> PipelineStage {
    debug!("Pipeline stage {} -> {}", from, to);
    to
}
