//! # Namespaces
//!
//! Lists the namespaces offered in the form and used to validate a submission's
//! target namespace.
//!
//! Listing is best effort: when the cluster cannot be reached the list falls
//! back to `["default"]` and [`NamespaceList::used_fallback`] is set, so callers
//! can tell an unreachable cluster from one that only has `default`.

use crate::constants::DEFAULT_NAMESPACE;
use crate::observability::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::{api::Api, api::ListParams, Client};
use tracing::{debug, warn};

/// Source of namespace names
#[async_trait]
pub trait NamespaceSource: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<String>>;
}

/// [`NamespaceSource`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeNamespaceSource {
    client: Option<Client>,
}

impl std::fmt::Debug for KubeNamespaceSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeNamespaceSource")
            .field("connected", &self.client.is_some())
            .finish()
    }
}

impl KubeNamespaceSource {
    pub fn new(client: Client) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Connect using the ambient kubeconfig or in-cluster service account
    ///
    /// Never fails: without credentials every listing falls back.
    pub async fn connect() -> Self {
        match Client::try_default().await {
            Ok(client) => Self::new(client),
            Err(e) => {
                warn!("Kubernetes client unavailable, namespace list will fall back to '{DEFAULT_NAMESPACE}': {e}");
                Self { client: None }
            }
        }
    }
}

#[async_trait]
impl NamespaceSource for KubeNamespaceSource {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        let client = self
            .client
            .clone()
            .context("No Kubernetes client configured")?;
        let api: Api<Namespace> = Api::all(client);
        let list = api
            .list(&ListParams::default())
            .await
            .context("Failed to list namespaces")?;
        Ok(list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }
}

/// Fixed namespace list, used by `sealctl` when no cluster lookup is wanted
#[derive(Debug, Clone)]
pub struct StaticNamespaces(pub Vec<String>);

#[async_trait]
impl NamespaceSource for StaticNamespaces {
    async fn list_namespaces(&self) -> Result<Vec<String>> {
        Ok(self.0.clone())
    }
}

/// Namespaces known at the time of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceList {
    pub names: Vec<String>,
    /// `true` when the source failed and `names` is the fallback list
    pub used_fallback: bool,
}

impl NamespaceList {
    pub fn fallback() -> Self {
        Self {
            names: vec![DEFAULT_NAMESPACE.to_string()],
            used_fallback: true,
        }
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.names.iter().any(|n| n == namespace)
    }

    /// Target namespace for a submission: the requested one when known, else `default`
    pub fn resolve(&self, requested: Option<&str>) -> String {
        match requested.map(str::trim).filter(|ns| !ns.is_empty()) {
            Some(ns) if self.contains(ns) => ns.to_string(),
            Some(ns) => {
                debug!("Requested namespace '{}' is not known, using '{}'", ns, DEFAULT_NAMESPACE);
                DEFAULT_NAMESPACE.to_string()
            }
            None => DEFAULT_NAMESPACE.to_string(),
        }
    }
}

/// Query a source, substituting the fallback list on any failure
pub async fn discover(source: &dyn NamespaceSource) -> NamespaceList {
    match source.list_namespaces().await {
        Ok(names) => NamespaceList {
            names,
            used_fallback: false,
        },
        Err(e) => {
            warn!("Unable to list namespaces, falling back to '{}': {:#}", DEFAULT_NAMESPACE, e);
            metrics::increment_namespace_fallbacks();
            NamespaceList::fallback()
        }
    }
}
