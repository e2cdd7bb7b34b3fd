use std::collections::BTreeSet;

use async_trait::async_trait;
use futures::future::try_join_all;
use k8s_openapi::api::authentication::v1::SelfSubjectReview;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::{debug, info, warn};

use crate::config::Scope;
use crate::constants;
use crate::error::{DiscoveryError, CLUSTER_ACCESS, NAMESPACE_LISTING};
use crate::types::ScanRequest;

/// What the cluster looks like from the caller's seat.
#[async_trait]
pub trait ClusterTopology: Send + Sync {
    /// Names of every probeable resource type, `plural` or `plural.group`.
    async fn list_resource_types(&self) -> Result<Vec<String>, DiscoveryError>;

    async fn resolve_identity(&self) -> Result<String, DiscoveryError>;

    async fn resolve_current_namespace(&self) -> Result<String, DiscoveryError>;

    async fn list_namespaces(&self) -> Result<Vec<String>, DiscoveryError>;
}

fn extract_group(group_version: &str) -> Option<&str> {
    group_version.split_once('/').map(|(group, _)| group)
}

/// Catalog name as `kubectl` prints it: bare plural for the core group.
fn qualified_name(plural: &str, group: Option<&str>) -> String {
    match group {
        Some(group) if !group.is_empty() => format!("{}.{}", plural, group),
        _ => plural.to_string(),
    }
}

pub struct KubeTopology {
    client: Client,
    default_namespace: String,
}

impl KubeTopology {
    /// `default_namespace` is the namespace the client configuration points
    /// at, usually the kubeconfig context namespace.
    pub fn new(client: Client, default_namespace: String) -> Self {
        Self {
            client,
            default_namespace,
        }
    }
}

#[async_trait]
impl ClusterTopology for KubeTopology {
    async fn list_resource_types(&self) -> Result<Vec<String>, DiscoveryError> {
        let classify = |e: kube::Error| DiscoveryError::classify(CLUSTER_ACCESS, e);
        let client = &self.client;

        let api_groups = client.list_api_groups().await.map_err(classify)?;
        let core_api_versions = client.list_core_api_versions().await.map_err(classify)?;
        let api_resources = try_join_all(
            api_groups
                .groups
                .iter()
                .filter_map(|g| g.preferred_version.clone())
                .map(|g| {
                    let version = g.group_version;
                    async move { client.list_api_group_resources(&version).await }
                }),
        )
        .await
        .map_err(classify)?;
        let core_resources = try_join_all(core_api_versions.versions.first().map(|version| {
            async move { client.list_core_api_resources(version).await }
        }))
        .await
        .map_err(classify)?;

        let names = api_resources
            .iter()
            .chain(core_resources.iter())
            .flat_map(|list| {
                let group = extract_group(&list.group_version);
                list.resources
                    .iter()
                    .filter(|r| !r.name.contains('/'))
                    .map(move |r| qualified_name(&r.name, group))
            })
            .collect::<BTreeSet<String>>();
        debug!(count = names.len(), "discovered resource types");
        Ok(names.into_iter().collect())
    }

    async fn resolve_identity(&self) -> Result<String, DiscoveryError> {
        let api: Api<SelfSubjectReview> = Api::all(self.client.clone());
        let review = api
            .create(&PostParams::default(), &SelfSubjectReview::default())
            .await
            .map_err(|e| DiscoveryError::classify(CLUSTER_ACCESS, e))?;
        review
            .status
            .and_then(|s| s.user_info)
            .and_then(|u| u.username)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DiscoveryError::Unclassified {
                context: CLUSTER_ACCESS,
                detail: "self subject review did not name a user".to_string(),
            })
    }

    async fn resolve_current_namespace(&self) -> Result<String, DiscoveryError> {
        if self.default_namespace.is_empty() {
            return Err(DiscoveryError::MisconfiguredEnvironment {
                detail: "no namespace set in the current context".to_string(),
            });
        }
        Ok(self.default_namespace.clone())
    }

    async fn list_namespaces(&self) -> Result<Vec<String>, DiscoveryError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespaces = api
            .list(&ListParams::default())
            .await
            .map_err(|e| DiscoveryError::classify(NAMESPACE_LISTING, e))?;
        Ok(namespaces.items.iter().map(|ns| ns.name_any()).collect())
    }
}

/// A [Scope] after preflight, with the current namespace looked up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedScope {
    Namespace(String),
    AllNamespaces,
    Cluster,
}

/// Outcome of the discovery steps that precede any probe.
#[derive(Clone, Debug)]
pub struct Preflight {
    pub identity: String,
    pub scope: ResolvedScope,
    pub request: ScanRequest,
}

/// Gather everything a scan needs.
///
/// The resource catalog and the all-namespaces listing are fatal; identity
/// and current namespace fall back to placeholders.
pub async fn preflight(
    topology: &dyn ClusterTopology,
    scope: &Scope,
) -> Result<Preflight, DiscoveryError> {
    let resources: Vec<String> = topology
        .list_resource_types()
        .await?
        .into_iter()
        .filter(|r| !r.is_empty())
        .collect();
    if resources.is_empty() {
        return Err(DiscoveryError::Unclassified {
            context: CLUSTER_ACCESS,
            detail: "the cluster reported no resource types".to_string(),
        });
    }

    let (identity, targets) =
        futures::join!(resolve_identity(topology), target_namespaces(topology, scope));
    let (scope, namespaces) = targets?;

    let request = ScanRequest::new(namespaces, resources).map_err(|e| {
        DiscoveryError::Unclassified {
            context: NAMESPACE_LISTING,
            detail: e.to_string(),
        }
    })?;
    info!(
        identity = %identity,
        namespaces = request.namespaces().len(),
        resources = request.resources().len(),
        "preflight complete"
    );
    Ok(Preflight {
        identity,
        scope,
        request,
    })
}

async fn resolve_identity(topology: &dyn ClusterTopology) -> String {
    match topology.resolve_identity().await {
        Ok(identity) => identity,
        Err(e) => {
            debug!(error = %e, "could not resolve identity");
            constants::FALLBACK_IDENTITY.to_string()
        }
    }
}

async fn target_namespaces(
    topology: &dyn ClusterTopology,
    scope: &Scope,
) -> Result<(ResolvedScope, Vec<Option<String>>), DiscoveryError> {
    match scope {
        Scope::Namespace(name) => Ok((
            ResolvedScope::Namespace(name.clone()),
            vec![Some(name.clone())],
        )),
        Scope::Cluster => Ok((ResolvedScope::Cluster, vec![None])),
        Scope::Current => {
            let name = match topology.resolve_current_namespace().await {
                Ok(name) => name,
                Err(e) => {
                    warn!(error = %e, "could not resolve current namespace, using {}", constants::FALLBACK_NAMESPACE);
                    constants::FALLBACK_NAMESPACE.to_string()
                }
            };
            Ok((ResolvedScope::Namespace(name.clone()), vec![Some(name)]))
        }
        Scope::AllNamespaces => {
            let namespaces = topology.list_namespaces().await?;
            if namespaces.is_empty() {
                return Err(DiscoveryError::Unclassified {
                    context: NAMESPACE_LISTING,
                    detail: "the cluster reported no namespaces".to_string(),
                });
            }
            Ok((
                ResolvedScope::AllNamespaces,
                namespaces.into_iter().map(Some).collect(),
            ))
        }
    }
}
