use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::SelfSubjectAccessReview;
use kube::api::PostParams;
use kube::{Api, Client};
use serde_json::json;
use tracing::trace;

use crate::error::ProbeError;
use crate::types::Coordinate;

/// Answers a single allow/deny question.
#[async_trait]
pub trait AuthorizationOracle: Send + Sync {
    async fn can_perform(&self, coordinate: &Coordinate) -> Result<bool, ProbeError>;
}

/// Asks the API server through `SelfSubjectAccessReview`.
///
/// The credential (and impersonation, if any) lives in the client, so every
/// review is evaluated for the identity the client was built with.
pub struct KubeOracle {
    client: Client,
}

impl KubeOracle {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Split a catalog name like `deployments.apps` into `(resource, group)`.
/// Core resources have an empty group.
pub fn split_resource_name(name: &str) -> (&str, &str) {
    name.split_once('.').unwrap_or((name, ""))
}

fn access_review(coordinate: &Coordinate) -> Result<SelfSubjectAccessReview, serde_json::Error> {
    let (resource, group) = split_resource_name(&coordinate.resource);
    serde_json::from_value(json!({
        "apiVersion": "authorization.k8s.io/v1",
        "kind": "SelfSubjectAccessReview",
        "metadata": {},
        "spec": {
            "resourceAttributes": {
              "group": group,
              "resource": resource,
              "namespace": coordinate.namespace,
              "verb": coordinate.verb,
            },
        }
    }))
}

#[async_trait]
impl AuthorizationOracle for KubeOracle {
    async fn can_perform(&self, coordinate: &Coordinate) -> Result<bool, ProbeError> {
        let review = access_review(coordinate)?;
        let api: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
        let answered = api.create(&PostParams::default(), &review).await?;
        let status = answered.status.ok_or(ProbeError::EmptyStatus)?;
        trace!(%coordinate, allowed = status.allowed, "access review answered");
        Ok(status.allowed)
    }
}
