use kube::config::AuthInfo;
use kube::Client;
use serde_json::json;
use tracing::debug;

use crate::config::Config;
use crate::error::{DiscoveryError, CLUSTER_ACCESS};

/// Build a client from the ambient kubeconfig or in-cluster environment,
/// applying the credential overrides from `config`.
///
/// Returns the client together with the namespace its configuration points
/// at.
pub async fn connect(config: &Config) -> Result<(Client, String), DiscoveryError> {
    let mut kube_config = kube::Config::infer().await?;
    apply_overrides(&mut kube_config, config)?;

    let default_namespace = kube_config.default_namespace.clone();
    let client =
        Client::try_from(kube_config).map_err(|e| DiscoveryError::classify(CLUSTER_ACCESS, e))?;
    Ok((client, default_namespace))
}

fn apply_overrides(kube_config: &mut kube::Config, config: &Config) -> Result<(), DiscoveryError> {
    if let Some(token) = &config.token {
        debug!("using bearer token from the command line");
        // Same shape as a kubeconfig user entry; replaces any configured
        // certificate, exec plugin or basic auth.
        let auth_info: AuthInfo = serde_json::from_value(json!({ "token": token }))
            .map_err(|e| DiscoveryError::MisconfiguredEnvironment {
                detail: e.to_string(),
            })?;
        kube_config.auth_info = auth_info;
    }
    if let Some(user) = &config.impersonate {
        debug!(user = %user, "impersonating");
        kube_config.auth_info.impersonate = Some(user.clone());
    }
    Ok(())
}
