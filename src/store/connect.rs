//! Cluster connection bootstrap.
//!
//! Builds a client from a named kubeconfig context, pointed at a caller-supplied API endpoint.

use crate::error::MigrateError;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::Path;
use tracing::info;

/// URL of the overriding API endpoint.
pub fn endpoint_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
        endpoint.to_string()
    } else {
        format!("https://{}:443", endpoint)
    }
}

/// Connect to `endpoint` using the credentials of `context` in `kubeconfig`.
///
/// TLS verification is disabled: the overriding endpoint does not present the cluster's
/// certificate.
pub async fn connect(
    kubeconfig: &Path,
    context: &str,
    endpoint: &str,
) -> Result<Client, MigrateError> {
    let kubeconfig_data = Kubeconfig::read_from(kubeconfig).map_err(|e| {
        MigrateError::Connection(format!(
            "failed to read kubeconfig {}: {}",
            kubeconfig.display(),
            e
        ))
    })?;

    let options = KubeConfigOptions {
        context: Some(context.to_string()),
        cluster: None,
        user: None,
    };
    let mut config = Config::from_custom_kubeconfig(kubeconfig_data, &options)
        .await
        .map_err(|e| {
            MigrateError::Connection(format!("failed to load context {}: {}", context, e))
        })?;

    let url = endpoint_url(endpoint);
    config.cluster_url = url
        .parse()
        .map_err(|e| MigrateError::Connection(format!("invalid endpoint {}: {}", url, e)))?;
    config.accept_invalid_certs = true;
    config.root_cert = None;

    info!(context, endpoint = %url, "connecting to api server");
    Client::try_from(config).map_err(|e| {
        MigrateError::Connection(format!("error while building the api client: {}", e))
    })
}
