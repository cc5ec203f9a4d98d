//! Compute service operations.

use crate::{Client, JsonRequest, Result};
use http::Method;
use serde::Deserialize;

const API_NETWORKS: &str = "os-networks";
const API_TENANT_NETWORKS: &str = "os-tenant-networks";

/// A labelled network range.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Network {
    /// UUID of the network.
    pub id: String,
    /// User-provided name for the network range.
    pub label: String,
    /// IP range covered by the network.
    #[serde(default)]
    pub cidr: Option<String>,
}

#[derive(Deserialize, Default)]
struct Networks {
    #[serde(default)]
    networks: Vec<Network>,
}

/// Access to the compute service of one tenant.
#[derive(Clone)]
pub struct Compute {
    client: Client,
}

impl Compute {
    /// Wraps a client that has a [`COMPUTE`](super::COMPUTE) endpoint registered.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Lists the networks visible to the tenant.
    pub async fn list_networks(&self) -> Result<Vec<Network>> {
        self.networks(API_NETWORKS)
            .await
            .map_err(|e| e.context("failed to get list of networks"))
    }

    /// Lists the networks owned by the tenant.
    pub async fn list_tenant_networks(&self) -> Result<Vec<Network>> {
        self.networks(API_TENANT_NETWORKS)
            .await
            .map_err(|e| e.context("failed to get list of tenant networks"))
    }

    async fn networks(&self, path: &str) -> Result<Vec<Network>> {
        let url = self.client.service_url(super::COMPUTE, path)?;
        let mut resp = Networks::default();
        self.client
            .json_request(Method::GET, &url, JsonRequest::new().response(&mut resp))
            .await?;
        Ok(resp.networks)
    }
}
