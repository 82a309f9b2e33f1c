use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;

use crate::models::{Candidate, Inventory, ServerRecord};

/// Source of region and VM inventory
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn servers(&self) -> Result<Vec<ServerRecord>>;
    async fn regions(&self) -> Result<Vec<String>>;
    async fn inventory(&self, region: &str) -> Result<Inventory>;
}

/// Inventory collaborator reached over HTTP
pub struct HttpInventory {
    base_url: String,
    client: Client,
}

impl HttpInventory {
    /// A zero `timeout_secs` disables the request timeout
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            client: build_client(timeout_secs)?,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn inventory_url(&self, region: &str) -> Result<Url> {
        let mut url = Url::parse(&self.api_url("/inventory"))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Invalid inventory URL: {}", self.base_url))?
            .push(region);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Inventory API error {}: {}", status, body));
        }

        Ok(resp.json().await?)
    }
}

#[async_trait]
impl InventorySource for HttpInventory {
    async fn servers(&self) -> Result<Vec<ServerRecord>> {
        self.get_json(Url::parse(&self.api_url("/servers"))?).await
    }

    async fn regions(&self) -> Result<Vec<String>> {
        self.get_json(Url::parse(&self.api_url("/regions"))?).await
    }

    async fn inventory(&self, region: &str) -> Result<Inventory> {
        let mut inventory: Inventory = self.get_json(self.inventory_url(region)?).await?;
        if inventory.region.is_empty() {
            inventory.region = region.to_string();
        }
        Ok(inventory)
    }
}

/// HTTP client shared by the remote collaborators
pub fn build_client(timeout_secs: u64) -> Result<Client> {
    let mut builder = Client::builder();
    if timeout_secs > 0 {
        builder = builder.timeout(Duration::from_secs(timeout_secs));
    }
    builder
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))
}

/// Candidate list of a region plus an advisory when the lookup failed
#[derive(Debug, Clone, Default)]
pub struct CandidateFetch {
    pub candidates: Vec<Candidate>,
    pub advisory: Option<String>,
}

/// Fetch assignable VMs for `region`.
/// A failed lookup yields an empty list and an advisory instead of an error.
pub async fn fetch_candidates(source: &dyn InventorySource, region: &str) -> CandidateFetch {
    if region.is_empty() {
        return CandidateFetch {
            candidates: Vec::new(),
            advisory: Some("No region selected".to_string()),
        };
    }
    match source.inventory(region).await {
        Ok(inventory) => {
            let candidates = inventory.candidates();
            tracing::debug!(
                "Region '{}': {} VMs, {} candidates",
                region,
                inventory.vms.len(),
                candidates.len()
            );
            CandidateFetch {
                candidates,
                advisory: None,
            }
        }
        Err(e) => {
            tracing::warn!("Failed to load inventory for region '{}': {}", region, e);
            CandidateFetch {
                candidates: Vec::new(),
                advisory: Some(format!("Failed to load VMs for region {}: {}", region, e)),
            }
        }
    }
}

/// First region reported by the collaborator, if any
pub async fn first_region(source: &dyn InventorySource) -> Option<String> {
    match source.regions().await {
        Ok(regions) => regions.into_iter().find(|r| !r.is_empty()),
        Err(e) => {
            tracing::warn!("Failed to load regions: {}", e);
            None
        }
    }
}
