//! Child listings for each level of the telecom location tree.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::TelecomConfig;
use crate::error::FetchError;
use crate::http::{browser_client, endpoint, fetch_json};
use crate::models::NativeId;

/// One entry of an upstream child listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChildRef {
    #[serde(default)]
    pub id: Option<NativeId>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ChildRef {
    pub fn new(id: i64, name: &str) -> Self {
        Self {
            id: Some(NativeId::Int(id)),
            name: Some(name.to_string()),
        }
    }
}

/// The four listing operations the crawler walks.
#[async_trait]
pub trait HierarchySource: Send + Sync {
    async fn list_regions(&self) -> Result<Vec<ChildRef>, FetchError>;

    async fn list_districts(&self, region: &NativeId) -> Result<Vec<ChildRef>, FetchError>;

    async fn list_towns(&self, district: &NativeId) -> Result<Vec<ChildRef>, FetchError>;

    async fn list_streets(&self, town: &NativeId) -> Result<Vec<ChildRef>, FetchError>;
}

/// telecom.kz location API.
pub struct TelecomApi {
    client: Client,
    base_url: String,
}

impl TelecomApi {
    pub fn new(config: &TelecomConfig) -> anyhow::Result<Self> {
        // The API rejects requests that do not look like they come from its own site.
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_str(&config.referer)?);
        headers.insert(ORIGIN, HeaderValue::from_str(&config.origin)?);

        let client = browser_client(
            &config.user_agent,
            headers,
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, FetchError> {
        endpoint(&self.base_url, segments).map_err(|e| FetchError::Request {
            url: self.base_url.clone(),
            message: e.to_string(),
        })
    }

    pub fn districts_url(&self, region: &NativeId) -> Result<Url, FetchError> {
        let region = region.to_string();
        self.url(&["locations", "geo-state", &region, "geo-state-district"])
    }

    /// Towns take the district as a query parameter rather than a path segment.
    pub fn towns_url(&self, district: &NativeId) -> Result<Url, FetchError> {
        let mut url = self.url(&["locations", "town-states"])?;
        url.query_pairs_mut()
            .append_pair("geoStateDistrictId", &district.to_string());
        Ok(url)
    }

    pub fn streets_url(&self, town: &NativeId) -> Result<Url, FetchError> {
        let town = town.to_string();
        self.url(&["locations", "town-states", &town, "streets"])
    }

    async fn fetch(&self, url: Url) -> Result<Vec<ChildRef>, FetchError> {
        debug!("Fetching {}", url);
        fetch_json(&self.client, url).await
    }
}

#[async_trait]
impl HierarchySource for TelecomApi {
    async fn list_regions(&self) -> Result<Vec<ChildRef>, FetchError> {
        let url = self.url(&["locations", "geo-states"])?;
        self.fetch(url).await
    }

    async fn list_districts(&self, region: &NativeId) -> Result<Vec<ChildRef>, FetchError> {
        let url = self.districts_url(region)?;
        self.fetch(url).await
    }

    async fn list_towns(&self, district: &NativeId) -> Result<Vec<ChildRef>, FetchError> {
        let url = self.towns_url(district)?;
        self.fetch(url).await
    }

    async fn list_streets(&self, town: &NativeId) -> Result<Vec<ChildRef>, FetchError> {
        let url = self.streets_url(town)?;
        self.fetch(url).await
    }
}
