//! One raw geocoding request over HTTP.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

use crate::config::GeocodingConfig;
use crate::error::GeocodeError;

/// Status and body of a geocoding response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

#[async_trait]
pub trait GeocodeTransport: Send + Sync {
    /// Send one lookup. Network-level failures map to `RequestFailed`.
    async fn send(&self, address: &str) -> Result<TransportResponse, GeocodeError>;
}

/// reqwest-backed transport carrying the static API key.
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    api_key: String,
    fields: String,
}

impl HttpTransport {
    pub fn new(config: &GeocodingConfig) -> anyhow::Result<Self> {
        let endpoint = Url::parse(&config.endpoint)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            fields: config.fields.clone(),
        })
    }

    fn request_url(&self, address: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("q", address)
            .append_pair("fields", &self.fields)
            .append_pair("key", &self.api_key);
        url
    }
}

#[async_trait]
impl GeocodeTransport for HttpTransport {
    async fn send(&self, address: &str) -> Result<TransportResponse, GeocodeError> {
        let response = self
            .client
            .get(self.request_url(address))
            .send()
            .await
            .map_err(|e| GeocodeError::RequestFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| GeocodeError::RequestFailed(e.to_string()))?;

        Ok(TransportResponse { status, body })
    }
}
