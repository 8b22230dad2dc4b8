//! Address → coordinate resolution.

mod client;
mod response;
mod transport;

pub use client::{GeocodingClient, RetryPolicy};
pub use response::extract_best_match;
pub use transport::{GeocodeTransport, HttpTransport, TransportResponse};

#[cfg(test)]
pub(crate) use client::testing;

use std::sync::Arc;

use crate::config::GeocodingConfig;
use crate::pacing::Clock;

/// Client talking to the configured HTTP endpoint.
pub fn http_client(config: &GeocodingConfig, clock: Arc<dyn Clock>) -> anyhow::Result<GeocodingClient> {
    let transport = HttpTransport::new(config)?;
    Ok(GeocodingClient::new(
        Box::new(transport),
        clock,
        RetryPolicy::from_config(config),
    ))
}
