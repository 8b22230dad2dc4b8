//! Error taxonomy for remote calls.
//!
//! None of these abort a run: the crawler turns a [`FetchError`] into a
//! skipped subtree and the batch driver turns a [`GeocodeError`] into a record
//! with null coordinates.

use thiserror::Error;

/// Failure to list children (or a provider table) from an upstream API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("empty response from {url}")]
    EmptyBody { url: String },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure to resolve one address.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The provider kept answering 429 after every permitted retry
    #[error("rate limit still in effect after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// Network failure or a non-429 error status; never retried
    #[error("geocoding request failed: {0}")]
    RequestFailed(String),

    #[error("no match for address")]
    NoMatch,

    #[error("malformed geocoding payload: {0}")]
    Decode(String),
}
