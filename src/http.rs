//! Shared HTTP plumbing for the provider APIs.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::error::FetchError;

/// Build a client that identifies itself like a desktop browser.
pub fn browser_client(
    user_agent: &str,
    extra_headers: HeaderMap,
    timeout: Duration,
) -> anyhow::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.extend(extra_headers);

    let client = Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// GET `url` and decode a JSON body.
///
/// Non-2xx statuses and empty bodies are failures, not empty results.
pub async fn fetch_json<T: DeserializeOwned>(client: &Client, url: Url) -> Result<T, FetchError> {
    let url_text = url.to_string();

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| FetchError::Request {
            url: url_text.clone(),
            message: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url_text,
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(|e| FetchError::Request {
        url: url_text.clone(),
        message: e.to_string(),
    })?;

    if body.trim().is_empty() {
        return Err(FetchError::EmptyBody { url: url_text });
    }

    serde_json::from_str(&body).map_err(|source| FetchError::Decode {
        url: url_text,
        source,
    })
}

/// Join `segments` onto `base`, keeping any path the base already has.
pub fn endpoint(base: &str, segments: &[&str]) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(base.trim_end_matches('/'))?;
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}
