//! Geocoder payload and best-match extraction.

use serde::Deserialize;

use crate::error::GeocodeError;
use crate::models::GeocodeResult;

/// The provider answers either `{items: [...]}` or `{result: {items: [...]}}`.
#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    result: Option<ResultBody>,
    #[serde(default)]
    items: Option<Vec<GeocodeItem>>,
}

#[derive(Debug, Deserialize)]
struct ResultBody {
    #[serde(default)]
    items: Vec<GeocodeItem>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeItem {
    #[serde(default)]
    pub point: Option<GeoPoint>,
    #[serde(default, alias = "fullName")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeocodeResponse {
    fn into_items(self) -> Vec<GeocodeItem> {
        match (self.result, self.items) {
            (Some(result), _) => result.items,
            (None, Some(items)) => items,
            (None, None) => Vec::new(),
        }
    }
}

/// Parse a successful body and keep only the first item.
pub fn extract_best_match(body: &str) -> Result<GeocodeResult, GeocodeError> {
    if body.trim().is_empty() {
        return Err(GeocodeError::Decode("empty body".to_string()));
    }

    let response: GeocodeResponse =
        serde_json::from_str(body).map_err(|e| GeocodeError::Decode(e.to_string()))?;

    let item = response
        .into_items()
        .into_iter()
        .next()
        .ok_or(GeocodeError::NoMatch)?;

    Ok(GeocodeResult {
        latitude: item.point.map(|p| p.lat),
        longitude: item.point.map(|p| p.lon),
        resolved_name: item.full_name.filter(|n| !n.is_empty()),
    })
}
