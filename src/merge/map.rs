//! Point list consumed by the coverage map front end.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use super::table::{CombinedDataset, CombinedRecord, LATITUDE_COLUMN, LONGITUDE_COLUMN};

pub const DEFAULT_PROVIDER: &str = "telecom";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HouseNumber {
    Number(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapPoint {
    pub street_id: Option<i64>,
    pub street_name: String,
    pub sub_house: String,
    pub is_available: u8,
    pub full_address: String,
    pub gis_full_name: String,
    pub provider: String,
    pub house: HouseNumber,
    pub latitude: f64,
    pub longitude: f64,
}

impl MapPoint {
    /// `None` when the record has no usable coordinates.
    pub fn from_record(dataset: &CombinedDataset, record: &CombinedRecord) -> Option<Self> {
        let text = |column: &str| dataset.get(record, column).unwrap_or_default().to_string();
        let number = |column: &str| {
            dataset
                .get(record, column)
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
        };

        let latitude = number(LATITUDE_COLUMN)?;
        let longitude = number(LONGITUDE_COLUMN)?;

        let house = match number("house").filter(|v| v.fract() == 0.0) {
            Some(v) => HouseNumber::Number(v as i64),
            None => HouseNumber::Text(text("house")),
        };
        let provider = dataset
            .get(record, "provider")
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROVIDER)
            .to_string();

        Some(Self {
            street_id: number("street_id").map(|v| v as i64),
            street_name: text("street_name"),
            sub_house: text("sub_house"),
            is_available: u8::from(number("is_available").is_some_and(|v| v != 0.0)),
            full_address: text("full_address"),
            gis_full_name: text("gis_full_name"),
            provider,
            house,
            latitude,
            longitude,
        })
    }
}

pub fn map_points(dataset: &CombinedDataset) -> Vec<MapPoint> {
    dataset
        .records
        .iter()
        .filter_map(|record| MapPoint::from_record(dataset, record))
        .collect()
}

/// Write the map points as a single JSON array; returns how many were written.
pub fn write_map_json(dataset: &CombinedDataset, path: &Path) -> Result<usize> {
    let points = map_points(dataset);
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &points)?;
    writer.flush()?;
    info!("Saved {} map points to {}", points.len(), path.display());
    Ok(points.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::table::Schema;

    fn dataset(columns: &[&str], rows: &[&[&str]]) -> CombinedDataset {
        CombinedDataset {
            schema: Schema::new(columns),
            records: rows
                .iter()
                .map(|row| CombinedRecord {
                    provider: String::new(),
                    cells: row
                        .iter()
                        .map(|v| Some(v.to_string()).filter(|v| !v.is_empty()))
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_point_json_shape() {
        let data = dataset(
            &[
                "street_id", "street_name", "house", "sub_house", "is_available",
                "full_address", "latitude", "longitude", "gis_full_name", "provider",
            ],
            &[&[
                "12.0", "Abay ave", "10", "a", "1", "Almaty, Abay ave, 10a", "43.2", "76.9", "",
                "beeline",
            ]],
        );

        let points = map_points(&data);
        let json = serde_json::to_value(&points[0]).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "streetId": 12,
                "streetName": "Abay ave",
                "subHouse": "a",
                "isAvailable": 1,
                "fullAddress": "Almaty, Abay ave, 10a",
                "gisFullName": "",
                "provider": "beeline",
                "house": 10,
                "latitude": 43.2,
                "longitude": 76.9
            })
        );
    }

    #[test]
    fn test_defaults_and_text_house() {
        let data = dataset(
            &["house", "latitude", "longitude"],
            &[&["7A", "43.1", "76.1"], &["8", "", "76.1"]],
        );

        let points = map_points(&data);

        assert_eq!(points.len(), 1);
        let point = &points[0];
        assert_eq!(point.house, HouseNumber::Text("7A".into()));
        assert_eq!(point.street_id, None);
        assert_eq!(point.is_available, 0);
        assert_eq!(point.provider, DEFAULT_PROVIDER);
        assert_eq!(point.street_name, "");
    }

    #[test]
    fn test_write_map_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");
        let data = dataset(&["house", "latitude", "longitude"], &[&["1", "1.5", "2.5"]]);

        assert_eq!(write_map_json(&data, &path).unwrap(), 1);

        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed[0]["house"], 1);
        assert_eq!(parsed[0]["streetId"], serde_json::Value::Null);
    }
}
