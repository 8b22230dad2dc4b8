//! Provider address sources feeding the batch geocoder.

pub mod beeline;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::info;

use crate::batch::read_records;
use crate::config::BeelineConfig;
use crate::models::AddressRecord;

pub use beeline::{BeelineApi, BeelineHouse, BeelineSource, BeelineStreet};

/// Builds the free-text address sent to the geocoder.
#[derive(Debug, Clone)]
pub struct AddressFormatter {
    city_prefix: String,
    strip_prefixes: Vec<String>,
}

impl AddressFormatter {
    pub fn new(city_prefix: &str, strip_prefixes: Vec<String>) -> Self {
        Self {
            city_prefix: city_prefix.to_string(),
            strip_prefixes,
        }
    }

    pub fn from_config(config: &BeelineConfig) -> Self {
        Self::new(&config.city_prefix, config.strip_prefixes.clone())
    }

    /// `"{city}{street}, {house}{sub_house}"`, with any city prefix already in
    /// the street name removed first.
    pub fn format(&self, street_name: &str, house: &str, sub_house: Option<&str>) -> String {
        let street = self
            .strip_prefixes
            .iter()
            .find_map(|prefix| street_name.strip_prefix(prefix.as_str()))
            .unwrap_or(street_name);

        match sub_house.map(str::trim).filter(|s| !s.is_empty()) {
            Some(sub) => format!("{}{}, {}{}", self.city_prefix, street, house, sub),
            None => format!("{}{}, {}", self.city_prefix, street, house),
        }
    }
}

/// Load an already prepared address table for `provider`.
///
/// Rows without a `full_address` get one from `formatter`.
pub fn load_prepared(
    path: &Path,
    provider: &str,
    formatter: &AddressFormatter,
) -> Result<Vec<AddressRecord>> {
    let mut records = read_records(path)?;
    for record in &mut records {
        record.provider = provider.to_string();
        if record.full_address.trim().is_empty() {
            record.full_address =
                formatter.format(&record.street_name, &record.house, record.sub_house.as_deref());
        }
    }
    info!("Loaded {} {} addresses from {}", records.len(), provider, path.display());
    Ok(records)
}

pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("Saved {} rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_strips_known_prefixes() {
        let formatter = AddressFormatter::from_config(&BeelineConfig::default());

        assert_eq!(
            formatter.format("г.Алматы, Абая", "1", None),
            "Алматы г., Абая, 1"
        );
        assert_eq!(
            formatter.format("Алматы г, Абая", "1", Some("Б")),
            "Алматы г., Абая, 1Б"
        );
        assert_eq!(formatter.format("Абая", "1", Some(" ")), "Алматы г., Абая, 1");
    }

    #[test]
    fn test_load_prepared_fills_address_and_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telecom.csv");
        std::fs::write(
            &path,
            "street_id,street_name,house,sub_house,is_available\n5,Абая,10,,1\n6,Сатпаева,3,а,0\n",
        )
        .unwrap();

        let formatter = AddressFormatter::new("Алматы г., ", Vec::new());
        let records = load_prepared(&path, "telecom", &formatter).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].full_address, "Алматы г., Абая, 10");
        assert_eq!(records[1].full_address, "Алматы г., Сатпаева, 3а");
        assert!(records[0].is_available);
        assert!(records.iter().all(|r| r.provider == "telecom"));
    }

    #[test]
    fn test_raw_tables_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("houses.csv");
        let houses = vec![BeelineHouse {
            street_id: Some(3),
            house: "14".into(),
            building: Some("к1".into()),
            avail_status: Some(1),
        }];

        write_table(&path, &houses).unwrap();
        let back: Vec<BeelineHouse> = read_table(&path).unwrap();
        assert_eq!(back, houses);
    }
}
