//! Addressable units (street + house) and geocoding results.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A leaf-level address from one provider.
///
/// Created from the provider's raw tables, updated once by the geocoding
/// stage and kept even when geocoding fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressRecord {
    #[serde(default, deserialize_with = "integral_id")]
    pub street_id: Option<i64>,
    pub street_name: String,
    pub house: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub sub_house: Option<String>,
    #[serde(with = "flag")]
    pub is_available: bool,
    #[serde(default)]
    pub full_address: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Display name returned by the geocoder for the best match
    #[serde(default, rename = "gis_full_name", deserialize_with = "blank_as_none")]
    pub resolved_name: Option<String>,
    #[serde(default)]
    pub provider: String,
}

impl AddressRecord {
    pub fn new(
        street_id: Option<i64>,
        street_name: &str,
        house: &str,
        sub_house: Option<&str>,
        is_available: bool,
        provider: &str,
    ) -> Self {
        Self {
            street_id,
            street_name: street_name.to_string(),
            house: house.to_string(),
            sub_house: sub_house
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            is_available,
            full_address: String::new(),
            latitude: None,
            longitude: None,
            resolved_name: None,
            provider: provider.to_string(),
        }
    }

    /// Record the outcome of the geocoding stage.
    pub fn apply_geocode(&mut self, result: Option<GeocodeResult>) {
        let result = result.unwrap_or_default();
        self.latitude = result.latitude;
        self.longitude = result.longitude;
        self.resolved_name = result.resolved_name;
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

/// Best match for one address. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeocodeResult {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub resolved_name: Option<String>,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Ids written as floats by spreadsheet tooling ("5.0") are accepted when integral.
fn integral_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(id) = raw.parse::<i64>() {
        return Ok(Some(id));
    }
    match raw.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => Ok(Some(value as i64)),
        _ => Err(serde::de::Error::custom(format!("invalid street id: {}", raw))),
    }
}

/// Availability is stored as 0/1 in the tabular outputs.
mod flag {
    use super::*;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "1.0" | "true" => Ok(true),
            "" | "0" | "0.0" | "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid availability flag: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_sub_house_is_none() {
        let record = AddressRecord::new(Some(1), "Abay ave", "12", Some("  "), true, "beeline");
        assert_eq!(record.sub_house, None);
    }

    #[test]
    fn test_failed_geocode_clears_fields() {
        let mut record = AddressRecord::new(Some(1), "Abay ave", "12", None, true, "beeline");
        record.apply_geocode(None);
        assert!(!record.has_coordinates());

        record.apply_geocode(Some(GeocodeResult {
            latitude: Some(43.2),
            longitude: Some(76.9),
            resolved_name: Some("Almaty, Abay ave 12".into()),
        }));
        assert!(record.has_coordinates());
    }

    #[test]
    fn test_csv_round_trip_keeps_nulls() {
        let mut record = AddressRecord::new(Some(7), "Satpaev st", "5", Some("a"), false, "beeline");
        record.full_address = "Almaty, Satpaev st, 5a".into();

        let mut writer = csv::Writer::from_writer(vec![]);
        writer.serialize(&record).unwrap();
        let data = writer.into_inner().unwrap();

        let text = String::from_utf8(data.clone()).unwrap();
        assert!(text.lines().nth(1).unwrap().contains(",0,"));

        let mut reader = csv::Reader::from_reader(data.as_slice());
        let parsed: AddressRecord = reader.deserialize().next().unwrap().unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.latitude, None);
        assert_eq!(parsed.resolved_name, None);
    }

    #[test]
    fn test_float_street_id_is_accepted() {
        let data = "street_id,street_name,house,sub_house,is_available\n5.0,Abay,10,,1.0\n,Satpaev,3,,0\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let records: Vec<AddressRecord> = reader.deserialize().map(|r| r.unwrap()).collect();

        assert_eq!(records[0].street_id, Some(5));
        assert!(records[0].is_available);
        assert_eq!(records[1].street_id, None);

        let mut reader = csv::Reader::from_reader("street_id,street_name,house,is_available\n5.5,Abay,10,1\n".as_bytes());
        assert!(reader.deserialize::<AddressRecord>().next().unwrap().is_err());
    }
}
