//! Beeline street/house listings and their conversion to address records.

use async_trait::async_trait;
use hashbrown::HashMap;
use indicatif::ProgressBar;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::AddressFormatter;
use crate::config::BeelineConfig;
use crate::error::FetchError;
use crate::http::{browser_client, endpoint, fetch_json};
use crate::models::AddressRecord;
use crate::pacing::Clock;

pub const PROVIDER: &str = "beeline";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeelineStreet {
    pub street_id: i64,
    #[serde(default)]
    pub name: String,
    /// Street kind spelled out, e.g. "улица" or "проспект"
    #[serde(default, deserialize_with = "loose_opt_string")]
    pub street_type_full: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeelineHouse {
    #[serde(default)]
    pub street_id: Option<i64>,
    #[serde(deserialize_with = "loose_string")]
    pub house: String,
    /// Building letter or block, appended to the house number
    #[serde(default, deserialize_with = "loose_opt_string")]
    pub building: Option<String>,
    #[serde(default)]
    pub avail_status: Option<i64>,
}

#[async_trait]
pub trait BeelineSource: Send + Sync {
    async fn fetch_streets(&self) -> Result<Vec<BeelineStreet>, FetchError>;

    /// Houses of one street, each tagged with `street_id`.
    async fn fetch_houses(&self, street_id: i64) -> Result<Vec<BeelineHouse>, FetchError>;
}

pub struct BeelineApi {
    client: Client,
    base_url: String,
    city_id: u32,
}

impl BeelineApi {
    pub fn new(config: &BeelineConfig) -> anyhow::Result<Self> {
        let client = browser_client(
            &config.user_agent,
            HeaderMap::new(),
            Duration::from_secs(config.timeout_secs),
        )?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            city_id: config.city_id,
        })
    }

    fn url(&self, resource: &str, params: &[(&str, String)]) -> Result<url::Url, FetchError> {
        let mut url = endpoint(&self.base_url, &[resource]).map_err(|e| FetchError::Request {
            url: self.base_url.clone(),
            message: e.to_string(),
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("cityId", &self.city_id.to_string());
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl BeelineSource for BeelineApi {
    async fn fetch_streets(&self) -> Result<Vec<BeelineStreet>, FetchError> {
        let url = self.url("streets", &[])?;
        fetch_json(&self.client, url).await
    }

    async fn fetch_houses(&self, street_id: i64) -> Result<Vec<BeelineHouse>, FetchError> {
        let url = self.url("houses", &[("streetId", street_id.to_string())])?;
        let mut houses: Vec<BeelineHouse> = fetch_json(&self.client, url).await?;
        for house in &mut houses {
            house.street_id = Some(street_id);
        }
        Ok(houses)
    }
}

/// Fetch houses for every street; a failing street contributes nothing.
pub async fn collect_all_houses<S: BeelineSource + ?Sized>(
    source: &S,
    streets: &[BeelineStreet],
    clock: &dyn Clock,
    delay: Duration,
    progress: &ProgressBar,
) -> Vec<BeelineHouse> {
    let mut all_houses = Vec::new();
    progress.set_length(streets.len() as u64);

    for (index, street) in streets.iter().enumerate() {
        debug!(
            "Processing street {}/{}: {} (ID: {})",
            index + 1,
            streets.len(),
            street.name,
            street.street_id
        );

        match source.fetch_houses(street.street_id).await {
            Ok(houses) => all_houses.extend(houses),
            Err(e) => warn!("Error fetching houses for street {}: {}", street.street_id, e),
        }
        progress.inc(1);

        clock.sleep(delay).await;
    }

    info!("Collected {} houses from {} streets", all_houses.len(), streets.len());
    all_houses
}

/// Join houses to their streets and build geocodable records.
pub fn prepare_records(
    houses: &[BeelineHouse],
    streets: &[BeelineStreet],
    formatter: &AddressFormatter,
) -> Vec<AddressRecord> {
    let by_id: HashMap<i64, &BeelineStreet> = streets.iter().map(|s| (s.street_id, s)).collect();
    let mut unmatched = 0;

    let records: Vec<AddressRecord> = houses
        .iter()
        .map(|house| {
            let street = house.street_id.and_then(|id| by_id.get(&id));
            let street_name = match street {
                Some(street) => full_street_name(street),
                None => {
                    unmatched += 1;
                    String::new()
                }
            };

            let mut record = AddressRecord::new(
                house.street_id,
                &street_name,
                &house.house,
                house.building.as_deref(),
                house.avail_status == Some(1),
                PROVIDER,
            );
            record.full_address =
                formatter.format(&record.street_name, &record.house, record.sub_house.as_deref());
            record
        })
        .collect();

    if unmatched > 0 {
        warn!("{} houses reference unknown streets", unmatched);
    }
    info!("Prepared {} addresses for geocoding", records.len());
    records
}

fn full_street_name(street: &BeelineStreet) -> String {
    match street.street_type_full.as_deref() {
        Some(kind) => format!("{} {}", kind, street.name),
        None => street.name.clone(),
    }
}

/// Upstream sends some fields as numbers and some as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    fn into_string(self) -> String {
        match self {
            Loose::Int(v) => v.to_string(),
            Loose::Float(v) if v.fract() == 0.0 => format!("{}", v as i64),
            Loose::Float(v) => v.to_string(),
            Loose::Text(v) => v,
        }
    }
}

fn loose_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<Loose>::deserialize(deserializer)?
        .map(Loose::into_string)
        .unwrap_or_default())
}

fn loose_opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Loose>::deserialize(deserializer)?
        .map(Loose::into_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BeelineConfig;
    use crate::pacing::testing::ManualClock;

    fn formatter() -> AddressFormatter {
        AddressFormatter::from_config(&BeelineConfig::default())
    }

    #[test]
    fn test_house_payload_shapes() {
        let houses: Vec<BeelineHouse> = serde_json::from_str(
            r#"[{"house": 12, "building": null, "avail_status": 1},
                {"house": "7A", "building": " 2 ", "avail_status": 0}]"#,
        )
        .unwrap();

        assert_eq!(houses[0].house, "12");
        assert_eq!(houses[0].building, None);
        assert_eq!(houses[1].house, "7A");
        assert_eq!(houses[1].building.as_deref(), Some("2"));
    }

    #[test]
    fn test_prepare_records_joins_streets() {
        let streets = vec![
            BeelineStreet {
                street_id: 1,
                name: "Абая".into(),
                street_type_full: Some("проспект".into()),
            },
            BeelineStreet {
                street_id: 2,
                name: "Алматы г., Сатпаева".into(),
                street_type_full: None,
            },
        ];
        let houses = vec![
            BeelineHouse {
                street_id: Some(1),
                house: "10".into(),
                building: Some("а".into()),
                avail_status: Some(1),
            },
            BeelineHouse {
                street_id: Some(2),
                house: "5".into(),
                building: None,
                avail_status: Some(2),
            },
            BeelineHouse {
                street_id: Some(99),
                house: "1".into(),
                building: None,
                avail_status: None,
            },
        ];

        let records = prepare_records(&houses, &streets, &formatter());

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].street_name, "проспект Абая");
        assert_eq!(records[0].full_address, "Алматы г., проспект Абая, 10а");
        assert!(records[0].is_available);
        assert_eq!(records[1].full_address, "Алматы г., Сатпаева, 5");
        assert!(!records[1].is_available);
        assert_eq!(records[2].street_name, "");
        assert!(records.iter().all(|r| r.provider == PROVIDER));
    }

    struct FlakySource;

    #[async_trait]
    impl BeelineSource for FlakySource {
        async fn fetch_streets(&self) -> Result<Vec<BeelineStreet>, FetchError> {
            Ok(Vec::new())
        }

        async fn fetch_houses(&self, street_id: i64) -> Result<Vec<BeelineHouse>, FetchError> {
            if street_id == 2 {
                return Err(FetchError::Status {
                    url: "fake://houses".into(),
                    status: 502,
                });
            }
            Ok(vec![BeelineHouse {
                street_id: Some(street_id),
                house: "1".into(),
                building: None,
                avail_status: Some(1),
            }])
        }
    }

    #[tokio::test]
    async fn test_collect_tolerates_failing_streets() {
        let streets: Vec<BeelineStreet> = (1..=3)
            .map(|id| BeelineStreet {
                street_id: id,
                name: format!("street {}", id),
                street_type_full: None,
            })
            .collect();
        let clock = ManualClock::new();

        let houses = collect_all_houses(
            &FlakySource,
            &streets,
            &clock,
            Duration::from_millis(500),
            &ProgressBar::hidden(),
        )
        .await;

        let ids: Vec<Option<i64>> = houses.iter().map(|h| h.street_id).collect();
        assert_eq!(ids, vec![Some(1), Some(3)]);
        assert_eq!(clock.sleeps().len(), 3);
    }

    #[test]
    fn test_urls() {
        let api = BeelineApi::new(&BeelineConfig::default()).unwrap();
        assert_eq!(
            api.url("houses", &[("streetId", "42".to_string())]).unwrap().as_str(),
            "https://beeline.kz/restservices/telco/houses?cityId=1&streetId=42"
        );
    }
}
