use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use tracing::{debug, info, warn};

use super::table::{
    CombinedDataset, CombinedRecord, ProviderTable, Schema, LATITUDE_COLUMN, LONGITUDE_COLUMN,
    PROVIDER_COLUMN,
};
use crate::config::MergeConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub input_rows: usize,
    pub missing_coordinates: usize,
    pub duplicates_dropped: usize,
    pub output_rows: usize,
}

/// Unions provider tables and keeps one row per rounded coordinate pair.
#[derive(Debug, Clone)]
pub struct DatasetMerger {
    priority: Vec<String>,
    precision: u32,
}

struct Candidate {
    rank: (usize, String),
    seq: usize,
    record: CombinedRecord,
}

impl DatasetMerger {
    pub fn new(priority: Vec<String>, precision: u32) -> Self {
        Self {
            priority,
            precision,
        }
    }

    pub fn from_config(config: &MergeConfig) -> Self {
        Self::new(config.provider_priority.clone(), config.precision)
    }

    /// Listed providers rank by position; the rest follow alphabetically.
    fn rank(&self, provider: &str) -> (usize, String) {
        match self.priority.iter().position(|p| p == provider) {
            Some(position) => (position, String::new()),
            None => (self.priority.len(), provider.to_string()),
        }
    }

    fn key(&self, latitude: f64, longitude: f64) -> (i64, i64) {
        let scale = 10f64.powi(self.precision as i32);
        ((latitude * scale).round() as i64, (longitude * scale).round() as i64)
    }

    pub fn merge(&self, tables: Vec<ProviderTable>) -> (CombinedDataset, MergeReport) {
        let mut schema = Schema::default();
        for table in &tables {
            for column in table.schema.columns() {
                schema.add(column);
            }
        }
        let latitude = schema.add(LATITUDE_COLUMN);
        let longitude = schema.add(LONGITUDE_COLUMN);
        let provider_column = schema.add(PROVIDER_COLUMN);

        let mut report = MergeReport::default();
        let mut kept: HashMap<(i64, i64), Candidate> = HashMap::new();
        let mut seq = 0;

        for table in tables {
            let remap: Vec<usize> = table
                .schema
                .columns()
                .iter()
                .map(|c| schema.add(c))
                .collect();
            debug!("Merging {} rows from {}", table.len(), table.provider);

            for row in table.rows {
                report.input_rows += 1;
                let mut cells = vec![None; schema.len()];
                for (from, cell) in row.into_iter().enumerate() {
                    if let Some(&to) = remap.get(from) {
                        cells[to] = cell;
                    }
                }

                let coordinates = parse_coordinate(&cells[latitude])
                    .zip(parse_coordinate(&cells[longitude]));
                let Some((lat, lon)) = coordinates else {
                    report.missing_coordinates += 1;
                    continue;
                };

                let provider = cells[provider_column]
                    .clone()
                    .unwrap_or_else(|| table.provider.clone());
                let candidate = Candidate {
                    rank: self.rank(&provider),
                    seq,
                    record: CombinedRecord { provider, cells },
                };
                seq += 1;

                match kept.entry(self.key(lat, lon)) {
                    Entry::Occupied(mut slot) => {
                        report.duplicates_dropped += 1;
                        if candidate.rank < slot.get().rank {
                            slot.insert(candidate);
                        }
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(candidate);
                    }
                }
            }
        }

        let mut winners: Vec<Candidate> = kept.into_values().collect();
        winners.sort_by(|a, b| (&a.rank, a.seq).cmp(&(&b.rank, b.seq)));

        let records: Vec<CombinedRecord> = winners.into_iter().map(|c| c.record).collect();
        report.output_rows = records.len();

        if report.missing_coordinates > 0 {
            warn!("Dropped {} rows without coordinates", report.missing_coordinates);
        }
        info!(
            "Merged {} rows into {} unique locations ({} duplicates dropped)",
            report.input_rows, report.output_rows, report.duplicates_dropped
        );

        (CombinedDataset { schema, records }, report)
    }
}

fn parse_coordinate(cell: &Option<String>) -> Option<f64> {
    cell.as_deref()
        .and_then(|c| c.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
