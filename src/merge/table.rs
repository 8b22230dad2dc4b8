//! Provider tables with heterogeneous columns and their union.

use anyhow::{Context, Result};
use hashbrown::HashMap;
use std::path::Path;
use tracing::{info, warn};

pub const PROVIDER_COLUMN: &str = "provider";
pub const LATITUDE_COLUMN: &str = "latitude";
pub const LONGITUDE_COLUMN: &str = "longitude";

pub type Cell = Option<String>;

/// Ordered column names with a name → position index.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        let mut schema = Schema::default();
        for column in columns {
            schema.add(column.as_ref());
        }
        schema
    }

    /// Append `column` unless present; returns its position.
    pub fn add(&mut self, column: &str) -> usize {
        if let Some(&position) = self.index.get(column) {
            return position;
        }
        self.columns.push(column.to_string());
        self.index.insert(column.to_string(), self.columns.len() - 1);
        self.columns.len() - 1
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One provider's rows, every cell kept as text.
#[derive(Debug, Clone)]
pub struct ProviderTable {
    pub provider: String,
    pub schema: Schema,
    pub rows: Vec<Vec<Cell>>,
}

impl ProviderTable {
    pub fn new(provider: &str, schema: Schema, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Self {
            provider: provider.to_string(),
            schema,
            rows,
        };
        table.fill_provider();
        table
    }

    /// Read a CSV with whatever columns it has. Empty cells are nulls.
    pub fn read_csv(path: &Path, provider: &str) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let schema = Schema::new(&headers);

        // Target position per header; repeated names keep their first column.
        let mut seen = vec![false; schema.len()];
        let positions: Vec<Option<usize>> = headers
            .iter()
            .map(|header| {
                let position = schema.position(header)?;
                if std::mem::replace(&mut seen[position], true) {
                    warn!("Ignoring repeated column '{}' in {}", header, path.display());
                    return None;
                }
                Some(position)
            })
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.with_context(|| format!("Failed to read {}", path.display()))?;
            let mut row: Vec<Cell> = vec![None; schema.len()];
            for (cell, position) in record.iter().zip(&positions) {
                if let Some(position) = *position {
                    row[position] = Some(cell.to_string()).filter(|c| !c.is_empty());
                }
            }
            rows.push(row);
        }

        info!("Loaded {} records from {} ({})", rows.len(), provider, path.display());
        Ok(Self::new(provider, schema, rows))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Tag rows lacking a provider with this table's provider.
    fn fill_provider(&mut self) {
        let position = self.schema.add(PROVIDER_COLUMN);
        let provider = self.provider.clone();
        for row in &mut self.rows {
            row.resize(self.schema.len(), None);
            if row[position].is_none() {
                row[position] = Some(provider.clone());
            }
        }
    }
}

/// A row of the merged dataset, laid out by the dataset's schema.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRecord {
    pub provider: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default)]
pub struct CombinedDataset {
    pub schema: Schema,
    pub records: Vec<CombinedRecord>,
}

impl CombinedDataset {
    pub fn get<'a>(&self, record: &'a CombinedRecord, column: &str) -> Option<&'a str> {
        let position = self.schema.position(column)?;
        record.cells.get(position)?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if self.schema.is_empty() {
            warn!("Nothing to write to {}", path.display());
        }
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(self.schema.columns())?;
        for record in &self.records {
            writer.write_record(record.cells.iter().map(|c| c.as_deref().unwrap_or("")))?;
        }
        writer.flush()?;
        info!("Saved {} records to {}", self.records.len(), path.display());
        Ok(())
    }
}
