//! Durable progress for the geocoding batch driver.
//!
//! Precondition: a single run owns a checkpoint namespace at a time. Two
//! processes sharing one directory and prefix will overwrite each other.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::AddressRecord;

/// Records processed so far, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub processed_count: usize,
    pub records: Vec<AddressRecord>,
}

/// Persistence collaborator of the batch driver.
pub trait ProgressStore {
    /// Persist the first `processed_count` results as a new checkpoint.
    fn save_checkpoint(&self, processed_count: usize, records: &[AddressRecord]) -> Result<()>;

    /// The checkpoint with the highest processed count, if any.
    fn load_latest(&self) -> Result<Option<Checkpoint>>;

    /// Write the final (or best-effort flushed) result set.
    fn write_output(&self, records: &[AddressRecord]) -> Result<()>;
}

impl<T: ProgressStore + ?Sized> ProgressStore for std::sync::Arc<T> {
    fn save_checkpoint(&self, processed_count: usize, records: &[AddressRecord]) -> Result<()> {
        (**self).save_checkpoint(processed_count, records)
    }

    fn load_latest(&self) -> Result<Option<Checkpoint>> {
        (**self).load_latest()
    }

    fn write_output(&self, records: &[AddressRecord]) -> Result<()> {
        (**self).write_output(records)
    }
}

/// Checkpoints as `{dir}/{prefix}{count}.csv`, final output as one more CSV.
pub struct CsvProgressStore {
    dir: PathBuf,
    prefix: String,
    output: PathBuf,
    pattern: Regex,
}

impl CsvProgressStore {
    pub fn new(dir: impl Into<PathBuf>, prefix: &str, output: impl Into<PathBuf>) -> Result<Self> {
        let pattern = Regex::new(&format!(r"^{}(\d+)\.csv$", regex::escape(prefix)))?;
        Ok(Self {
            dir: dir.into(),
            prefix: prefix.to_string(),
            output: output.into(),
            pattern,
        })
    }

    pub fn checkpoint_path(&self, processed_count: usize) -> PathBuf {
        self.dir
            .join(format!("{}{}.csv", self.prefix, processed_count))
    }

    /// Highest-numbered checkpoint file in the directory.
    fn latest_path(&self) -> Result<Option<(usize, PathBuf)>> {
        if !self.dir.exists() {
            return Ok(None);
        }

        let mut latest: Option<(usize, PathBuf)> = None;
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list {}", self.dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(count) = self
                .pattern
                .captures(name)
                .and_then(|c| c[1].parse::<usize>().ok())
            else {
                continue;
            };
            if latest.as_ref().map_or(true, |(best, _)| count > *best) {
                latest = Some((count, entry.path()));
            }
        }
        Ok(latest)
    }
}

impl ProgressStore for CsvProgressStore {
    fn save_checkpoint(&self, processed_count: usize, records: &[AddressRecord]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.checkpoint_path(processed_count);
        write_records(&path, records)?;
        info!(
            "Saved intermediate results to {} ({} processed)",
            path.display(),
            processed_count
        );
        Ok(())
    }

    fn load_latest(&self) -> Result<Option<Checkpoint>> {
        let Some((processed_count, path)) = self.latest_path()? else {
            return Ok(None);
        };
        debug!("Loading checkpoint {}", path.display());
        let records = read_records(&path)?;
        Ok(Some(Checkpoint {
            processed_count,
            records,
        }))
    }

    fn write_output(&self, records: &[AddressRecord]) -> Result<()> {
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        write_records(&self.output, records)?;
        info!("Saved {} records to {}", records.len(), self.output.display());
        Ok(())
    }
}

pub fn write_records(path: &Path, records: &[AddressRecord]) -> Result<()> {
    // Write to a sibling file first so a crash never leaves a truncated table behind.
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("Failed to move {} into place", tmp.display()))?;
    Ok(())
}

pub fn read_records(path: &Path) -> Result<Vec<AddressRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (line, row) in reader.deserialize().enumerate() {
        let record: AddressRecord =
            row.with_context(|| format!("Bad row {} in {}", line + 1, path.display()))?;
        records.push(record);
    }
    Ok(records)
}

/// Checks that a loaded checkpoint fits an input of `total` records.
pub fn validate(checkpoint: &Checkpoint, total: usize) -> Result<()> {
    if checkpoint.records.len() > total {
        bail!(
            "checkpoint holds {} records but the input only has {}",
            checkpoint.records.len(),
            total
        );
    }
    Ok(())
}
