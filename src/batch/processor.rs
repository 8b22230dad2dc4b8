//! Resumable, rate-limited geocoding of an ordered record list.

use anyhow::Result;
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::checkpoint::{validate, ProgressStore};
use crate::geocoding::GeocodingClient;
use crate::models::AddressRecord;
use crate::pacing::RateLimiter;

/// Cooperative stop request, checked between records.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Mark a stop request; returns whether one was already pending.
    pub fn signal(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    /// Trigger on Ctrl-C. A request in flight still completes first; a
    /// second Ctrl-C exits the process immediately with status 130.
    pub fn listen_for_ctrl_c(&self) {
        let flag = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if flag.signal() {
                    warn!("Second interrupt received, exiting without saving");
                    std::process::exit(130);
                }
                warn!("Interrupt received, stopping after the current record...");
            }
        });
    }
}

#[derive(Debug)]
pub struct BatchOutcome {
    /// Results in input order; shorter than the input only when interrupted
    pub records: Vec<AddressRecord>,
    /// Index the run started at (0 for a fresh run)
    pub resumed_from: usize,
    pub completed: bool,
}

impl BatchOutcome {
    pub fn geocoded(&self) -> usize {
        self.records.iter().filter(|r| r.has_coordinates()).count()
    }
}

/// Drives records through the geocoder, checkpointing every `batch_size`.
pub struct BatchProcessor<'a, P> {
    geocoder: &'a GeocodingClient,
    store: P,
    batch_size: usize,
    min_interval: Duration,
    interrupt: Interrupt,
    progress: ProgressBar,
}

impl<'a, P: ProgressStore> BatchProcessor<'a, P> {
    pub fn new(
        geocoder: &'a GeocodingClient,
        store: P,
        batch_size: usize,
        min_interval: Duration,
    ) -> Self {
        Self {
            geocoder,
            store,
            batch_size,
            min_interval,
            interrupt: Interrupt::new(),
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    /// Geocode `input`, resuming after the latest checkpoint if there is one.
    pub async fn run(&self, input: &[AddressRecord]) -> Result<BatchOutcome> {
        let total = input.len();

        let mut results = match self.store.load_latest()? {
            Some(checkpoint) => {
                validate(&checkpoint, total)?;
                if checkpoint.records.len() != checkpoint.processed_count {
                    warn!(
                        "Checkpoint is labelled {} but holds {} records; resuming after the records",
                        checkpoint.processed_count,
                        checkpoint.records.len()
                    );
                }
                info!(
                    "Found checkpoint with {} records, resuming from index {}",
                    checkpoint.records.len(),
                    checkpoint.records.len()
                );
                checkpoint.records
            }
            None => Vec::with_capacity(total),
        };

        let start = results.len();
        let mut last_saved = start;
        let mut limiter = RateLimiter::new(self.min_interval);
        let clock = self.geocoder.clock().clone();

        self.progress.set_length(total as u64);
        self.progress.set_position(start as u64);

        for (index, source) in input.iter().enumerate().skip(start) {
            if self.interrupt.is_triggered() {
                warn!("Process interrupted. Saving current progress...");
                let persist_checkpoint = results.len() > last_saved;
                self.flush(&results, persist_checkpoint)?;
                return Ok(BatchOutcome {
                    records: results,
                    resumed_from: start,
                    completed: false,
                });
            }

            limiter.acquire(clock.as_ref()).await;

            let mut record = source.clone();
            debug!("Processing {}/{}: {}", index + 1, total, record.full_address);
            record.apply_geocode(self.geocoder.geocode(&record.full_address).await.ok());
            results.push(record);
            self.progress.inc(1);

            if self.batch_size > 0 && (results.len() - start) % self.batch_size == 0 {
                if let Err(e) = self.store.save_checkpoint(results.len(), &results) {
                    error!("Failed to save checkpoint: {:#}", e);
                    let _ = self.flush(&results, false);
                    return Err(e);
                }
                last_saved = results.len();
            }
        }

        self.progress.finish();
        self.store.write_output(&results)?;

        let outcome = BatchOutcome {
            records: results,
            resumed_from: start,
            completed: true,
        };
        info!(
            "Number of entries with coordinates: {} out of {}",
            outcome.geocoded(),
            outcome.records.len()
        );
        Ok(outcome)
    }

    /// Best-effort write of everything accumulated so far.
    fn flush(&self, results: &[AddressRecord], with_checkpoint: bool) -> Result<()> {
        if results.is_empty() {
            return Ok(());
        }

        let mut failure = None;
        if with_checkpoint {
            if let Err(e) = self.store.save_checkpoint(results.len(), results) {
                error!("Failed to save checkpoint during flush: {:#}", e);
                failure = Some(e);
            }
        }
        if let Err(e) = self.store.write_output(results) {
            error!("Failed to flush results: {:#}", e);
            failure.get_or_insert(e);
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
