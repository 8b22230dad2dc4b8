//! Checkpointed batch geocoding.

mod checkpoint;
mod processor;

pub use checkpoint::{read_records, write_records, Checkpoint, CsvProgressStore, ProgressStore};
pub use processor::{BatchOutcome, BatchProcessor, Interrupt};
