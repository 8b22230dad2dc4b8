//! Combining provider datasets into one deduplicated coverage set.

pub mod map;
mod merger;
mod table;

pub use map::{write_map_json, MapPoint};
pub use merger::{DatasetMerger, MergeReport};
pub use table::{CombinedDataset, CombinedRecord, ProviderTable, Schema};
