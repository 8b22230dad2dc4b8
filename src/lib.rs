//! Coverage harvest - collects FTTH connectable addresses from provider
//! APIs, geocodes them and merges the results into one map dataset.
//!
//! This library provides shared types and modules for the crawl, harvest and
//! combine binaries.

pub mod batch;
pub mod config;
pub mod error;
pub mod geocoding;
pub mod hierarchy;
pub mod http;
pub mod merge;
pub mod models;
pub mod pacing;
pub mod providers;

pub use models::{AddressRecord, GeocodeResult, LocationNode, NodeType};
