//! Core data models for the coverage harvester.

pub mod address;
pub mod location;

pub use address::{AddressRecord, GeocodeResult};
pub use location::{LocationNode, NativeId, NodeType, ADDRESS_SEPARATOR, PATH_SEPARATOR};
