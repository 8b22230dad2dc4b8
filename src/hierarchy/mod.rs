//! Telecom location hierarchy: crawl, optional geocoding and exports.

mod coordinates;
mod crawler;
pub mod export;
mod source;

pub use coordinates::attach_coordinates;
pub use crawler::{CrawlDelays, CrawlReport, HierarchyCrawler, SubtreeGap};
pub use source::{ChildRef, HierarchySource, TelecomApi};
