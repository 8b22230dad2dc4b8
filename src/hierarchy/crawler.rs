//! Pre-order crawl of the region → district → town → street tree.
//!
//! A failed or empty listing only removes the subtree below that parent;
//! the rest of the traversal carries on.

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::source::{ChildRef, HierarchySource};
use crate::config::TelecomConfig;
use crate::error::FetchError;
use crate::models::{LocationNode, NativeId, NodeType};
use crate::pacing::Clock;

/// Courtesy pause taken after finishing each node's subtree, per level.
#[derive(Debug, Clone)]
pub struct CrawlDelays {
    pub region: Duration,
    pub district: Duration,
    pub town: Duration,
}

impl CrawlDelays {
    pub fn from_config(config: &TelecomConfig) -> Self {
        Self {
            region: Duration::from_millis(config.region_delay_ms),
            district: Duration::from_millis(config.district_delay_ms),
            town: Duration::from_millis(config.town_delay_ms),
        }
    }

    pub fn none() -> Self {
        Self {
            region: Duration::ZERO,
            district: Duration::ZERO,
            town: Duration::ZERO,
        }
    }

    fn after(&self, level: NodeType) -> Duration {
        match level {
            NodeType::Region => self.region,
            NodeType::District => self.district,
            NodeType::Town => self.town,
            NodeType::Street => Duration::ZERO,
        }
    }
}

/// A listing that could not be obtained; nothing below `parent_id` was crawled.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtreeGap {
    /// Level of the children that were requested
    pub level: NodeType,
    /// `None` when the root listing itself failed
    pub parent_id: Option<u64>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct CrawlReport {
    /// All nodes in creation (pre-order) order
    pub nodes: Vec<LocationNode>,
    pub gaps: Vec<SubtreeGap>,
}

impl CrawlReport {
    pub fn count(&self, level: NodeType) -> usize {
        self.nodes.iter().filter(|n| n.node_type == level).count()
    }
}

/// Traversal state threaded through the crawl.
struct CrawlState {
    next_id: u64,
    nodes: Vec<LocationNode>,
    gaps: Vec<SubtreeGap>,
}

impl CrawlState {
    fn new() -> Self {
        Self {
            next_id: 1,
            nodes: Vec::new(),
            gaps: Vec::new(),
        }
    }

    fn push(
        &mut self,
        parent: Option<&LocationNode>,
        level: NodeType,
        name: &str,
        original_id: Option<NativeId>,
    ) -> LocationNode {
        let node = LocationNode::new(self.next_id, parent, level, name, original_id);
        self.next_id += 1;
        self.nodes.push(node.clone());
        node
    }

    fn gap(&mut self, level: NodeType, parent_id: Option<u64>, reason: String) {
        self.gaps.push(SubtreeGap {
            level,
            parent_id,
            reason,
        });
    }

    fn finish(self) -> CrawlReport {
        CrawlReport {
            nodes: self.nodes,
            gaps: self.gaps,
        }
    }
}

pub struct HierarchyCrawler<S> {
    source: S,
    clock: Arc<dyn Clock>,
    delays: CrawlDelays,
}

impl<S: HierarchySource> HierarchyCrawler<S> {
    pub fn new(source: S, clock: Arc<dyn Clock>, delays: CrawlDelays) -> Self {
        Self {
            source,
            clock,
            delays,
        }
    }

    /// Walk every reachable node. Never fails; unreachable subtrees are
    /// reported in [`CrawlReport::gaps`].
    pub async fn crawl(&self) -> CrawlReport {
        let mut state = CrawlState::new();

        info!("Fetching regions...");
        let regions = match self.source.list_regions().await {
            Ok(regions) if regions.is_empty() => {
                error!("Region listing is empty");
                state.gap(NodeType::Region, None, "empty listing".to_string());
                return state.finish();
            }
            Ok(regions) => regions,
            Err(e) => {
                error!("Failed to fetch regions: {}", e);
                state.gap(NodeType::Region, None, e.to_string());
                return state.finish();
            }
        };
        info!("Found {} regions", regions.len());

        for region in regions {
            self.visit(&mut state, None, NodeType::Region, region).await;
        }

        let report = state.finish();
        info!(
            "Collected {} locations ({} subtrees unavailable)",
            report.nodes.len(),
            report.gaps.len()
        );
        report
    }

    fn visit<'a>(
        &'a self,
        state: &'a mut CrawlState,
        parent: Option<&'a LocationNode>,
        level: NodeType,
        child: ChildRef,
    ) -> BoxFuture<'a, ()> {
        async move {
            let name = match child.name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => {
                    debug!(
                        "Skipping unnamed {} under {:?}",
                        level,
                        parent.map(|p| p.id)
                    );
                    return;
                }
            };

            let node = state.push(parent, level, &name, child.id.clone());
            let Some(child_level) = level.child() else {
                return;
            };

            debug!(
                "{}Processing {}: {} (ID: {:?})",
                "  ".repeat(level.depth()),
                level,
                node.name,
                node.original_id
            );

            match &child.id {
                None => {
                    warn!("{} '{}' has no upstream id, skipping its subtree", level, name);
                    state.gap(child_level, Some(node.id), "missing upstream id".to_string());
                }
                Some(native_id) => match self.list(child_level, native_id).await {
                    Ok(children) if children.is_empty() => {
                        info!("No {}s found for {} {}", child_level, level, name);
                        state.gap(child_level, Some(node.id), "empty listing".to_string());
                    }
                    Ok(children) => {
                        debug!("Found {} {}s under {}", children.len(), child_level, name);
                        for grandchild in children {
                            self.visit(state, Some(&node), child_level, grandchild)
                                .await;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to list {}s for {} {}: {}", child_level, level, name, e);
                        state.gap(child_level, Some(node.id), e.to_string());
                    }
                },
            }

            self.clock.sleep(self.delays.after(level)).await;
        }
        .boxed()
    }

    async fn list(&self, level: NodeType, parent: &NativeId) -> Result<Vec<ChildRef>, FetchError> {
        match level {
            NodeType::Region => self.source.list_regions().await,
            NodeType::District => self.source.list_districts(parent).await,
            NodeType::Town => self.source.list_towns(parent).await,
            NodeType::Street => self.source.list_streets(parent).await,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{single_branch, FakeSource};
    use super::*;
    use crate::pacing::testing::ManualClock;
    use std::collections::HashMap;

    fn crawler(source: FakeSource) -> (HierarchyCrawler<FakeSource>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let delays = CrawlDelays::from_config(&TelecomConfig::default());
        (HierarchyCrawler::new(source, clock.clone(), delays), clock)
    }

    #[tokio::test]
    async fn test_single_branch() {
        let (crawler, _) = crawler(single_branch());
        let report = crawler.crawl().await;

        let summary: Vec<(u64, Option<u64>, NodeType, &str, &str)> = report
            .nodes
            .iter()
            .map(|n| (n.id, n.parent_id, n.node_type, n.name.as_str(), n.full_address.as_str()))
            .collect();

        assert_eq!(
            summary,
            vec![
                (1, None, NodeType::Region, "North", "North"),
                (2, Some(1), NodeType::District, "East", "North, East"),
                (3, Some(2), NodeType::Town, "Town1", "North, East, Town1"),
                (4, Some(3), NodeType::Street, "Main St", "North, East, Town1, Main St"),
            ]
        );
        assert_eq!(report.nodes[3].original_id, Some(NativeId::Int(40)));
        assert!(report.gaps.is_empty());
    }

    #[tokio::test]
    async fn test_empty_districts_leave_only_the_region() {
        let source = FakeSource {
            regions: Some(vec![ChildRef::new(10, "North"), ChildRef::new(11, "South")]),
            ..Default::default()
        }
        .with(NodeType::District, 11, vec![ChildRef::new(21, "West")]);

        let (crawler, _) = crawler(source);
        let report = crawler.crawl().await;

        let north: Vec<&LocationNode> = report
            .nodes
            .iter()
            .filter(|n| n.full_address.starts_with("North"))
            .collect();
        assert_eq!(north.len(), 1);
        assert_eq!(north[0].node_type, NodeType::Region);

        assert_eq!(report.count(NodeType::District), 1);
        assert!(report.gaps.contains(&SubtreeGap {
            level: NodeType::District,
            parent_id: Some(1),
            reason: "empty listing".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_failed_listing_skips_only_that_subtree() {
        let mut source = FakeSource {
            regions: Some(vec![ChildRef::new(10, "North")]),
            ..Default::default()
        }
        .with(
            NodeType::District,
            10,
            vec![ChildRef::new(20, "East"), ChildRef::new(21, "West")],
        )
        .with(NodeType::Town, 21, vec![ChildRef::new(31, "Town2")])
        .with(NodeType::Street, 31, vec![ChildRef::new(41, "Side St")]);
        source.failing.push((NodeType::Town, 20));

        let (crawler, _) = crawler(source);
        let report = crawler.crawl().await;

        let names: Vec<&str> = report.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["North", "East", "West", "Town2", "Side St"]);
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].parent_id, Some(2));
        assert!(report.gaps[0].reason.contains("500"));
    }

    #[tokio::test]
    async fn test_failed_root_listing() {
        let (crawler, clock) = crawler(FakeSource::default());
        let report = crawler.crawl().await;

        assert!(report.nodes.is_empty());
        assert_eq!(report.gaps.len(), 1);
        assert_eq!(report.gaps[0].parent_id, None);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_preorder() {
        let source = FakeSource {
            regions: Some(vec![ChildRef::new(10, "North"), ChildRef::new(11, "South")]),
            ..Default::default()
        }
        .with(
            NodeType::District,
            10,
            vec![ChildRef::new(20, "East"), ChildRef::new(21, "West")],
        )
        .with(NodeType::District, 11, vec![ChildRef::new(22, "Center")])
        .with(NodeType::Town, 20, vec![ChildRef::new(30, "A"), ChildRef::new(31, "B")])
        .with(NodeType::Town, 22, vec![ChildRef::new(32, "C")])
        .with(
            NodeType::Street,
            30,
            vec![ChildRef::new(40, "S1"), ChildRef::new(41, "S2")],
        )
        .with(NodeType::Street, 32, vec![ChildRef::new(42, "S3")]);

        let (crawler, _) = crawler(source);
        let report = crawler.crawl().await;
        let by_id: HashMap<u64, &LocationNode> = report.nodes.iter().map(|n| (n.id, n)).collect();

        assert_eq!(by_id.len(), report.nodes.len());
        for node in &report.nodes {
            let mut names = vec![node.name.as_str()];
            let mut cursor = node.parent_id;
            while let Some(parent_id) = cursor {
                let parent = by_id[&parent_id];
                assert!(parent.id < node.id);
                names.push(parent.name.as_str());
                cursor = parent.parent_id;
            }
            names.reverse();
            assert_eq!(node.full_address, names.join(", "));
        }
    }

    #[tokio::test]
    async fn test_courtesy_delays_per_level() {
        let (crawler, clock) = crawler(single_branch());
        crawler.crawl().await;

        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(500),
            ]
        );
    }

    #[tokio::test]
    async fn test_unnamed_children_are_skipped() {
        let source = FakeSource {
            regions: Some(vec![
                ChildRef {
                    id: Some(NativeId::Int(9)),
                    name: Some("  ".to_string()),
                },
                ChildRef::new(10, "North"),
            ]),
            ..Default::default()
        };

        let (crawler, _) = crawler(source);
        let report = crawler.crawl().await;

        assert_eq!(report.nodes.len(), 1);
        assert_eq!(report.nodes[0].id, 1);
    }
}
