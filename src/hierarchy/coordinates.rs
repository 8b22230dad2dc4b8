//! Optional coordinate pass over crawled nodes.

use indicatif::ProgressBar;
use std::time::Duration;
use tracing::{info, warn};

use crate::geocoding::GeocodingClient;
use crate::models::LocationNode;
use crate::pacing::RateLimiter;

/// Geocode each node's `full_address` and fill `coord_x`/`coord_y`.
///
/// Failures leave both coordinates empty. Returns how many nodes were resolved.
pub async fn attach_coordinates(
    nodes: &mut [LocationNode],
    client: &GeocodingClient,
    min_interval: Duration,
    progress: &ProgressBar,
) -> usize {
    let mut limiter = RateLimiter::new(min_interval);
    let mut resolved = 0;

    info!("Getting coordinates for {} locations...", nodes.len());
    for node in nodes.iter_mut() {
        limiter.acquire(client.clock().as_ref()).await;

        match client.geocode(&node.full_address).await {
            Ok(result) => {
                node.coord_x = result.longitude;
                node.coord_y = result.latitude;
                if node.coord_x.is_some() && node.coord_y.is_some() {
                    resolved += 1;
                }
            }
            Err(e) => {
                warn!("No coordinates for '{}': {}", node.full_address, e);
                node.coord_x = None;
                node.coord_y = None;
            }
        }
        progress.inc(1);
    }

    info!("Resolved coordinates for {}/{} locations", resolved, nodes.len());
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::testing::{ScriptedTransport, MATCH};
    use crate::geocoding::RetryPolicy;
    use crate::models::NodeType;
    use crate::pacing::testing::ManualClock;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_attach_coordinates() {
        let north = LocationNode::new(1, None, NodeType::Region, "North", None);
        let east = LocationNode::new(2, Some(&north), NodeType::District, "East", None);
        let mut nodes = vec![north, east];

        let clock = Arc::new(ManualClock::new());
        let transport = ScriptedTransport::new().respond(200, MATCH).respond(404, "");
        let sent = transport.sent.clone();
        let client = GeocodingClient::new(Box::new(transport), clock.clone(), RetryPolicy::default());

        let resolved = attach_coordinates(
            &mut nodes,
            &client,
            Duration::from_millis(300),
            &ProgressBar::hidden(),
        )
        .await;

        assert_eq!(resolved, 1);
        assert_eq!(nodes[0].coord_x, Some(76.889709));
        assert_eq!(nodes[0].coord_y, Some(43.238949));
        assert_eq!(nodes[1].coord_x, None);
        assert_eq!(*sent.lock().unwrap(), vec!["North", "North, East"]);
        assert_eq!(clock.sleeps(), vec![Duration::from_millis(300)]);
    }
}
