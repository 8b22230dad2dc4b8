//! Hierarchical location records produced by the telecom crawler.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator used when building a node's `full_address` from its ancestors.
pub const ADDRESS_SEPARATOR: &str = ", ";

/// Separator used for the path column of the hierarchical export.
pub const PATH_SEPARATOR: &str = " > ";

/// Level of a node in the fixed four-level tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Region,
    District,
    Town,
    Street,
}

impl NodeType {
    /// The level directly below this one, `None` for streets.
    pub fn child(&self) -> Option<NodeType> {
        match self {
            NodeType::Region => Some(NodeType::District),
            NodeType::District => Some(NodeType::Town),
            NodeType::Town => Some(NodeType::Street),
            NodeType::Street => None,
        }
    }

    /// Depth below the root level (regions are 0)
    pub fn depth(&self) -> usize {
        match self {
            NodeType::Region => 0,
            NodeType::District => 1,
            NodeType::Town => 2,
            NodeType::Street => 3,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Region => write!(f, "region"),
            NodeType::District => write!(f, "district"),
            NodeType::Town => write!(f, "town"),
            NodeType::Street => write!(f, "street"),
        }
    }
}

/// Identifier as issued by the upstream provider.
///
/// Upstream listings use integers today, but nothing in the API contract
/// promises that, so text ids are accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NativeId {
    Int(i64),
    Text(String),
}

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeId::Int(id) => write!(f, "{}", id),
            NativeId::Text(id) => write!(f, "{}", id),
        }
    }
}

/// One node of the crawled region → district → town → street tree.
///
/// Nodes are created once during traversal. Only `coord_x`/`coord_y` are
/// filled in afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationNode {
    /// Synthetic id, assigned in pre-order starting at 1
    pub id: u64,

    /// Id of the parent node, `None` only for regions
    pub parent_id: Option<u64>,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    pub name: String,

    /// Provider-native identifier
    pub original_id: Option<NativeId>,

    /// Ancestor names including this node, joined with [`ADDRESS_SEPARATOR`]
    pub full_address: String,

    /// Longitude, set by the optional geocoding pass
    #[serde(rename = "coordX")]
    pub coord_x: Option<f64>,

    /// Latitude, set by the optional geocoding pass
    #[serde(rename = "coordY")]
    pub coord_y: Option<f64>,
}

impl LocationNode {
    /// Build a node below `parent` (or a root when `parent` is `None`).
    pub fn new(
        id: u64,
        parent: Option<&LocationNode>,
        node_type: NodeType,
        name: &str,
        original_id: Option<NativeId>,
    ) -> Self {
        let full_address = match parent {
            Some(p) => format!("{}{}{}", p.full_address, ADDRESS_SEPARATOR, name),
            None => name.to_string(),
        };

        Self {
            id,
            parent_id: parent.map(|p| p.id),
            node_type,
            name: name.to_string(),
            original_id,
            full_address,
            coord_x: None,
            coord_y: None,
        }
    }
}
