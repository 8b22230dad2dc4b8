//! Tabular, JSON and tree renderings of a crawl.

use anyhow::{Context, Result};
use hashbrown::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::models::{LocationNode, PATH_SEPARATOR};

/// Flat table, one row per node in creation order.
pub fn write_nodes_csv(nodes: &[LocationNode], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record([
        "id",
        "parent_id",
        "type",
        "name",
        "original_id",
        "full_address",
        "coord_x",
        "coord_y",
    ])?;

    for node in nodes {
        writer.write_record([
            node.id.to_string(),
            opt(node.parent_id),
            node.node_type.to_string(),
            node.name.clone(),
            opt(node.original_id.as_ref()),
            node.full_address.clone(),
            opt(node.coord_x),
            opt(node.coord_y),
        ])?;
    }

    writer.flush()?;
    info!("Wrote {} locations to {}", nodes.len(), path.display());
    Ok(())
}

pub fn write_nodes_json(nodes: &[LocationNode], path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, nodes)?;
    writer.flush()?;
    info!("Wrote {} locations to {}", nodes.len(), path.display());
    Ok(())
}

/// Table with a `path` column (ancestor names joined by " > "), rows in tree order.
pub fn write_hierarchy_csv(nodes: &[LocationNode], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record(["id", "original_id", "name", "path", "type", "parent_id"])?;

    for entry in tree_order(nodes) {
        let node = entry.node;
        writer.write_record([
            node.id.to_string(),
            opt(node.original_id.as_ref()),
            node.name.clone(),
            entry.path,
            node.node_type.to_string(),
            opt(node.parent_id),
        ])?;
    }

    writer.flush()?;
    info!("Wrote hierarchy to {}", path.display());
    Ok(())
}

/// Indented text tree, two spaces per level.
pub fn render_tree(nodes: &[LocationNode]) -> String {
    let mut out = String::new();
    for entry in tree_order(nodes) {
        let node = entry.node;
        out.push_str(&"  ".repeat(entry.depth));
        out.push_str(&format!("{} [{} #{}]\n", node.name, node.node_type, node.id));
    }
    out
}

pub fn write_tree(nodes: &[LocationNode], path: &Path) -> Result<()> {
    std::fs::write(path, render_tree(nodes))
        .with_context(|| format!("Failed to write {}", path.display()))
}

struct TreeEntry<'a> {
    node: &'a LocationNode,
    depth: usize,
    path: String,
}

/// Depth-first walk from the roots, children in input order.
fn tree_order(nodes: &[LocationNode]) -> Vec<TreeEntry<'_>> {
    let mut children: HashMap<Option<u64>, Vec<&LocationNode>> = HashMap::new();
    for node in nodes {
        children.entry(node.parent_id).or_default().push(node);
    }

    let mut out = Vec::with_capacity(nodes.len());
    let mut stack: Vec<(&LocationNode, usize, String)> = children
        .get(&None)
        .map(|roots| {
            roots
                .iter()
                .rev()
                .map(|n| (*n, 0, n.name.clone()))
                .collect()
        })
        .unwrap_or_default();

    while let Some((node, depth, path)) = stack.pop() {
        if let Some(kids) = children.get(&Some(node.id)) {
            for kid in kids.iter().rev() {
                let kid_path = format!("{}{}{}", path, PATH_SEPARATOR, kid.name);
                stack.push((*kid, depth + 1, kid_path));
            }
        }
        out.push(TreeEntry { node, depth, path });
    }

    out
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
