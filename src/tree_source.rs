use crate::file_scanner;
use crate::tree_model::TreeNode;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Where the tree comes from. Read once at startup and again after a
/// successful repository update.
#[derive(Debug, Clone)]
pub enum TreeSource {
    Json(PathBuf),
    Scan { root: PathBuf, include_ignored: bool },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TreeDocument {
    Children(Vec<TreeNode>),
    Root(TreeNode),
}

impl TreeSource {
    /// The root's children, in display order.
    pub fn load(&self) -> Result<Vec<TreeNode>> {
        match self {
            TreeSource::Json(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading tree data from {}", path.display()))?;
                parse_tree_json(&raw)
                    .with_context(|| format!("parsing tree data in {}", path.display()))
            }
            TreeSource::Scan {
                root,
                include_ignored,
            } => file_scanner::scan_tree(root, *include_ignored),
        }
    }
}

/// Accepts either the list of top-level nodes or a single root node.
pub fn parse_tree_json(raw: &str) -> Result<Vec<TreeNode>> {
    let doc: TreeDocument = serde_json::from_str(raw)?;
    Ok(match doc {
        TreeDocument::Children(children) => children,
        TreeDocument::Root(root) => root.children,
    })
}
