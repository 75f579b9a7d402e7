use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir", alias = "directory")]
    Directory,
}

/// One node of the tree data handed to us at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn file(path: impl Into<String>, name: impl Into<String>) -> Self {
        TreeNode {
            path: path.into(),
            name: name.into(),
            kind: NodeKind::File,
            children: Vec::new(),
        }
    }

    pub fn dir(path: impl Into<String>, name: impl Into<String>, children: Vec<TreeNode>) -> Self {
        TreeNode {
            path: path.into(),
            name: name.into(),
            kind: NodeKind::Directory,
            children,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlatNode {
    pub path: String,
    pub name: String,
    pub kind: NodeKind,
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// One past the last index of this node's subtree.
    pub subtree_end: usize,
}

impl FlatNode {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Read-only tree, flattened in pre-order. Index order is traversal order,
/// so every subtree occupies the contiguous range `idx..subtree_end`.
#[derive(Debug, Clone, Default)]
pub struct TreeModel {
    nodes: Vec<FlatNode>,
    roots: Vec<usize>,
    index: HashMap<String, usize>,
}

impl TreeModel {
    pub fn build(root_children: Vec<TreeNode>) -> Self {
        let mut model = TreeModel::default();
        for node in root_children {
            let idx = model.push_subtree(node, None, 0);
            model.roots.push(idx);
        }
        model
    }

    fn push_subtree(&mut self, node: TreeNode, parent: Option<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        // Paths are expected to be unique; on a clash the first node wins the lookup.
        self.index.entry(node.path.clone()).or_insert(idx);
        self.nodes.push(FlatNode {
            path: node.path,
            name: node.name,
            kind: node.kind,
            depth,
            parent,
            children: Vec::new(),
            subtree_end: idx + 1,
        });

        if node.kind == NodeKind::Directory {
            for child in node.children {
                let child_idx = self.push_subtree(child, Some(idx), depth + 1);
                self.nodes[idx].children.push(child_idx);
            }
        }
        self.nodes[idx].subtree_end = self.nodes.len();
        idx
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> Option<&FlatNode> {
        self.nodes.get(idx)
    }

    pub fn nodes(&self) -> &[FlatNode] {
        &self.nodes
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn index_of(&self, path: &str) -> Option<usize> {
        self.index.get(path).copied()
    }

    pub fn leaf_index(&self, path: &str) -> Option<usize> {
        self.index_of(path).filter(|&idx| self.nodes[idx].kind == NodeKind::File)
    }

    pub fn is_leaf(&self, path: &str) -> bool {
        self.leaf_index(path).is_some()
    }

    /// Every file below `idx`, at any depth, in traversal order.
    pub fn descendant_leaves(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let range = match self.nodes.get(idx) {
            Some(node) if node.is_dir() => idx + 1..node.subtree_end,
            _ => 0..0,
        };
        range.filter(move |&i| self.nodes[i].kind == NodeKind::File)
    }

    pub fn leaves(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.nodes.len()).filter(move |&i| self.nodes[i].kind == NodeKind::File)
    }

    pub fn is_last_child(&self, idx: usize) -> bool {
        let siblings = match self.nodes.get(idx).and_then(|n| n.parent) {
            Some(parent) => &self.nodes[parent].children,
            None => &self.roots,
        };
        siblings.last() == Some(&idx)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// src/{a.txt, b.txt, nested/{c.txt}}, empty/, README.md
    pub(crate) fn sample_tree() -> TreeModel {
        TreeModel::build(vec![
            TreeNode::dir(
                "src",
                "src",
                vec![
                    TreeNode::file("src/a.txt", "a.txt"),
                    TreeNode::file("src/b.txt", "b.txt"),
                    TreeNode::dir(
                        "src/nested",
                        "nested",
                        vec![TreeNode::file("src/nested/c.txt", "c.txt")],
                    ),
                ],
            ),
            TreeNode::dir("empty", "empty", vec![]),
            TreeNode::file("README.md", "README.md"),
        ])
    }

    #[test]
    fn build_flattens_in_preorder() {
        let model = sample_tree();
        let paths: Vec<&str> = model.nodes().iter().map(|n| n.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "src",
                "src/a.txt",
                "src/b.txt",
                "src/nested",
                "src/nested/c.txt",
                "empty",
                "README.md"
            ]
        );
        assert_eq!(model.roots(), &[0, 5, 6]);
        assert_eq!(model.node(4).map(|n| n.depth), Some(2));
        assert_eq!(model.node(3).and_then(|n| n.parent), Some(0));
    }

    #[test]
    fn descendant_leaves_cover_all_depths() {
        let model = sample_tree();
        let src = model.index_of("src").unwrap();
        let leaves: Vec<&str> = model
            .descendant_leaves(src)
            .map(|i| model.node(i).unwrap().path.as_str())
            .collect();
        assert_eq!(leaves, vec!["src/a.txt", "src/b.txt", "src/nested/c.txt"]);

        let empty = model.index_of("empty").unwrap();
        assert_eq!(model.descendant_leaves(empty).count(), 0);

        let readme = model.index_of("README.md").unwrap();
        assert_eq!(model.descendant_leaves(readme).count(), 0);
    }

    #[test]
    fn leaf_lookup_rejects_directories_and_unknown_paths() {
        let model = sample_tree();
        assert!(model.is_leaf("src/a.txt"));
        assert!(!model.is_leaf("src"));
        assert!(!model.is_leaf("missing"));
    }

    #[test]
    fn last_child_detection() {
        let model = sample_tree();
        assert!(model.is_last_child(model.index_of("README.md").unwrap()));
        assert!(!model.is_last_child(model.index_of("src").unwrap()));
        assert!(model.is_last_child(model.index_of("src/nested").unwrap()));
        assert!(!model.is_last_child(model.index_of("src/a.txt").unwrap()));
    }

    #[test]
    fn tree_json_uses_dir_and_file_tags() {
        let json = r#"[{"path":"src","name":"src","type":"dir","children":[
            {"path":"src/a.txt","name":"a.txt","type":"file"}]},
            {"path":"docs","name":"docs","type":"directory"}]"#;
        let nodes: Vec<TreeNode> = serde_json::from_str(json).unwrap();
        let model = TreeModel::build(nodes);
        assert_eq!(model.len(), 3);
        assert!(model.node(2).unwrap().is_dir());
        assert!(model.is_leaf("src/a.txt"));
    }
}
