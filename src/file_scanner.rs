use crate::tree_model::{NodeKind, TreeNode};
use anyhow::Result;
use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Walks `root` and returns its children as tree nodes, files before folders
/// at every level. Anything named `.git*` is left out.
pub fn scan_tree(root: &Path, include_ignored: bool) -> Result<Vec<TreeNode>> {
    let mut walker = WalkBuilder::new(root);
    walker.hidden(false).filter_entry(|entry| {
        !entry.file_name().to_string_lossy().starts_with(".git")
    });
    if include_ignored {
        walker.git_ignore(false).ignore(false);
    }

    let mut by_parent: HashMap<PathBuf, Vec<(PathBuf, bool)>> = HashMap::new();
    for result in walker.build() {
        let dirent = match result {
            Ok(v) => v,
            Err(e) => {
                eprintln!("⚠️  Warning during scan: {}", e);
                continue;
            }
        };

        let path = dirent.path();
        let Ok(rel) = path.strip_prefix(root) else {
            continue;
        };
        if rel.as_os_str().is_empty() {
            continue;
        }
        let is_dir = dirent.file_type().is_some_and(|t| t.is_dir());
        let parent = rel.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        by_parent
            .entry(parent)
            .or_default()
            .push((rel.to_path_buf(), is_dir));
    }

    Ok(assemble(Path::new(""), &mut by_parent))
}

fn assemble(
    parent: &Path,
    by_parent: &mut HashMap<PathBuf, Vec<(PathBuf, bool)>>,
) -> Vec<TreeNode> {
    let mut entries = by_parent.remove(parent).unwrap_or_default();
    entries.sort_by_key(|(rel, is_dir)| (*is_dir, display_name(rel).to_lowercase()));

    entries
        .into_iter()
        .map(|(rel, is_dir)| {
            let children = if is_dir {
                assemble(&rel, by_parent)
            } else {
                Vec::new()
            };
            TreeNode {
                path: slash_path(&rel),
                name: display_name(&rel),
                kind: if is_dir {
                    NodeKind::Directory
                } else {
                    NodeKind::File
                },
                children,
            }
        })
        .collect()
}

fn display_name(rel: &Path) -> String {
    rel.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Relative path with `/` separators on every platform.
fn slash_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
