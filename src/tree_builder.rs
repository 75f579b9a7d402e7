use crate::tree_model::TreeModel;

/// Build pretty tree-style labels in **O(n)**, one per model node.
///
/// Relies on the model being in pre-order: when a node is reached, the
/// "is last child" flags of all its ancestors are already on the stack.
pub fn build_tree_labels(model: &TreeModel) -> Vec<String> {
    let mut labels = Vec::with_capacity(model.len());
    // ancestor_is_last[d] is true if the ancestor at depth d is the last child of its parent,
    // which decides between "│  " and "   " for the rows below it.
    let mut ancestor_is_last: Vec<bool> = Vec::new();

    for (idx, node) in model.nodes().iter().enumerate() {
        ancestor_is_last.truncate(node.depth);

        let mut prefix = String::new();
        for &last in &ancestor_is_last {
            prefix.push_str(if last { "   " } else { "│  " });
        }
        let is_last = model.is_last_child(idx);
        prefix.push_str(if is_last { "└─ " } else { "├─ " });

        let label = if node.is_dir() {
            format!("{}{}/", prefix, node.name)
        } else {
            format!("{}{}", prefix, node.name)
        };
        labels.push(label);
        ancestor_is_last.push(is_last);
    }
    labels
}
