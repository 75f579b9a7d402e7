use crate::tree_model::{NodeKind, TreeModel};
use std::collections::BTreeSet;

/// What a row's checkbox shows. Directories derive it from their leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    NotSelected,
    PartiallySelected,
    FullySelected,
}

type Listener = Box<dyn FnMut(&[String])>;

/// Owns the set of selected files. Only leaves are ever stored; directories
/// are bulk controls whose check state is computed on demand.
pub struct SelectionController {
    model: TreeModel,
    // Node indices; the model is pre-order so iteration is traversal order.
    selected: BTreeSet<usize>,
    listeners: Vec<Listener>,
}

impl SelectionController {
    pub fn new(model: TreeModel) -> Self {
        SelectionController {
            model,
            selected: BTreeSet::new(),
            listeners: Vec::new(),
        }
    }

    /// Swaps in a freshly loaded tree and starts over with nothing selected.
    /// Subscribers stay registered.
    pub fn reset(&mut self, model: TreeModel) {
        self.model = model;
        self.selected.clear();
        self.notify();
    }

    pub fn model(&self) -> &TreeModel {
        &self.model
    }

    /// Registers a callback that receives the new selection after every change.
    pub fn subscribe(&mut self, listener: impl FnMut(&[String]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.current_selection();
        for listener in self.listeners.iter_mut() {
            listener(&snapshot);
        }
    }

    pub fn toggle_leaf(&mut self, path: &str) {
        let Some(idx) = self.model.leaf_index(path) else {
            return;
        };
        if !self.selected.remove(&idx) {
            self.selected.insert(idx);
        }
        self.notify();
    }

    /// Cascades down only: every leaf under the directory gets the same value.
    /// Ancestors are never written, their state is simply recomputed.
    pub fn toggle_directory(&mut self, path: &str) {
        let Some(idx) = self.model.index_of(path) else {
            return;
        };
        if self.model.nodes()[idx].kind != NodeKind::Directory {
            return;
        }
        let leaves: Vec<usize> = self.model.descendant_leaves(idx).collect();
        if leaves.is_empty() {
            return;
        }

        let select_all = leaves.iter().any(|leaf| !self.selected.contains(leaf));
        for leaf in leaves {
            if select_all {
                self.selected.insert(leaf);
            } else {
                self.selected.remove(&leaf);
            }
        }
        self.notify();
    }

    pub fn toggle(&mut self, path: &str) {
        match self.model.index_of(path).map(|idx| self.model.nodes()[idx].kind) {
            Some(NodeKind::File) => self.toggle_leaf(path),
            Some(NodeKind::Directory) => self.toggle_directory(path),
            None => {}
        }
    }

    /// Clears the selection and selects the given paths that are still files
    /// in the tree. Anything else is dropped without complaint.
    pub fn replace_selection<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selected.clear();
        for path in paths {
            if let Some(idx) = self.model.leaf_index(path.as_ref()) {
                self.selected.insert(idx);
            }
        }
        self.notify();
    }

    pub fn clear(&mut self) {
        if self.selected.is_empty() {
            return;
        }
        self.selected.clear();
        self.notify();
    }

    pub fn current_selection(&self) -> Vec<String> {
        self.selected
            .iter()
            .map(|&idx| self.model.nodes()[idx].path.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.model
            .leaf_index(path)
            .is_some_and(|idx| self.selected.contains(&idx))
    }

    pub fn directory_state(&self, path: &str) -> Option<CheckState> {
        let idx = self.model.index_of(path)?;
        if self.model.nodes()[idx].kind != NodeKind::Directory {
            return None;
        }
        Some(self.check_state(idx))
    }

    /// Check state for any row, used by the renderer.
    pub fn check_state(&self, idx: usize) -> CheckState {
        let Some(node) = self.model.node(idx) else {
            return CheckState::NotSelected;
        };
        if !node.is_dir() {
            return if self.selected.contains(&idx) {
                CheckState::FullySelected
            } else {
                CheckState::NotSelected
            };
        }

        let (mut total, mut chosen) = (0usize, 0usize);
        for leaf in self.model.descendant_leaves(idx) {
            total += 1;
            if self.selected.contains(&leaf) {
                chosen += 1;
            }
        }
        if total > 0 && chosen == total {
            CheckState::FullySelected
        } else if chosen > 0 {
            CheckState::PartiallySelected
        } else {
            CheckState::NotSelected
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree_model::tests::sample_tree;
    use crate::tree_model::TreeNode;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn controller() -> SelectionController {
        SelectionController::new(sample_tree())
    }

    #[test]
    fn directory_toggle_round_trip_in_traversal_order() {
        let mut sel = SelectionController::new(TreeModel::build(vec![TreeNode::dir(
            "src",
            "src",
            vec![
                TreeNode::file("a.txt", "a.txt"),
                TreeNode::file("b.txt", "b.txt"),
            ],
        )]));
        sel.toggle_directory("src");
        assert_eq!(sel.current_selection(), vec!["a.txt", "b.txt"]);
        sel.toggle_directory("src");
        assert!(sel.current_selection().is_empty());
    }

    #[test]
    fn directory_toggle_cascades_to_every_depth_and_nothing_else() {
        let mut sel = controller();
        sel.toggle_leaf("README.md");
        sel.toggle_directory("src");
        assert_eq!(
            sel.current_selection(),
            vec!["src/a.txt", "src/b.txt", "src/nested/c.txt", "README.md"]
        );
        sel.toggle_directory("src");
        assert_eq!(sel.current_selection(), vec!["README.md"]);
    }

    #[test]
    fn mixed_directory_toggles_to_select_all() {
        let mut sel = controller();
        sel.toggle_leaf("src/b.txt");
        assert_eq!(sel.directory_state("src"), Some(CheckState::PartiallySelected));
        sel.toggle_directory("src");
        assert_eq!(sel.directory_state("src"), Some(CheckState::FullySelected));
        assert_eq!(sel.len(), 3);
    }

    #[test]
    fn leaf_toggle_touches_only_that_leaf() {
        let mut sel = controller();
        sel.toggle_leaf("src/nested/c.txt");
        assert_eq!(sel.current_selection(), vec!["src/nested/c.txt"]);
        assert_eq!(sel.directory_state("src/nested"), Some(CheckState::FullySelected));
        assert_eq!(sel.directory_state("src"), Some(CheckState::PartiallySelected));
        sel.toggle_leaf("src/nested/c.txt");
        assert!(sel.is_empty());
        assert_eq!(sel.directory_state("src"), Some(CheckState::NotSelected));
    }

    #[test]
    fn directories_never_enter_the_selection() {
        let mut sel = controller();
        sel.toggle_leaf("src");
        sel.toggle_directory("src/nested");
        sel.toggle("src");
        sel.replace_selection(["src", "src/nested", "src/a.txt"]);
        let model = sel.model().clone();
        assert!(sel.current_selection().iter().all(|p| model.is_leaf(p)));
        assert_eq!(sel.current_selection(), vec!["src/a.txt"]);
    }

    #[test]
    fn empty_directory_and_unknown_paths_are_no_ops() {
        let mut sel = controller();
        let calls = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&calls);
        sel.subscribe(move |_| *counter.borrow_mut() += 1);

        sel.toggle_directory("empty");
        sel.toggle_leaf("missing.txt");
        sel.toggle("nope");
        sel.toggle_directory("README.md");
        assert!(sel.is_empty());
        assert_eq!(*calls.borrow(), 0);
        assert_eq!(sel.directory_state("empty"), Some(CheckState::NotSelected));
    }

    #[test]
    fn replace_selection_drops_missing_paths() {
        let mut sel = controller();
        sel.toggle_directory("src");
        sel.replace_selection(["README.md", "missing"]);
        assert_eq!(sel.current_selection(), vec!["README.md"]);
    }

    #[test]
    fn snapshot_is_in_traversal_order_not_insertion_order() {
        let mut sel = controller();
        sel.toggle_leaf("README.md");
        sel.toggle_leaf("src/b.txt");
        sel.toggle_leaf("src/a.txt");
        assert_eq!(
            sel.current_selection(),
            vec!["src/a.txt", "src/b.txt", "README.md"]
        );
    }

    #[test]
    fn listeners_receive_each_new_snapshot() {
        let mut sel = controller();
        let seen: Rc<RefCell<Vec<Vec<String>>>> = Rc::default();
        let sink = Rc::clone(&seen);
        sel.subscribe(move |snapshot| sink.borrow_mut().push(snapshot.to_vec()));

        sel.toggle_leaf("src/a.txt");
        sel.replace_selection(["README.md"]);
        sel.clear();
        sel.clear();

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], vec!["src/a.txt"]);
        assert_eq!(seen[1], vec!["README.md"]);
        assert!(seen[2].is_empty());
    }

    #[test]
    fn reset_discards_selection_but_keeps_subscribers() {
        let mut sel = controller();
        let seen: Rc<RefCell<Vec<usize>>> = Rc::default();
        let sink = Rc::clone(&seen);
        sel.subscribe(move |snapshot| sink.borrow_mut().push(snapshot.len()));
        sel.toggle_directory("src");
        sel.reset(TreeModel::build(vec![TreeNode::file("new.rs", "new.rs")]));
        assert!(sel.is_empty());
        assert!(!sel.model().is_leaf("src/a.txt"));
        sel.toggle_leaf("new.rs");
        assert_eq!(*seen.borrow(), vec![3, 0, 1]);
    }

    #[test]
    fn leaf_check_state_reflects_membership() {
        let mut sel = controller();
        let a = sel.model().index_of("src/a.txt").unwrap();
        assert_eq!(sel.check_state(a), CheckState::NotSelected);
        sel.toggle("src/a.txt");
        assert_eq!(sel.check_state(a), CheckState::FullySelected);
        assert!(sel.is_selected("src/a.txt"));
        assert_eq!(sel.directory_state("src/a.txt"), None);
    }
}
