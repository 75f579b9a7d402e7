use super::app_state::{AppMode, Focus};
use crate::persistence::TOP_USED_LIMIT;
use crate::tree_builder;
use crate::update;
use crate::workflow::{self, Session};
use crossterm::event::{KeyCode, KeyEvent};
use std::cell::RefCell;
use std::rc::Rc;

pub struct TuiApp {
    pub(super) session: Session,
    pub(super) labels: Vec<String>,
    // Display-only; indexed like the tree model. Never touches the selection.
    pub(super) expanded: Vec<bool>,
    pub(super) current_selection_idx: usize,
    pub(super) scroll_offset: usize,
    pub(super) list_viewport_height: usize,
    pub(super) focus: Focus,
    pub(super) frequent_idx: usize,
    pub(super) group_idx: usize,
    pub(super) mode: AppMode,
    pub(super) group_name_input: String,
    pub(super) branch_input: String,
    /// Mirror of the selection, kept current by a selection subscriber.
    pub(super) chips: Rc<RefCell<Vec<String>>>,
    pub(super) status: Option<String>,
    pub(super) log_text: String,
    pub(super) quit: bool,
}

impl TuiApp {
    pub fn new(mut session: Session) -> Self {
        let chips = Rc::new(RefCell::new(session.selection.current_selection()));
        let sink = Rc::clone(&chips);
        session
            .selection
            .subscribe(move |snapshot| *sink.borrow_mut() = snapshot.to_vec());

        let mut app = TuiApp {
            session,
            labels: Vec::new(),
            expanded: Vec::new(),
            current_selection_idx: 0,
            scroll_offset: 0,
            list_viewport_height: 0, // Will be updated by ui_renderer
            focus: Focus::Tree,
            frequent_idx: 0,
            group_idx: 0,
            mode: AppMode::Normal,
            group_name_input: String::new(),
            branch_input: String::new(),
            chips,
            status: None,
            log_text: String::new(),
            quit: false,
        };
        app.rebuild_view();
        app
    }

    /// Fresh display state for the current tree: labels redrawn, every
    /// directory collapsed, cursor on the first row.
    fn rebuild_view(&mut self) {
        let model = self.session.selection.model();
        self.labels = tree_builder::build_tree_labels(model);
        self.expanded = vec![false; model.len()];
        self.current_selection_idx = 0;
        self.scroll_offset = 0;
        self.frequent_idx = 0;
        self.group_idx = 0;
    }

    pub(super) fn has_selection(&self) -> bool {
        !self.chips.borrow().is_empty()
    }

    pub(super) fn frequent_paths(&self) -> Vec<String> {
        self.session.store.top_used(TOP_USED_LIMIT)
    }

    // --- Tree navigation ---

    /// Rows whose ancestors are all expanded, in display order.
    pub(super) fn get_visible_item_indices(&self) -> Vec<usize> {
        let nodes = self.session.selection.model().nodes();
        let mut visible = Vec::new();
        let mut idx = 0;
        while idx < nodes.len() {
            visible.push(idx);
            let node = &nodes[idx];
            idx = if node.is_dir() && !self.expanded[idx] {
                node.subtree_end
            } else {
                idx + 1
            };
        }
        visible
    }

    fn is_item_visible(&self, item_idx: usize) -> bool {
        let model = self.session.selection.model();
        let mut parent = model.node(item_idx).and_then(|n| n.parent);
        while let Some(p) = parent {
            if !self.expanded[p] {
                return false;
            }
            parent = model.node(p).and_then(|n| n.parent);
        }
        model.node(item_idx).is_some()
    }

    pub(super) fn move_selection_in_visible_list(&mut self, delta: i32) {
        let visible_indices = self.get_visible_item_indices();
        if visible_indices.is_empty() {
            return;
        }

        let new_pos = match visible_indices
            .iter()
            .position(|&idx| idx == self.current_selection_idx)
        {
            Some(pos) => (pos as i32 + delta).rem_euclid(visible_indices.len() as i32) as usize,
            None if delta > 0 => 0,
            None => visible_indices.len() - 1,
        };
        self.current_selection_idx = visible_indices[new_pos];
        self.ensure_selection_is_visible_in_viewport();
    }

    pub(super) fn ensure_selection_is_visible_in_viewport(&mut self) {
        if self.list_viewport_height == 0 {
            return;
        }
        let visible_indices = self.get_visible_item_indices();
        let list_height = self.list_viewport_height;

        if let Some(pos) = visible_indices
            .iter()
            .position(|&idx| idx == self.current_selection_idx)
        {
            if pos < self.scroll_offset {
                self.scroll_offset = pos;
            } else if pos >= self.scroll_offset + list_height {
                self.scroll_offset = pos.saturating_sub(list_height - 1);
            }
        }

        let num_visible_items = visible_indices.len();
        if num_visible_items <= list_height {
            self.scroll_offset = 0;
        } else {
            self.scroll_offset = self.scroll_offset.min(num_visible_items - list_height);
        }
    }

    /// After a collapse the cursor may sit inside a hidden subtree; move it
    /// up to the nearest visible ancestor.
    pub(super) fn ensure_selection_is_visible(&mut self) {
        let model = self.session.selection.model();
        if model.is_empty() {
            return;
        }
        let mut candidate_idx = self.current_selection_idx.min(model.len() - 1);
        while !self.is_item_visible(candidate_idx) {
            match self
                .session
                .selection
                .model()
                .node(candidate_idx)
                .and_then(|n| n.parent)
            {
                Some(parent) => candidate_idx = parent,
                None => break,
            }
        }
        self.current_selection_idx = candidate_idx;
        self.ensure_selection_is_visible_in_viewport();
    }

    pub(super) fn toggle_expansion(&mut self) {
        let idx = self.current_selection_idx;
        let is_dir = self
            .session
            .selection
            .model()
            .node(idx)
            .is_some_and(|n| n.is_dir());
        if is_dir {
            self.expanded[idx] = !self.expanded[idx];
            self.ensure_selection_is_visible();
        }
    }

    pub(super) fn expand_all_directories(&mut self) {
        self.expanded.iter_mut().for_each(|e| *e = true);
        self.ensure_selection_is_visible();
    }

    pub(super) fn collapse_all_directories(&mut self) {
        self.expanded.iter_mut().for_each(|e| *e = false);
        self.ensure_selection_is_visible();
    }

    pub(super) fn toggle_current_item_selection(&mut self) {
        let Some(path) = self
            .session
            .selection
            .model()
            .node(self.current_selection_idx)
            .map(|n| n.path.clone())
        else {
            return;
        };
        self.session.selection.toggle(&path);
    }

    // --- Side panels ---

    fn move_in_panel(&mut self, delta: i32) {
        let len = match self.focus {
            Focus::Frequent => self.frequent_paths().len(),
            Focus::Groups => self.session.store.groups().len(),
            Focus::Tree => return,
        };
        let cursor = match self.focus {
            Focus::Frequent => &mut self.frequent_idx,
            _ => &mut self.group_idx,
        };
        if len == 0 {
            *cursor = 0;
            return;
        }
        *cursor = (*cursor as i32 + delta).rem_euclid(len as i32) as usize;
    }

    pub(super) fn toggle_frequent_path(&mut self) {
        if let Some(path) = self.frequent_paths().get(self.frequent_idx) {
            self.session.selection.toggle(path);
        }
    }

    pub(super) fn select_current_group(&mut self) {
        let Some(group) = self.session.store.groups().get(self.group_idx) else {
            return;
        };
        let paths = group.paths.clone();
        self.session.selection.replace_selection(&paths);
    }

    pub(super) fn delete_current_group(&mut self) {
        match self.session.store.delete_group(self.group_idx) {
            Ok(true) => {
                let len = self.session.store.groups().len();
                self.group_idx = self.group_idx.min(len.saturating_sub(1));
            }
            Ok(false) => {}
            Err(e) => self.status = Some(format!("⚠️ Could not delete group: {}", e)),
        }
    }

    // --- Actions ---

    pub(super) fn copy_selection(&mut self) {
        let result = self.session.copy();
        if let Some(msg) = workflow::describe_copy(&result) {
            self.status = Some(msg);
        }
    }

    pub(super) fn begin_group_naming(&mut self) {
        if !self.has_selection() {
            return;
        }
        self.group_name_input.clear();
        self.mode = AppMode::NamingGroup;
    }

    pub(super) fn confirm_group_name(&mut self) {
        self.mode = AppMode::Normal;
        let paths = self.session.selection.current_selection();
        match self.session.store.save_group(&self.group_name_input, &paths) {
            Ok(true) => {
                self.status = Some(format!(
                    "Saved group '{}' ({} files).",
                    self.group_name_input.trim(),
                    paths.len()
                ));
            }
            Ok(false) => {}
            Err(e) => self.status = Some(format!("⚠️ Could not save group: {}", e)),
        }
        self.group_name_input.clear();
    }

    pub(super) fn begin_branch_edit(&mut self) {
        self.branch_input = self.session.branch.clone().unwrap_or_default();
        self.mode = AppMode::EditingBranch;
    }

    /// Blank input goes back to the server's default branch.
    pub(super) fn confirm_branch(&mut self) {
        self.mode = AppMode::Normal;
        let branch = self.branch_input.trim();
        self.session.branch = (!branch.is_empty()).then(|| branch.to_string());
        self.status = Some(match &self.session.branch {
            Some(b) => format!("Update branch: {}", b),
            None => "Update branch: server default".to_string(),
        });
        self.branch_input.clear();
    }

    pub(super) fn start_update(&mut self) {
        if self.session.start_update() {
            self.status = Some("Updating…".to_string());
        }
    }

    /// Called once per loop iteration.
    pub(super) fn tick(&mut self) {
        let Some(result) = self.session.update.poll() else {
            return;
        };
        self.log_text = update::describe(&result);
        self.mode = AppMode::ShowingLog;
        self.status = None;

        if matches!(&result, Ok(report) if report.ok) {
            match self.session.reload() {
                Ok(()) => self.rebuild_view(),
                Err(e) => self.status = Some(format!("⚠️ Reload failed: {:#}", e)),
            }
        }
    }

    // --- Event handling sub-methods ---
    pub(super) fn handle_normal_mode_input(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::Char('q') => self.quit = true,
            KeyCode::Esc => {
                if self.focus == Focus::Tree {
                    self.quit = true;
                } else {
                    self.focus = Focus::Tree;
                }
            }
            KeyCode::Char('c') => self.copy_selection(),
            KeyCode::Char('s') => self.begin_group_naming(),
            KeyCode::Char('u') => self.start_update(),
            KeyCode::Char('b') => self.begin_branch_edit(),
            KeyCode::Char('d') => self.session.selection.clear(),
            KeyCode::Char('t') => self.focus = Focus::Tree,
            KeyCode::Char('f') => self.focus = Focus::Frequent,
            KeyCode::Char('g') => self.focus = Focus::Groups,
            _ => match self.focus {
                Focus::Tree => self.handle_tree_input(key_event),
                Focus::Frequent | Focus::Groups => self.handle_panel_input(key_event),
            },
        }
    }

    fn handle_tree_input(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::Down | KeyCode::Char('j') => self.move_selection_in_visible_list(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection_in_visible_list(-1),
            KeyCode::Char(' ') | KeyCode::Enter => self.toggle_current_item_selection(),
            KeyCode::Char('o') | KeyCode::Tab => self.toggle_expansion(),
            KeyCode::Char('*') => self.expand_all_directories(),
            KeyCode::Char('-') => self.collapse_all_directories(),
            _ => {}
        }
    }

    fn handle_panel_input(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::Down | KeyCode::Char('j') => self.move_in_panel(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_in_panel(-1),
            KeyCode::Char(' ') | KeyCode::Enter => match self.focus {
                Focus::Frequent => self.toggle_frequent_path(),
                _ => self.select_current_group(),
            },
            KeyCode::Char('x') | KeyCode::Delete if self.focus == Focus::Groups => {
                self.delete_current_group()
            }
            _ => {}
        }
    }

    pub(super) fn handle_naming_mode_input(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::Enter => self.confirm_group_name(),
            KeyCode::Esc => {
                self.mode = AppMode::Normal;
                self.group_name_input.clear();
            }
            KeyCode::Char(c) => self.group_name_input.push(c),
            KeyCode::Backspace => {
                self.group_name_input.pop();
            }
            _ => {}
        }
    }

    pub(super) fn handle_branch_mode_input(&mut self, key_event: KeyEvent) {
        match key_event.code {
            KeyCode::Enter => self.confirm_branch(),
            KeyCode::Esc => {
                self.mode = AppMode::Normal;
                self.branch_input.clear();
            }
            KeyCode::Char(c) => self.branch_input.push(c),
            KeyCode::Backspace => {
                self.branch_input.pop();
            }
            _ => {}
        }
    }

    pub(super) fn handle_log_mode_input(&mut self, key_event: KeyEvent) {
        if matches!(
            key_event.code,
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char(' ')
        ) {
            self.mode = AppMode::Normal;
        }
    }

    pub(super) fn handle_key(&mut self, key_event: KeyEvent) {
        match self.mode {
            AppMode::Normal => self.handle_normal_mode_input(key_event),
            AppMode::NamingGroup => self.handle_naming_mode_input(key_event),
            AppMode::EditingBranch => self.handle_branch_mode_input(key_event),
            AppMode::ShowingLog => self.handle_log_mode_input(key_event),
        }
    }
}
