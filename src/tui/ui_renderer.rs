use super::app_logic::TuiApp;
use super::app_state::{AppMode, Focus};
use crate::selection::CheckState;
use crate::utils;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

fn panel_block(title: String, focused: bool) -> Block<'static> {
    let block = Block::default().borders(Borders::ALL).title(title);
    if focused {
        block.border_style(Style::default().fg(Color::Cyan))
    } else {
        block
    }
}

fn highlight() -> Style {
    Style::default()
        .add_modifier(Modifier::BOLD)
        .bg(Color::DarkGray)
}

fn draw_help_block(f: &mut Frame, _app: &TuiApp, area: Rect) {
    let help_text_lines_content = vec![
        Line::from("Arrows/jk: Nav | Space/Enter: Sel | Tab/o: Fold | */-: Expand/Collapse All | d: Clear | q: Quit"),
        Line::from("c: Copy | s: Save Group | u: Update | b: Branch | t/f/g: Tree/Frequent/Groups | x: Delete Group"),
    ];
    let help_paragraph = Paragraph::new(help_text_lines_content).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Repopick"),
    );
    f.render_widget(help_paragraph, area);
}

fn draw_selection_bar(f: &mut Frame, app: &TuiApp, area: Rect) {
    let chips = app.chips.borrow();
    let mut spans = Vec::with_capacity(chips.len() * 2);
    for path in chips.iter() {
        spans.push(Span::styled(
            format!(" {} ", utils::short_name(path)),
            Style::default().bg(Color::DarkGray).fg(Color::White),
        ));
        spans.push(Span::raw(" "));
    }

    let (copy_style, update_label) = (
        if chips.is_empty() {
            Style::default().add_modifier(Modifier::DIM)
        } else {
            Style::default().fg(Color::Green)
        },
        if app.session.update.is_in_flight() {
            "Updating…".to_string()
        } else {
            format!(
                "[u] Update ({})",
                app.session.branch.as_deref().unwrap_or("default")
            )
        },
    );
    let title = Line::from(vec![
        Span::raw(format!("Selected ({}) ", chips.len())),
        Span::styled("[c] Copy  [s] Save group", copy_style),
        Span::raw("  "),
        Span::raw(update_label),
    ]);

    let bar = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false });
    f.render_widget(bar, area);
}

fn draw_tree_block(f: &mut Frame, app: &mut TuiApp, area: Rect) {
    app.list_viewport_height = area.height.saturating_sub(2) as usize;
    // Adjust scroll for the current viewport before slicing the rows.
    app.ensure_selection_is_visible_in_viewport();

    let visible_item_indices = app.get_visible_item_indices();
    let num_visible_items = visible_item_indices.len();

    let list_items_to_render_indices = visible_item_indices
        .get(
            app.scroll_offset
                ..(app.scroll_offset + app.list_viewport_height).min(num_visible_items),
        )
        .unwrap_or(&[]);

    let model = app.session.selection.model();
    let list_items: Vec<ListItem> = list_items_to_render_indices
        .iter()
        .map(|&idx| {
            let node = &model.nodes()[idx];
            let selection_prefix = match app.session.selection.check_state(idx) {
                CheckState::NotSelected => "[ ] ",
                CheckState::PartiallySelected => "[-] ",
                CheckState::FullySelected => "[x] ",
            };
            let expansion_prefix = if node.is_dir() {
                if app.expanded[idx] { "[-] " } else { "[+] " }
            } else {
                "    "
            };
            ListItem::new(format!(
                "{}{}{}",
                expansion_prefix, selection_prefix, app.labels[idx]
            ))
        })
        .collect();

    let focused = app.focus == Focus::Tree;
    let list_widget = List::new(list_items)
        .block(panel_block("Files".to_string(), focused))
        .highlight_style(highlight())
        .highlight_symbol("❯ ");

    let mut list_state_for_view = ListState::default();
    if focused {
        if let Some(pos) = visible_item_indices
            .iter()
            .position(|&idx| idx == app.current_selection_idx)
        {
            if pos >= app.scroll_offset && pos < app.scroll_offset + app.list_viewport_height {
                list_state_for_view.select(Some(pos - app.scroll_offset));
            }
        }
    }
    f.render_stateful_widget(list_widget, area, &mut list_state_for_view);
}

fn draw_frequent_block(f: &mut Frame, app: &TuiApp, area: Rect) {
    let items: Vec<ListItem> = app
        .frequent_paths()
        .iter()
        .map(|path| {
            let marker = if app.session.selection.is_selected(path) {
                "[x] "
            } else {
                "[ ] "
            };
            ListItem::new(format!(
                "{}{} ({})",
                marker,
                utils::short_name(path),
                app.session.store.count(path)
            ))
        })
        .collect();

    let focused = app.focus == Focus::Frequent;
    let mut state = ListState::default();
    if focused && !items.is_empty() {
        state.select(Some(app.frequent_idx));
    }
    let list = List::new(items)
        .block(panel_block("Frequent".to_string(), focused))
        .highlight_style(highlight());
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_groups_block(f: &mut Frame, app: &TuiApp, area: Rect) {
    let groups = app.session.store.groups();
    let items: Vec<ListItem> = groups
        .iter()
        .map(|g| ListItem::new(format!("{} ({} files)", g.name, g.paths.len())))
        .collect();

    let focused = app.focus == Focus::Groups;
    let mut state = ListState::default();
    if focused && !items.is_empty() {
        state.select(Some(app.group_idx));
    }
    let list = List::new(items)
        .block(panel_block("Saved groups".to_string(), focused))
        .highlight_style(highlight());
    f.render_stateful_widget(list, area, &mut state);
}

fn draw_status_line(f: &mut Frame, app: &TuiApp, area: Rect) {
    let text = app.status.clone().unwrap_or_default();
    f.render_widget(Paragraph::new(text), area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn draw_input_prompt(f: &mut Frame, title: &str, input: &str) {
    let area = centered_rect(50, 20, f.area());
    let area = Rect { height: 3, ..area }.intersection(f.area());
    let prompt = Paragraph::new(input).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(Clear, area);
    f.render_widget(prompt, area);
    f.set_cursor_position((area.x + 1 + input.chars().count() as u16, area.y + 1));
}

fn draw_update_log(f: &mut Frame, app: &TuiApp) {
    let area = centered_rect(80, 70, f.area());
    let log = Paragraph::new(app.log_text.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Repository update (Enter to close)"),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(Clear, area);
    f.render_widget(log, area);
}

pub(super) fn ui_frame(frame: &mut Frame, app: &mut TuiApp) {
    let help_lines = 2;
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(help_lines + 2),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(main_chunks[2]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(body[1]);

    draw_help_block(frame, app, main_chunks[0]);
    draw_selection_bar(frame, app, main_chunks[1]);
    draw_tree_block(frame, app, body[0]);
    draw_frequent_block(frame, app, side[0]);
    draw_groups_block(frame, app, side[1]);
    draw_status_line(frame, app, main_chunks[3]);

    match app.mode {
        AppMode::NamingGroup => draw_input_prompt(
            frame,
            "Group name? (Enter to save, Esc to cancel)",
            &app.group_name_input,
        ),
        AppMode::EditingBranch => draw_input_prompt(
            frame,
            "Update branch? (blank = server default, Esc to cancel)",
            &app.branch_input,
        ),
        AppMode::ShowingLog => draw_update_log(frame, app),
        AppMode::Normal => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree_model::TreeNode;
    use crate::tui::app_logic::TuiApp;
    use crate::workflow::tests::{CannedBackend, session_with, src_tree, write_tree};
    use ratatui::backend::TestBackend;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn render(app: &mut TuiApp) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 24)).unwrap();
        terminal.draw(|frame| ui_frame(frame, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn tree_rows_show_tri_state_markers() {
        let mut tree_file = NamedTempFile::new().unwrap();
        let mut nodes = src_tree();
        nodes.push(TreeNode::file("README.md", "README.md"));
        write_tree(&mut tree_file, &nodes);
        let mut app = TuiApp::new(session_with(&tree_file, Arc::new(CannedBackend::default())));

        app.session.selection.toggle_leaf("src/a.txt");
        let screen = render(&mut app);

        assert!(screen.contains("[+] [-] ├─ src/"));
        assert!(screen.contains("    [ ] └─ README.md"));
        assert!(screen.contains("Selected (1)"));
        assert!(screen.contains("[u] Update (main)"));
        assert!(screen.contains(" a.txt "));
    }
}
