use super::app_logic::TuiApp;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};
use std::time::Duration;

pub(super) fn handle_events(app: &mut TuiApp) -> Result<()> {
    if event::poll(Duration::from_millis(50))? {
        if let Event::Key(key_event) = event::read()? {
            if key_event.kind == KeyEventKind::Press {
                // Copy runs to completion right here, inside the key event.
                app.handle_key(key_event);
            }
        }
    }
    app.tick();
    Ok(())
}
