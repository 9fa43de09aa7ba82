use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;
use crate::app::App;
use crate::tui::AppEvent;

/// Route one event to the attached chat widget.
pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::ChatSettled { pending, outcome } => app.widget.complete_chat(pending, outcome),
        AppEvent::ResetSettled { pending, outcome } => app.widget.complete_reset(pending, outcome),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    if app.show_model_picker {
        handle_model_picker(app, key);
    } else {
        handle_input(app, key);
    }
}

fn handle_model_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_model_picker(),
        KeyCode::Char('j') | KeyCode::Down => app.widget.elements.model.picker_down(),
        KeyCode::Char('k') | KeyCode::Up => app.widget.elements.model.picker_up(),
        KeyCode::Enter => app.pick_model(),
        _ => {}
    }
}

fn handle_input(app: &mut App, key: KeyEvent) {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        // Modifiers are ignored: Shift+Enter sends too
        KeyCode::Enter => {
            app.widget.send_current_input();
        }
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('o') if ctrl => app.open_model_picker(),
        KeyCode::Char('r') if ctrl => {
            app.widget.reset_conversation();
        }
        KeyCode::PageUp => {
            let page = app.page_size();
            app.scroll_log_up(page);
        }
        KeyCode::PageDown => {
            let page = app.page_size();
            app.scroll_log_down(page);
        }
        KeyCode::Backspace => app.widget.elements.input.backspace(),
        KeyCode::Delete => app.widget.elements.input.delete(),
        KeyCode::Left => app.widget.elements.input.move_left(),
        KeyCode::Right => app.widget.elements.input.move_right(),
        KeyCode::Home => app.widget.elements.input.move_home(),
        KeyCode::End => app.widget.elements.input.move_end(),
        KeyCode::Char(c) if !ctrl => app.widget.elements.input.insert(c),
        _ => {}
    }
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;
    let in_log = app.log_area.is_some_and(|r| r.contains(Position::new(x, y)));

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if !app.show_model_picker && app.widget.elements.send.contains(x, y) {
                app.widget.send_current_input();
            }
        }
        MouseEventKind::ScrollDown if in_log => app.scroll_log_down(3),
        MouseEventKind::ScrollUp if in_log => app.scroll_log_up(3),
        _ => {}
    }
}
