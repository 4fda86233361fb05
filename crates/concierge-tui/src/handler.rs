use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode};
use crate::tui::AppEvent;

const MOUSE_SCROLL_LINES: u16 = 3;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Net(completion) => app.apply(completion),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => {
                app.should_quit = true;
                return;
            }
            KeyCode::Char('x') => {
                app.cancel_flow();
                return;
            }
            KeyCode::Char('r') => {
                app.reconnect();
                return;
            }
            _ => {}
        }
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Tab => app.toggle_focus(),

        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Choices => app.choice_nav_down(),
            FocusPane::Composer => app.scroll_down(1),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Choices => app.choice_nav_up(),
            FocusPane::Composer => app.scroll_up(1),
        },
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::Char('G') | KeyCode::End => {
            app.follow_tail = true;
            app.scroll_to_bottom();
        }

        KeyCode::Enter => match app.focus {
            FocusPane::Choices => app.choose_selected(),
            FocusPane::Composer => start_editing(app),
        },
        KeyCode::Char('i') if app.focus == FocusPane::Composer => start_editing(app),

        _ => {}
    }
}

fn start_editing(app: &mut App) {
    if app.affordance().accepts_text() {
        app.input_mode = InputMode::Editing;
        app.composer_cursor = app.composer.chars().count();
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => app.submit_composer(),
        KeyCode::Tab => app.toggle_focus(),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Backspace => {
            if app.composer_cursor > 0 {
                app.composer_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.composer, app.composer_cursor);
                app.composer.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.composer.chars().count();
            if app.composer_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.composer, app.composer_cursor);
                app.composer.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.composer_cursor = app.composer_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.composer.chars().count();
            if app.composer_cursor < char_count {
                app.composer_cursor += 1;
            }
        }
        KeyCode::Home => app.composer_cursor = 0,
        KeyCode::End => app.composer_cursor = app.composer.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.composer, app.composer_cursor);
            app.composer.insert(byte_pos, c);
            app.composer_cursor += 1;
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(MOUSE_SCROLL_LINES),
        MouseEventKind::ScrollUp => app.scroll_up(MOUSE_SCROLL_LINES),
        _ => {}
    }
}
