use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ego_core::settings::{TEMPERATURE_STEP, VERBOSITY_STEP};
use ego_core::TurnPhase;
use ratatui::layout::Rect;

use crate::app::{App, EditMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => {}
        AppEvent::Phase(phase) => {
            tracing::trace!(?phase, "turn phase");
            if matches!(phase, TurnPhase::UserMessageAppended | TurnPhase::ResponseAppended) {
                app.scroll_to_bottom();
            }
        }
        AppEvent::Tick => {
            app.tick();
            app.poll_tasks().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.edit_mode {
        EditMode::Normal => handle_normal_mode(app, key),
        EditMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Any key dismisses the upgrade notice
    if app.show_upgrade_notice {
        app.show_upgrade_notice = false;
        return;
    }

    if app.show_model_picker {
        match key.code {
            KeyCode::Esc => app.show_model_picker = false,
            KeyCode::Char('j') | KeyCode::Down => app.model_picker_nav_down(),
            KeyCode::Char('k') | KeyCode::Up => app.model_picker_nav_up(),
            KeyCode::Enter => app.select_model(),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Enter => {
            app.edit_mode = EditMode::Editing;
            // Cursor at end of existing text
            app.cursor = app.input.chars().count();
        }

        // Abort the in-flight turn
        KeyCode::Esc => app.cancel_turn(),

        // Model
        KeyCode::Char('M') => app.open_model_picker(),
        KeyCode::Char('A') => app.auto_select_model(),

        // Customization
        KeyCode::Char('T') => app.cycle_tone(),
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_verbosity(VERBOSITY_STEP as i32),
        KeyCode::Char('-') => app.adjust_verbosity(-(VERBOSITY_STEP as i32)),
        KeyCode::Char(']') => app.adjust_temperature(TEMPERATURE_STEP),
        KeyCode::Char('[') => app.adjust_temperature(-TEMPERATURE_STEP),
        KeyCode::Char('m') => app.cycle_chat_mode(),
        KeyCode::Char('t') => app.toggle_thinking(),
        KeyCode::Char('w') => app.toggle_web_search(),

        // Input surfaces
        KeyCode::Char('I') => app.cycle_input_mode(),
        KeyCode::Char('r') => app.start_voice_input(),
        KeyCode::Char('v') => app.toggle_voice_output(),

        KeyCode::Char('C') => app.clear_history(),
        KeyCode::Char('L') => app.toggle_login(),
        KeyCode::Char('U') => app.show_upgrade_notice = true,

        // Chat scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.edit_mode = EditMode::Normal;
        }
        KeyCode::Enter => app.submit_input(),
        KeyCode::Backspace => {
            if app.cursor > 0 {
                app.cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.input.chars().count();
            if app.cursor < char_count {
                let byte_pos = char_to_byte_index(&app.input, app.cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.input.chars().count();
            app.cursor = (app.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.cursor = 0;
        }
        KeyCode::End => {
            app.cursor = app.input.chars().count();
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.cursor);
            app.input.insert(byte_pos, c);
            app.cursor += 1;
        }
        _ => {}
    }
}

/// Check if a point is within a rectangle
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
        MouseEventKind::ScrollDown => app.chat_scroll = app.chat_scroll.saturating_add(3),
        MouseEventKind::ScrollUp => app.chat_scroll = app.chat_scroll.saturating_sub(3),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_app;
    use ego_core::{InputMode, Tone};

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_char_to_byte_index() {
        assert_eq!(char_to_byte_index("héllo", 0), 0);
        assert_eq!(char_to_byte_index("héllo", 2), 3);
        assert_eq!(char_to_byte_index("héllo", 10), 6);
    }

    #[tokio::test]
    async fn test_utf8_cursor_editing() {
        let mut app = test_app(0, 7);
        press(&mut app, KeyCode::Char('i'));
        assert_eq!(app.edit_mode, EditMode::Editing);

        type_str(&mut app, "cafe");
        press(&mut app, KeyCode::Backspace);
        type_str(&mut app, "é ☕");
        assert_eq!(app.input, "café ☕");

        press(&mut app, KeyCode::Home);
        press(&mut app, KeyCode::Delete);
        press(&mut app, KeyCode::End);
        press(&mut app, KeyCode::Left);
        press(&mut app, KeyCode::Backspace);
        assert_eq!(app.input, "afé☕");
        assert_eq!(app.cursor, 3);

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.edit_mode, EditMode::Normal);
        assert_eq!(app.input, "afé☕");
    }

    #[tokio::test]
    async fn test_enter_sends_and_leaves_editing() {
        let mut app = test_app(0, 7);
        press(&mut app, KeyCode::Enter);
        type_str(&mut app, "hello");
        press(&mut app, KeyCode::Enter);

        assert!(app.is_busy());
        assert_eq!(app.edit_mode, EditMode::Normal);

        // A second send while busy is refused
        press(&mut app, KeyCode::Enter);
        type_str(&mut app, "again");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.input, "again");
        assert!(app.status.is_some());
    }

    #[tokio::test]
    async fn test_tick_collects_finished_turn() {
        let mut app = test_app(0, 7);
        app.input = "ping".to_string();
        app.submit_input();

        while app.turn_task.as_ref().is_some_and(|t| !t.is_finished()) {
            tokio::task::yield_now().await;
        }
        handle_event(&mut app, AppEvent::Tick).await.unwrap();
        assert!(!app.is_busy());
        assert_eq!(app.session().lock().len(), 2);
    }

    #[tokio::test]
    async fn test_normal_mode_customization_keys() {
        let mut app = test_app(0, 7);
        press(&mut app, KeyCode::Char('T'));
        press(&mut app, KeyCode::Char('+'));
        press(&mut app, KeyCode::Char('+'));
        press(&mut app, KeyCode::Char('['));
        press(&mut app, KeyCode::Char('t'));
        press(&mut app, KeyCode::Char('w'));

        let settings = app.session().lock().customization();
        assert_eq!(settings.tone, Tone::Casual);
        assert_eq!(settings.verbosity, 70);
        assert!((settings.temperature - 0.6).abs() < 1e-4);
        assert!(settings.thinking_mode);
        assert!(settings.web_search);

        press(&mut app, KeyCode::Char('I'));
        assert_eq!(app.session().lock().input_mode(), InputMode::Image);
    }

    #[tokio::test]
    async fn test_model_picker_keys() {
        let mut app = test_app(0, 7);
        press(&mut app, KeyCode::Char('M'));
        assert!(app.show_model_picker);

        // Keys go to the picker while it is open
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('k'));
        press(&mut app, KeyCode::Enter);
        assert!(!app.show_model_picker);
        assert_eq!(app.edit_mode, EditMode::Normal);
        assert_eq!(
            app.session().lock().selected_model().map(|m| m.id.clone()),
            Some("claude-instant".to_string())
        );
    }

    #[tokio::test]
    async fn test_upgrade_notice_swallows_next_key() {
        let mut app = test_app(0, 7);
        press(&mut app, KeyCode::Char('U'));
        assert!(app.show_upgrade_notice);
        press(&mut app, KeyCode::Char('q'));
        assert!(!app.show_upgrade_notice);
        assert!(!app.should_quit);
        press(&mut app, KeyCode::Char('q'));
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_ctrl_c_quits_while_editing() {
        let mut app = test_app(0, 7);
        press(&mut app, KeyCode::Char('i'));
        handle_key(
            &mut app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(app.should_quit);
    }

    #[tokio::test]
    async fn test_clear_history_key() {
        let mut app = test_app(0, 7);
        app.input = "hello".to_string();
        app.submit_input();
        let outcome = app.turn_task.take().unwrap().await.unwrap();
        app.finish_turn(outcome);
        assert_eq!(app.session().lock().len(), 2);

        press(&mut app, KeyCode::Char('C'));
        assert!(app.session().lock().is_empty());
        assert_eq!(app.chat_scroll, 0);
    }
}
