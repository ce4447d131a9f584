use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, InputMode, Screen, UploadField};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Api(result) => app.handle_api(result),
        AppEvent::Stream(handle, update) => app.apply_stream(handle, update),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    // Modals swallow keys before screen switching
    if app.screen == Screen::Documents {
        if app.pending_delete.is_some() {
            handle_delete_confirm(app, key);
            return;
        }
        if app.detail_open() {
            handle_detail_modal(app, key);
            return;
        }
    }

    match key.code {
        KeyCode::Char('q') => {
            app.should_quit = true;
            return;
        }
        KeyCode::Char('1') => return app.set_screen(Screen::Upload),
        KeyCode::Char('2') => return app.set_screen(Screen::Documents),
        KeyCode::Char('3') => return app.set_screen(Screen::Chat),
        KeyCode::Char('4') => return app.set_screen(Screen::Settings),
        KeyCode::Tab => return app.set_screen(app.screen.next()),
        KeyCode::BackTab => return app.set_screen(app.screen.prev()),
        _ => {}
    }

    match app.screen {
        Screen::Upload => handle_upload_normal(app, key),
        Screen::Documents => handle_documents_normal(app, key),
        Screen::Chat => handle_chat_normal(app, key),
        Screen::Settings => handle_settings_normal(app, key),
    }
}

fn handle_upload_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.upload_field_down(),
        KeyCode::Char('k') | KeyCode::Up => app.upload_field_up(),
        KeyCode::Char('h') | KeyCode::Left => match app.upload_field {
            UploadField::ChunkMode => app.cycle_chunk_mode(false),
            UploadField::Provider => app.cycle_provider(),
            _ => {}
        },
        KeyCode::Char('l') | KeyCode::Right => match app.upload_field {
            UploadField::ChunkMode => app.cycle_chunk_mode(true),
            UploadField::Provider => app.cycle_provider(),
            _ => {}
        },
        KeyCode::Enter | KeyCode::Char('i') => match app.upload_field {
            UploadField::ChunkMode => app.cycle_chunk_mode(true),
            UploadField::Provider => app.cycle_provider(),
            UploadField::Path | UploadField::ChunkSize | UploadField::Overlap => {
                app.input_mode = InputMode::Editing;
            }
        },
        KeyCode::Char('u') => app.start_upload(),
        KeyCode::Esc => app.upload_banner = None,
        _ => {}
    }
}

fn handle_documents_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.documents_down(),
        KeyCode::Char('k') | KeyCode::Up => app.documents_up(),
        KeyCode::Char('g') | KeyCode::Home => {
            if !app.documents.is_empty() {
                app.documents_state.select(Some(0));
            }
        }
        KeyCode::Char('G') | KeyCode::End => {
            if !app.documents.is_empty() {
                app.documents_state.select(Some(app.documents.len() - 1));
            }
        }
        KeyCode::Char('r') => app.refresh_documents(),
        KeyCode::Enter | KeyCode::Char('l') => app.open_detail(),
        KeyCode::Char('d') | KeyCode::Delete => app.request_delete(),
        KeyCode::Esc => app.documents_banner = None,
        _ => {}
    }
}

fn handle_delete_confirm(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => app.confirm_delete(),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.pending_delete = None,
        _ => {}
    }
}

fn handle_detail_modal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => app.close_detail(),
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Char('h') | KeyCode::Char('l') => {
            app.toggle_detail_tab()
        }
        KeyCode::Char('j') | KeyCode::Down => app.detail_scroll = app.detail_scroll.saturating_add(1),
        KeyCode::Char('k') | KeyCode::Up => app.detail_scroll = app.detail_scroll.saturating_sub(1),
        KeyCode::PageDown => app.detail_scroll = app.detail_scroll.saturating_add(10),
        KeyCode::PageUp => app.detail_scroll = app.detail_scroll.saturating_sub(10),
        KeyCode::Char('g') => app.detail_scroll = 0,
        _ => {}
    }
}

fn handle_chat_normal(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('l') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.clear_chat();
        return;
    }

    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Editing,
        KeyCode::Esc => app.cancel_stream(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_chat_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_chat_up(1),
        KeyCode::PageDown => app.scroll_chat_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_chat_up(app.chat_height.max(1)),
        KeyCode::Char('G') | KeyCode::End => app.chat_follow = true,
        KeyCode::Char('p') => app.show_provenance = !app.show_provenance,
        KeyCode::Char('P') => app.show_prompt = !app.show_prompt,
        KeyCode::Char('m') => app.cycle_provider(),
        KeyCode::Char('r') => app.toggle_rerank(),
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_top_k(1),
        KeyCode::Char('-') => app.adjust_top_k(-1),
        _ => {}
    }
}

fn handle_settings_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => app.settings_field_down(),
        KeyCode::Char('k') | KeyCode::Up => app.settings_field_up(),
        KeyCode::Enter | KeyCode::Char('i') => app.input_mode = InputMode::Editing,
        KeyCode::Char('s') => app.save_settings(),
        KeyCode::Char('r') => app.load_settings(),
        KeyCode::Esc => app.settings_banner = None,
        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => finish_editing(app),
        KeyCode::Enter => {
            if app.screen == Screen::Chat {
                app.submit_question();
            } else {
                finish_editing(app);
            }
        }
        _ => {
            let Some(input) = app.active_input() else {
                app.input_mode = InputMode::Normal;
                return;
            };
            match key.code {
                KeyCode::Backspace => input.backspace(),
                KeyCode::Delete => input.delete(),
                KeyCode::Left => input.left(),
                KeyCode::Right => input.right(),
                KeyCode::Home => input.home(),
                KeyCode::End => input.end(),
                KeyCode::Char(c) => input.insert(c),
                _ => {}
            }
        }
    }
}

fn finish_editing(app: &mut App) {
    app.input_mode = InputMode::Normal;
    if app.screen == Screen::Upload
        && matches!(app.upload_field, UploadField::ChunkSize | UploadField::Overlap)
    {
        app.commit_number_fields();
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_detail = app.detail_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => match app.screen {
            Screen::Documents if app.detail_open() && in_detail => {
                app.detail_scroll = app.detail_scroll.saturating_add(3);
            }
            Screen::Documents => app.documents_down(),
            Screen::Chat if in_chat => app.scroll_chat_down(3),
            _ => {}
        },
        MouseEventKind::ScrollUp => match app.screen {
            Screen::Documents if app.detail_open() && in_detail => {
                app.detail_scroll = app.detail_scroll.saturating_sub(3);
            }
            Screen::Documents => app.documents_up(),
            Screen::Chat if in_chat => app.scroll_chat_up(3),
            _ => {}
        },
        _ => {}
    }
}
