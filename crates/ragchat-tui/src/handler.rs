use std::time::Instant;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use ragchat_core::DocumentKind;

use crate::app::{clean_dropped_path, App, FocusPane, InputMode, Popup, TextInput};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(Instant::now()),

        AppEvent::Answer { ask, outcome } => app.on_answer(ask, outcome),
        AppEvent::FileLoaded(loaded) => app.on_file_loaded(loaded),
        AppEvent::UploadProgress { task, percent } => app.on_upload_progress(task, percent),
        AppEvent::UploadFinished { task, outcome } => app.on_upload_finished(task, outcome),
        AppEvent::Documents(outcome) => app.on_documents(outcome),
        AppEvent::Health(outcome) => app.on_health(outcome),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.quit();
        return;
    }

    if let Some(popup) = app.popup {
        handle_popup(app, popup, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }
}

fn handle_popup(app: &mut App, popup: Popup, key: KeyEvent) {
    match popup {
        Popup::ConfirmClear => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => app.confirm_clear(),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.cancel_clear(),
            _ => {}
        },
        Popup::UploadPath => match key.code {
            KeyCode::Esc => app.popup = None,
            KeyCode::Enter => {
                let raw = app.upload_path.text.clone();
                app.popup = None;
                app.request_upload(&raw);
            }
            code => edit_text(&mut app.upload_path, code),
        },
        Popup::Welcome => match key.code {
            KeyCode::Esc => app.skip_welcome(),
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => app.welcome.toggle_field(),
            KeyCode::Enter => app.submit_welcome(),
            code => {
                app.welcome.error = None;
                edit_text(app.welcome.active_input(), code);
            }
        },
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.quit(),

        // Start typing
        KeyCode::Char('i') => app.input_mode = InputMode::Editing,
        KeyCode::Enter if app.focus == FocusPane::Chat => app.input_mode = InputMode::Editing,

        KeyCode::Tab => app.cycle_focus(),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.chat_height / 2);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.chat_height / 2);
        }
        KeyCode::Char('d') => app.toggle_sidebar(),

        // Documents
        KeyCode::Char('u') => app.open_upload_prompt(),
        KeyCode::Char('r') => app.refresh_documents(),
        KeyCode::Char('x') => {
            app.dismiss_upload();
            app.notice = None;
        }
        KeyCode::Enter => app.select_highlighted_document(),
        KeyCode::Char('a') => app.clear_document_selection(),

        // Conversation
        KeyCode::Char('c') => app.request_clear(),
        KeyCode::Esc => {
            app.cancel_ask();
        }

        // Navigation depends on focus
        KeyCode::Char('j') | KeyCode::Down => match app.focus {
            FocusPane::Chat => app.scroll_down(1),
            FocusPane::Documents => app.documents_nav_down(),
        },
        KeyCode::Char('k') | KeyCode::Up => match app.focus {
            FocusPane::Chat => app.scroll_up(1),
            FocusPane::Documents => app.documents_nav_up(),
        },
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::Char('g') => app.scroll_up(u16::MAX),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            // First Esc abandons a pending answer, the next leaves typing
            if !app.cancel_ask() {
                app.input_mode = InputMode::Normal;
            }
        }
        KeyCode::Enter => app.submit_input(),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::Tab => {
            app.input_mode = InputMode::Normal;
            app.cycle_focus();
        }
        code => edit_text(&mut app.input, code),
    }
}

fn edit_text(input: &mut TextInput, code: KeyCode) {
    match code {
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

/// Pasted text goes to the focused field, unless it is the path of a
/// supported document on disk, which terminals produce for a file drop.
fn handle_paste(app: &mut App, text: &str) {
    match app.popup {
        Some(Popup::UploadPath) => app.upload_path.insert_str(text.trim()),
        Some(Popup::Welcome) => app.welcome.active_input().insert_str(text),
        Some(Popup::ConfirmClear) => {}
        None if looks_like_dropped_file(text) => app.request_upload(text),
        None => {
            app.input_mode = InputMode::Editing;
            app.input.insert_str(text);
        }
    }
}

fn looks_like_dropped_file(text: &str) -> bool {
    if text.trim().contains('\n') {
        return false;
    }
    let path = clean_dropped_path(text);
    let supported = path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(DocumentKind::from_filename)
        .is_some();
    supported && path.is_file()
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    // Position-based scrolling
    let in_chat = app.chat_area.is_some_and(|r| point_in_rect(x, y, r));
    let in_sidebar = app.sidebar_area.is_some_and(|r| point_in_rect(x, y, r));

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_chat {
                app.scroll_down(3);
            } else if in_sidebar {
                app.documents_nav_down();
            }
        }
        MouseEventKind::ScrollUp => {
            if in_chat {
                app.scroll_up(3);
            } else if in_sidebar {
                app.documents_nav_up();
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use ragchat_core::{
        AskRequest, AskResponse, Backend, Config, HealthStatus, ProgressSink, RemoteDocument,
        TransportError, UploadFile, UploadReceipt,
    };
    use tokio::sync::mpsc;

    struct OfflineBackend;

    #[async_trait]
    impl Backend for OfflineBackend {
        async fn ask(&self, _request: &AskRequest) -> Result<AskResponse, TransportError> {
            Err(TransportError::Timeout)
        }

        async fn upload(
            &self,
            _file: &UploadFile,
            _progress: Arc<dyn ProgressSink>,
        ) -> Result<UploadReceipt, TransportError> {
            Err(TransportError::Timeout)
        }

        async fn list_documents(&self) -> Result<Vec<RemoteDocument>, TransportError> {
            Ok(listing())
        }

        async fn health(&self) -> Result<HealthStatus, TransportError> {
            Err(TransportError::Timeout)
        }
    }

    fn listing() -> Vec<RemoteDocument> {
        ["handbook.pdf", "policy.txt"]
            .into_iter()
            .map(|name| RemoteDocument {
                id: None,
                name: name.to_string(),
                size: 10,
                last_modified: None,
            })
            .collect()
    }

    fn app() -> App {
        let (tx, _rx) = mpsc::unbounded_channel();
        App::new(Arc::new(OfflineBackend), tx, &Config::new(), None)
    }

    fn press(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_event(app, press(KeyCode::Char(c))).unwrap();
        }
    }

    #[test]
    fn test_ctrl_c_quits_from_any_mode() {
        let mut app = app();
        let event = AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        handle_event(&mut app, event).unwrap();
        assert!(app.should_quit);
    }

    #[test]
    fn test_typing_in_editing_mode_fills_input() {
        let mut app = app();
        assert_eq!(app.input_mode, InputMode::Editing);
        type_text(&mut app, "quit?");
        assert_eq!(app.input.text, "quit?");
        assert!(!app.should_quit);

        handle_event(&mut app, press(KeyCode::Esc)).unwrap();
        assert_eq!(app.input_mode, InputMode::Normal);
        handle_event(&mut app, press(KeyCode::Char('q'))).unwrap();
        assert!(app.should_quit);
    }

    #[test]
    fn test_clear_popup_captures_keys() {
        let mut app = app();
        app.input_mode = InputMode::Normal;
        handle_event(&mut app, press(KeyCode::Char('c'))).unwrap();
        assert_eq!(app.popup, Some(Popup::ConfirmClear));

        // 'q' must not quit while the popup is open
        handle_event(&mut app, press(KeyCode::Char('q'))).unwrap();
        assert!(!app.should_quit);

        handle_event(&mut app, press(KeyCode::Char('n'))).unwrap();
        assert_eq!(app.popup, None);
    }

    #[test]
    fn test_document_selection_from_sidebar() {
        let mut app = app();
        handle_event(&mut app, AppEvent::Documents(Ok(listing()))).unwrap();

        app.input_mode = InputMode::Normal;
        handle_event(&mut app, press(KeyCode::Tab)).unwrap();
        assert_eq!(app.focus, FocusPane::Documents);
        handle_event(&mut app, press(KeyCode::Char('j'))).unwrap();
        handle_event(&mut app, press(KeyCode::Enter)).unwrap();
        assert_eq!(
            app.conversation.active_document().map(|doc| doc.name.as_str()),
            Some("policy.txt")
        );

        handle_event(&mut app, press(KeyCode::Char('a'))).unwrap();
        assert!(app.conversation.active_document().is_none());
    }

    #[test]
    fn test_plain_paste_goes_to_input() {
        let mut app = app();
        handle_event(&mut app, AppEvent::Paste("What changed in v2?".to_string())).unwrap();
        assert_eq!(app.input.text, "What changed in v2?");
    }

    #[test]
    fn test_dropped_file_detection() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("contract.pdf");
        std::fs::write(&pdf, b"%PDF").unwrap();
        let sheet = dir.path().join("budget.xlsx");
        std::fs::write(&sheet, b"xlsx").unwrap();

        assert!(looks_like_dropped_file(&format!("'{}'", pdf.display())));
        assert!(!looks_like_dropped_file(&sheet.display().to_string()));
        assert!(!looks_like_dropped_file("/no/such/file.pdf"));
        assert!(!looks_like_dropped_file("line one\nline two.pdf"));
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(2, 2, 10, 5);
        assert!(point_in_rect(2, 2, rect));
        assert!(point_in_rect(11, 6, rect));
        assert!(!point_in_rect(12, 6, rect));
        assert!(!point_in_rect(1, 3, rect));
    }
}
