use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

use ragchat_core::{
    AskRequest, AskResponse, Backend, CompanyProfile, Config, ConversationStore, DocumentDirectory,
    DocumentKind, HealthStatus, ProfileStore, RemoteDocument, TransportError, UploadCoordinator,
    UploadFile, UploadPhase, UploadReceipt, ValidationError,
};
use uuid::Uuid;

use crate::tui::{AppEvent, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Documents,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    UploadPath,
    ConfirmClear,
    Welcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WelcomeField {
    #[default]
    Name,
    Purpose,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line text field with a character cursor.
#[derive(Debug, Clone, Default)]
pub struct TextInput {
    pub text: String,
    pub cursor: usize,
}

impl TextInput {
    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    /// Insert pasted text; line breaks become spaces.
    pub fn insert_str(&mut self, s: &str) {
        let flattened = s.replace("\r\n", "\n");
        for c in flattened.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }) {
            if !c.is_control() {
                self.insert(c);
            }
        }
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }
}

#[derive(Debug, Default)]
pub struct WelcomeForm {
    pub name: TextInput,
    pub purpose: TextInput,
    pub field: WelcomeField,
    pub error: Option<String>,
}

impl WelcomeForm {
    pub fn active_input(&mut self) -> &mut TextInput {
        match self.field {
            WelcomeField::Name => &mut self.name,
            WelcomeField::Purpose => &mut self.purpose,
        }
    }

    pub fn toggle_field(&mut self) {
        self.field = match self.field {
            WelcomeField::Name => WelcomeField::Purpose,
            WelcomeField::Purpose => WelcomeField::Name,
        };
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,
    pub popup: Option<Popup>,

    // Conversation, upload and document state
    pub conversation: ConversationStore,
    pub uploads: UploadCoordinator,
    pub directory: DocumentDirectory,

    // Text entry
    pub input: TextInput,
    pub upload_path: TextInput,
    pub welcome: WelcomeForm,
    pub profile: Option<CompanyProfile>,
    profile_store: Option<ProfileStore>,

    // Chat scroll state; follow_output pins the view to the newest message
    pub chat_scroll: u16,
    pub chat_max_scroll: u16,
    pub chat_height: u16,
    pub follow_output: bool,
    seen_messages: usize,

    // Document sidebar
    pub show_sidebar: bool,
    pub documents_state: ListState,

    // Status
    pub notice: Option<String>,
    pub backend_online: Option<bool>,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub sidebar_area: Option<Rect>,

    backend: Arc<dyn Backend>,
    events: EventSender,
    ask_task: Option<(Uuid, JoinHandle<()>)>,
    upload_task: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(
        backend: Arc<dyn Backend>,
        events: EventSender,
        config: &Config,
        profile_store: Option<ProfileStore>,
    ) -> Self {
        let profile = profile_store.as_ref().and_then(|store| match store.load() {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(error = %e, "could not read onboarding profile");
                None
            }
        });
        let popup = match (&profile, &profile_store) {
            (None, Some(_)) => Some(Popup::Welcome),
            _ => None,
        };

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Chat,
            popup,

            conversation: ConversationStore::new(config.conversation_options()),
            uploads: UploadCoordinator::new(config.success_display()),
            directory: DocumentDirectory::new(),

            input: TextInput::default(),
            upload_path: TextInput::default(),
            welcome: WelcomeForm::default(),
            profile,
            profile_store,

            chat_scroll: 0,
            chat_max_scroll: 0,
            chat_height: 0,
            follow_output: true,
            seen_messages: 0,

            show_sidebar: true,
            documents_state: ListState::default(),

            notice: None,
            backend_online: None,
            animation_frame: 0,

            chat_area: None,
            sidebar_area: None,

            backend,
            events,
            ask_task: None,
            upload_task: None,
        }
    }

    /// Kick off the startup health probe and the first document listing.
    pub fn start(&mut self) {
        let backend = self.backend.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let _ = tx.send(AppEvent::Health(backend.health().await));
        });
        self.refresh_documents();
    }

    // Conversation actions
    pub fn submit_input(&mut self) {
        match self.conversation.begin_send(&self.input.text) {
            Ok(request) => {
                self.input.clear();
                self.notice = None;
                self.spawn_ask(request);
            }
            Err(ValidationError::EmptyMessage) => {}
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    fn spawn_ask(&mut self, request: AskRequest) {
        let backend = self.backend.clone();
        let tx = self.events.clone();
        let ask = Uuid::new_v4();
        let handle = tokio::spawn(async move {
            let outcome = backend.ask(&request).await;
            let _ = tx.send(AppEvent::Answer { ask, outcome });
        });
        self.ask_task = Some((ask, handle));
    }

    /// Answers from an aborted ask may already be queued; only the current
    /// ask's answer reaches the conversation.
    pub fn on_answer(&mut self, ask: Uuid, outcome: Result<AskResponse, TransportError>) {
        match &self.ask_task {
            Some((current, _)) if *current == ask => {
                self.ask_task = None;
                self.conversation.complete_send(outcome);
            }
            _ => tracing::debug!(%ask, "ignoring answer for an abandoned ask"),
        }
    }

    fn abort_ask(&mut self) {
        if let Some((_, handle)) = self.ask_task.take() {
            handle.abort();
        }
    }

    /// Stop waiting for the current answer.
    pub fn cancel_ask(&mut self) -> bool {
        self.abort_ask();
        self.conversation.cancel_send()
    }

    pub fn request_clear(&mut self) {
        self.conversation.request_clear();
        self.popup = Some(Popup::ConfirmClear);
    }

    pub fn confirm_clear(&mut self) {
        self.abort_ask();
        self.conversation.confirm_clear();
        self.popup = None;
        self.chat_scroll = 0;
    }

    pub fn cancel_clear(&mut self) {
        self.conversation.cancel_clear();
        self.popup = None;
    }

    // Upload actions
    pub fn open_upload_prompt(&mut self) {
        self.upload_path.clear();
        self.popup = Some(Popup::UploadPath);
    }

    /// Validate the path cheaply, then read the file off the event loop.
    pub fn request_upload(&mut self, raw_path: &str) {
        let path = clean_dropped_path(raw_path);
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if filename.is_empty() {
            return;
        }
        if self.uploads.is_transferring() {
            self.notice = Some(ValidationError::UploadInProgress.to_string());
            return;
        }
        if DocumentKind::from_filename(&filename).is_none() {
            self.notice = Some(ValidationError::UnsupportedType { filename }.to_string());
            return;
        }

        self.notice = None;
        let tx = self.events.clone();
        tokio::spawn(async move {
            let loaded = UploadFile::from_path(&path)
                .await
                .map_err(|e| format!("Could not read {}: {}", path.display(), e));
            let _ = tx.send(AppEvent::FileLoaded(loaded));
        });
    }

    pub fn on_file_loaded(&mut self, loaded: Result<UploadFile, String>) {
        let file = match loaded {
            Ok(file) => file,
            Err(message) => {
                self.notice = Some(message);
                return;
            }
        };
        match self.uploads.start(&file) {
            Ok(task) => self.spawn_upload(task, file),
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    fn spawn_upload(&mut self, task: Uuid, file: UploadFile) {
        let backend = self.backend.clone();
        let tx = self.events.clone();
        let tx_progress = self.events.clone();
        self.upload_task = Some(tokio::spawn(async move {
            let sink = Arc::new(move |percent: u8| {
                let _ = tx_progress.send(AppEvent::UploadProgress { task, percent });
            });
            let outcome = backend.upload(&file, sink).await;
            let _ = tx.send(AppEvent::UploadFinished { task, outcome });
        }));
    }

    pub fn on_upload_progress(&mut self, task: Uuid, percent: u8) {
        self.uploads.record_progress(task, percent);
    }

    pub fn on_upload_finished(&mut self, task: Uuid, outcome: Result<UploadReceipt, TransportError>) {
        self.upload_task = None;
        let uploaded = match self.uploads.finish(task, outcome, Instant::now()) {
            Some(done) if done.phase == UploadPhase::Succeeded => Some(done.filename.clone()),
            _ => None,
        };
        if let Some(filename) = uploaded {
            self.conversation.note(format!(
                "📄 Document \"{}\" has been uploaded and processed. You can now ask questions about it.",
                filename
            ));
            self.refresh_documents();
        }
    }

    pub fn dismiss_upload(&mut self) -> bool {
        self.uploads.dismiss()
    }

    // Document directory actions
    pub fn refresh_documents(&mut self) {
        let backend = self.backend.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let _ = tx.send(AppEvent::Documents(backend.list_documents().await));
        });
    }

    pub fn on_documents(&mut self, outcome: Result<Vec<RemoteDocument>, TransportError>) {
        // A failed listing says nothing about which documents exist, so the
        // selection is only checked against a successful one
        if self.directory.apply(outcome).is_ok() {
            self.conversation.retain_selection(&self.directory);
        }

        let len = self.directory.len();
        if len == 0 {
            self.documents_state.select(None);
        } else {
            let i = self.documents_state.selected().unwrap_or(0).min(len - 1);
            self.documents_state.select(Some(i));
        }
    }

    pub fn on_health(&mut self, outcome: Result<HealthStatus, TransportError>) {
        let online = matches!(&outcome, Ok(status) if status.is_healthy());
        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "backend health check failed");
        }
        self.backend_online = Some(online);
    }

    pub fn documents_nav_down(&mut self) {
        let len = self.directory.len();
        if len > 0 {
            let i = self.documents_state.selected().unwrap_or(0);
            self.documents_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn documents_nav_up(&mut self) {
        let i = self.documents_state.selected().unwrap_or(0);
        self.documents_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_highlighted_document(&mut self) {
        let doc = self
            .documents_state
            .selected()
            .and_then(|i| self.directory.documents().get(i))
            .cloned();
        if doc.is_some() {
            self.conversation.select_document(doc.as_ref());
        }
    }

    pub fn clear_document_selection(&mut self) {
        self.conversation.select_document(None);
    }

    pub fn toggle_sidebar(&mut self) {
        self.show_sidebar = !self.show_sidebar;
        if !self.show_sidebar {
            self.focus = FocusPane::Chat;
        }
    }

    pub fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            FocusPane::Chat if self.show_sidebar => FocusPane::Documents,
            _ => FocusPane::Chat,
        };
    }

    // Onboarding
    pub fn submit_welcome(&mut self) {
        match CompanyProfile::new(&self.welcome.name.text, &self.welcome.purpose.text) {
            Ok(profile) => {
                if let Some(store) = &self.profile_store {
                    if let Err(e) = store.save(&profile) {
                        tracing::warn!(error = %e, "could not save onboarding profile");
                    }
                }
                self.profile = Some(profile);
                self.welcome = WelcomeForm::default();
                self.popup = None;
            }
            Err(e) => self.welcome.error = Some(e.to_string()),
        }
    }

    /// Close the form for this session only; it is shown again next start.
    pub fn skip_welcome(&mut self) {
        self.popup = None;
    }

    // Scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_output = false;
        self.chat_scroll = self.chat_scroll.min(self.chat_max_scroll).saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.chat_max_scroll);
        if self.chat_scroll >= self.chat_max_scroll {
            self.follow_output = true;
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_output = true;
        self.chat_scroll = self.chat_max_scroll;
    }

    /// Called by the renderer with the wrapped height of the chat content.
    /// New messages re-engage following.
    pub fn update_chat_layout(&mut self, content_lines: u16, visible_height: u16) {
        self.chat_height = visible_height;
        self.chat_max_scroll = content_lines.saturating_sub(visible_height);

        let count = self.conversation.messages().len();
        if count != self.seen_messages {
            self.seen_messages = count;
            self.follow_output = true;
        }
        if self.follow_output {
            self.chat_scroll = self.chat_max_scroll;
        } else {
            self.chat_scroll = self.chat_scroll.min(self.chat_max_scroll);
        }
    }

    /// Tick animation frame and expire the upload banner (called by Tick event)
    pub fn tick(&mut self, now: Instant) {
        if self.conversation.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.uploads.expire(now);
    }

    /// Abort background work and leave.
    pub fn quit(&mut self) {
        self.abort_ask();
        if let Some(task) = self.upload_task.take() {
            task.abort();
        }
        self.should_quit = true;
    }
}

/// Normalize a path typed or dropped into the terminal: surrounding quotes,
/// `file://` prefixes, backslash-escaped spaces and a leading `~`.
pub fn clean_dropped_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
        .unwrap_or(trimmed);
    let unprefixed = unquoted.strip_prefix("file://").unwrap_or(unquoted);
    let unescaped = unprefixed.replace("\\ ", " ");

    match unescaped.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(&unescaped),
        },
        None => Path::new(&unescaped).to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_core::{ChatRole, ProgressSink};
    use tokio::sync::mpsc;

    struct EchoBackend;

    #[async_trait::async_trait]
    impl Backend for EchoBackend {
        async fn ask(&self, request: &AskRequest) -> Result<AskResponse, TransportError> {
            Ok(AskResponse {
                response: format!("echo: {}", request.question),
                sources: Vec::new(),
            })
        }

        async fn upload(
            &self,
            _file: &UploadFile,
            progress: Arc<dyn ProgressSink>,
        ) -> Result<UploadReceipt, TransportError> {
            progress.progress(50);
            progress.progress(100);
            Ok(UploadReceipt {
                message: None,
                success: true,
                filename: None,
            })
        }

        async fn list_documents(&self) -> Result<Vec<RemoteDocument>, TransportError> {
            Ok(vec![RemoteDocument {
                id: None,
                name: "policy.pdf".to_string(),
                size: 2048,
                last_modified: None,
            }])
        }

        async fn health(&self) -> Result<HealthStatus, TransportError> {
            Ok(HealthStatus {
                status: "healthy".to_string(),
            })
        }
    }

    fn app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let config = Config {
            announce_selection: Some(false),
            ..Config::new()
        };
        (App::new(Arc::new(EchoBackend), tx, &config, None), rx)
    }

    #[test]
    fn test_text_input_is_utf8_safe() {
        let mut input = TextInput::default();
        input.insert_str("héllo");
        input.left();
        input.left();
        input.backspace();
        assert_eq!(input.text, "hélo");
        input.home();
        input.delete();
        assert_eq!(input.text, "élo");
        input.end();
        input.insert('!');
        assert_eq!(input.text, "élo!");
    }

    #[test]
    fn test_pasted_line_breaks_become_spaces() {
        let mut input = TextInput::default();
        input.insert_str("line one\nline two\r\nline\tthree");
        assert_eq!(input.text, "line one line two linethree");
        assert_eq!(input.cursor, input.text.chars().count());
    }

    #[test]
    fn test_clean_dropped_path() {
        assert_eq!(clean_dropped_path(" '/tmp/my file.pdf' "), PathBuf::from("/tmp/my file.pdf"));
        assert_eq!(clean_dropped_path("/tmp/my\\ file.pdf"), PathBuf::from("/tmp/my file.pdf"));
        assert_eq!(clean_dropped_path("file:///tmp/a.txt"), PathBuf::from("/tmp/a.txt"));
        assert_eq!(clean_dropped_path("\"/tmp/b.pdf\""), PathBuf::from("/tmp/b.pdf"));
    }

    #[tokio::test]
    async fn test_blank_submit_changes_nothing() {
        let (mut app, _rx) = app();
        app.input.insert_str("   ");
        app.submit_input();
        assert_eq!(app.conversation.messages().len(), 1);
        assert!(app.ask_task.is_none());
        assert_eq!(app.input.text, "   ");
    }

    #[tokio::test]
    async fn test_submit_round_trip_through_event_channel() {
        let (mut app, mut rx) = app();
        app.input.insert_str("What is the refund policy?");
        app.submit_input();

        assert!(app.input.text.is_empty());
        assert_eq!(app.conversation.messages().len(), 2);
        assert!(app.conversation.is_waiting());

        match rx.recv().await {
            Some(AppEvent::Answer { ask, outcome }) => app.on_answer(ask, outcome),
            other => panic!("unexpected event {:?}", other),
        }
        let last = app.conversation.messages().last().unwrap();
        assert_eq!(last.role, ChatRole::Assistant);
        assert_eq!(last.content, "echo: What is the refund policy?");
        assert!(!app.conversation.is_waiting());
    }

    #[tokio::test]
    async fn test_second_submit_while_waiting_shows_notice() {
        let (mut app, _rx) = app();
        app.input.insert_str("first");
        app.submit_input();
        app.input.insert_str("second");
        app.submit_input();
        assert_eq!(app.conversation.messages().len(), 2);
        assert_eq!(app.input.text, "second");
        assert!(app.notice.is_some());
    }

    #[tokio::test]
    async fn test_cancel_ask_appends_cancelled_reply() {
        let (mut app, _rx) = app();
        app.input.insert_str("question");
        app.submit_input();
        assert!(app.cancel_ask());
        let last = app.conversation.messages().last().unwrap();
        assert!(last.is_error);
        assert!(!app.conversation.is_waiting());
    }

    #[tokio::test]
    async fn test_stale_answer_after_cancel_is_ignored() {
        let (mut app, mut rx) = app();
        app.input.insert_str("first");
        app.submit_input();
        let stale = match rx.recv().await {
            Some(AppEvent::Answer { ask, outcome }) => (ask, outcome),
            other => panic!("unexpected event {:?}", other),
        };
        app.cancel_ask();

        app.input.insert_str("second");
        app.submit_input();
        app.on_answer(stale.0, stale.1);
        assert!(app.conversation.is_waiting());
        assert_eq!(app.conversation.messages().last().unwrap().content, "second");
    }

    #[tokio::test]
    async fn test_unsupported_upload_is_rejected_before_reading() {
        let (mut app, mut rx) = app();
        app.request_upload("/tmp/report.docx");
        assert!(app.notice.as_deref().unwrap().contains("report.docx"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_upload_flow_refreshes_documents() {
        let (mut app, mut rx) = app();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.pdf");
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();

        app.request_upload(path.to_str().unwrap());

        let mut refreshed = false;
        while let Some(event) = rx.recv().await {
            match event {
                AppEvent::FileLoaded(loaded) => app.on_file_loaded(loaded),
                AppEvent::UploadProgress { task, percent } => app.on_upload_progress(task, percent),
                AppEvent::UploadFinished { task, outcome } => {
                    app.on_upload_finished(task, outcome);
                    assert_eq!(app.uploads.current().unwrap().phase, UploadPhase::Succeeded);
                    assert_eq!(app.uploads.current().unwrap().progress_percent, 100);
                }
                AppEvent::Documents(outcome) => {
                    app.on_documents(outcome);
                    refreshed = true;
                    break;
                }
                _ => {}
            }
        }

        assert!(refreshed);
        assert!(app.directory.contains("policy.pdf"));
        assert_eq!(app.documents_state.selected(), Some(0));
        let last = app.conversation.messages().last().unwrap();
        assert_eq!(last.role, ChatRole::System);
        assert!(last.content.contains("policy.pdf"));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_document_selection() {
        let (mut app, _rx) = app();
        app.on_documents(EchoBackend.list_documents().await);
        app.select_highlighted_document();
        assert_eq!(app.conversation.active_document().map(|doc| doc.id.as_str()), Some("policy.pdf"));

        app.on_documents(Err(TransportError::Timeout));
        assert!(app.directory.failure().is_some());
        assert_eq!(app.conversation.active_document().map(|doc| doc.id.as_str()), Some("policy.pdf"));

        let request = app.conversation.begin_send("What is covered?").unwrap();
        assert_eq!(request.document_id.as_deref(), Some("policy.pdf"));
    }

    #[tokio::test]
    async fn test_successful_refresh_drops_unlisted_selection() {
        let (mut app, _rx) = app();
        app.on_documents(EchoBackend.list_documents().await);
        app.select_highlighted_document();

        app.on_documents(Ok(Vec::new()));
        assert!(app.conversation.active_document().is_none());
    }

    #[tokio::test]
    async fn test_clear_goes_through_confirmation() {
        let (mut app, _rx) = app();
        app.input.insert_str("question");
        app.submit_input();
        app.request_clear();
        assert_eq!(app.popup, Some(Popup::ConfirmClear));
        app.cancel_clear();
        assert_eq!(app.conversation.messages().len(), 2);

        app.request_clear();
        app.confirm_clear();
        assert_eq!(app.popup, None);
        assert_eq!(app.conversation.messages().len(), 1);
    }

    #[test]
    fn test_welcome_form_requires_fields() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let dir = tempfile::tempdir().unwrap();
        let store = ProfileStore::new(dir.path().join("profile.json"));
        let mut app = App::new(Arc::new(EchoBackend), tx, &Config::new(), Some(store.clone()));
        assert_eq!(app.popup, Some(Popup::Welcome));

        app.welcome.name.insert_str("Acme");
        app.submit_welcome();
        assert_eq!(app.popup, Some(Popup::Welcome));
        assert!(app.welcome.error.is_some());

        app.welcome.purpose.insert_str("Home insurance");
        app.submit_welcome();
        assert_eq!(app.popup, None);
        assert_eq!(store.load().unwrap().unwrap().name, "Acme");
    }

    #[test]
    fn test_scrolling_away_disengages_follow() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(Arc::new(EchoBackend), tx, &Config::new(), None);
        app.update_chat_layout(50, 20);
        assert_eq!(app.chat_scroll, 30);

        app.scroll_up(5);
        assert!(!app.follow_output);
        app.update_chat_layout(60, 20);
        assert_eq!(app.chat_scroll, 25);

        app.scroll_down(100);
        assert!(app.follow_output);
        assert_eq!(app.chat_scroll, 40);
    }

    #[test]
    fn test_new_message_reengages_follow() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(Arc::new(EchoBackend), tx, &Config::new(), None);
        app.update_chat_layout(50, 20);
        app.scroll_up(10);
        app.conversation.note("Document uploaded");
        app.update_chat_layout(54, 20);
        assert!(app.follow_output);
        assert_eq!(app.chat_scroll, 34);
    }
}
