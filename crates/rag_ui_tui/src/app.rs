//! Shell state and input handling.
//!
//! Requests run on spawned tasks; their outcomes come back as [`AppEvent`]s and
//! are applied on the UI task, so view state is only ever touched from one place.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use rag_ui_client::{
    ApiClient, ChatResponse, ChatView, ClientError, Config, EntryId, SelectedFile, SharedStorage,
    Shell, Tab, UploadView,
};
use tokio::sync::mpsc;

/// Outcome of a background request.
#[derive(Debug)]
pub enum AppEvent {
    ChatFinished {
        id: EntryId,
        result: Result<ChatResponse, ClientError>,
    },
    UploadFinished(Result<serde_json::Value, ClientError>),
}

pub struct App {
    pub shell: Shell,
    pub chat: ChatView,
    pub upload: UploadView,
    /// Path typed into the Upload tab.
    pub upload_path: String,
    /// Problem with the typed path (missing file, directory...).
    pub upload_notice: Option<String>,
    /// Lines scrolled up from the bottom of the conversation.
    pub chat_scroll: u16,
    pub should_quit: bool,
    client: ApiClient,
    events: mpsc::UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(
        client: ApiClient,
        store: SharedStorage,
        config: &Config,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            shell: Shell::load(store.clone()),
            chat: ChatView::with_top_k(store, config.top_k()),
            upload: UploadView::new(config.slow_upload_threshold()),
            upload_path: String::new(),
            upload_notice: None,
            chat_scroll: 0,
            should_quit: false,
            client,
            events,
        }
    }

    pub fn base_url(&self) -> &str {
        self.client.base_url()
    }

    /// Send the chat input. Returns `false` when the view refused it.
    pub fn submit_chat(&mut self) -> bool {
        let Some(pending) = self.chat.begin_submit() else {
            return false;
        };
        self.chat_scroll = 0;
        let client = self.client.clone();
        let top_k = self.chat.top_k();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.chat(&pending.question, top_k).await;
            let _ = events.send(AppEvent::ChatFinished {
                id: pending.id,
                result,
            });
        });
        true
    }

    /// Select the typed path if it differs from the current selection, then start
    /// the upload. Returns `false` when nothing was sent.
    pub fn submit_upload(&mut self) -> bool {
        if self.upload.is_uploading() {
            return false;
        }
        let path = self.upload_path.trim();
        let already_selected = self
            .upload
            .file()
            .is_some_and(|f| f.path.as_os_str() == path);
        if !already_selected {
            if path.is_empty() {
                self.upload.select_file(None);
                self.upload_notice = None;
                return false;
            }
            match SelectedFile::from_path(path) {
                Ok(file) => {
                    self.upload_notice = None;
                    self.upload.select_file(Some(file));
                }
                Err(e) => {
                    self.upload.select_file(None);
                    self.upload_notice = Some(e.to_string());
                    return false;
                }
            }
        }

        let Some(job) = self.upload.begin_submit() else {
            return false;
        };
        let client = self.client.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = client.ingest(&job.file, job.progress_callback()).await;
            let _ = events.send(AppEvent::UploadFinished(result));
        });
        true
    }

    /// Apply a finished request to view state.
    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::ChatFinished { id, result } => self.chat.complete(&id, result),
            AppEvent::UploadFinished(result) => self.upload.complete(result),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if self.handle_global_key(&key) {
            return;
        }
        match self.shell.active() {
            Tab::Chat => self.handle_chat_key(&key),
            Tab::Upload => self.handle_upload_key(&key),
        }
    }

    fn handle_global_key(&mut self, key: &KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => self.should_quit = true,
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab | KeyCode::BackTab => self.shell.toggle(),
            KeyCode::F(1) => self.shell.select(Tab::Chat),
            KeyCode::F(2) => self.shell.select(Tab::Upload),
            _ => return false,
        }
        true
    }

    fn handle_chat_key(&mut self, key: &KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('l') if ctrl => {
                if self.chat.clear_history() {
                    self.chat_scroll = 0;
                }
            }
            KeyCode::Char(c) if !ctrl => self.chat.push_input(c),
            KeyCode::Backspace => self.chat.pop_input(),
            KeyCode::Enter => {
                self.submit_chat();
            }
            KeyCode::Up => self.chat_scroll = self.chat_scroll.saturating_add(1),
            KeyCode::Down => self.chat_scroll = self.chat_scroll.saturating_sub(1),
            KeyCode::PageUp => self.chat_scroll = self.chat_scroll.saturating_add(10),
            KeyCode::PageDown => self.chat_scroll = self.chat_scroll.saturating_sub(10),
            KeyCode::End => self.chat_scroll = 0,
            _ => {}
        }
    }

    fn handle_upload_key(&mut self, key: &KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char(c) if !ctrl => self.upload_path.push(c),
            KeyCode::Backspace => {
                self.upload_path.pop();
            }
            KeyCode::Enter => {
                self.submit_upload();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_ui_client::MemoryStorage;

    fn app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = ApiClient::new("http://127.0.0.1:9").unwrap();
        let app = App::new(client, MemoryStorage::shared(), &Config::default(), tx);
        (app, rx)
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn tab_keys_switch_views() {
        let (mut app, _rx) = app();
        assert_eq!(app.shell.active(), Tab::Chat);
        app.handle_key(press(KeyCode::Tab));
        assert_eq!(app.shell.active(), Tab::Upload);
        app.handle_key(press(KeyCode::F(1)));
        assert_eq!(app.shell.active(), Tab::Chat);
        app.handle_key(press(KeyCode::F(2)));
        assert_eq!(app.shell.active(), Tab::Upload);
    }

    #[test]
    fn typing_goes_to_the_active_tab() {
        let (mut app, _rx) = app();
        app.handle_key(press(KeyCode::Char('h')));
        app.handle_key(press(KeyCode::Char('i')));
        app.handle_key(press(KeyCode::Backspace));
        assert_eq!(app.chat.input(), "h");

        app.handle_key(press(KeyCode::Tab));
        app.handle_key(press(KeyCode::Char('/')));
        assert_eq!(app.upload_path, "/");
        assert_eq!(app.chat.input(), "h");
    }

    #[test]
    fn blank_chat_submit_sends_nothing() {
        let (mut app, mut rx) = app();
        app.handle_key(press(KeyCode::Char(' ')));
        app.handle_key(press(KeyCode::Enter));
        assert!(app.chat.entries().is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn missing_upload_path_sets_notice() {
        let (mut app, _rx) = app();
        app.upload_path = "/definitely/not/here.txt".into();
        assert!(!app.submit_upload());
        assert!(app.upload_notice.is_some());
        assert!(app.upload.file().is_none());
        assert!(!app.upload.is_uploading());
    }

    #[test]
    fn escape_and_ctrl_c_quit() {
        let (mut app, _rx) = app();
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit);

        let (mut app, _rx) = self::app();
        app.handle_key(press(KeyCode::Esc));
        assert!(app.should_quit);
    }
}
