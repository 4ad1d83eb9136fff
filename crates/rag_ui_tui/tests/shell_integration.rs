//! Integration tests for the terminal shell: key handling drives real requests
//! against an in-process HTTP backend, and frames are rendered to a test buffer.

use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rag_ui_client::storage::TAB_KEY;
use rag_ui_client::{
    ApiClient, Config, EntryStatus, FileStorage, MemoryStorage, SharedStorage, Storage, Tab,
};
use rag_ui_tui::app::{App, AppEvent};
use rag_ui_tui::ui;
use ratatui::backend::TestBackend;
use ratatui::Terminal;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

async fn spawn_backend() -> String {
    async fn chat(Json(_body): Json<Value>) -> Json<Value> {
        Json(json!({
            "answer": "X is...",
            "references": [{
                "document_id": 1,
                "filename": "a.txt",
                "score": 0.87,
                "chunk_ord": 0,
                "preview": "X is a..."
            }]
        }))
    }

    async fn ingest(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
        while let Some(field) = multipart.next_field().await.unwrap() {
            if field.name() == Some("file") {
                let bytes = field.bytes().await.unwrap();
                if bytes.is_empty() {
                    return (StatusCode::BAD_REQUEST, Json(json!({"detail": "empty file"})));
                }
                return (StatusCode::OK, Json(json!({"ok": true, "chunks": 2})));
            }
        }
        (StatusCode::BAD_REQUEST, Json(json!({"detail": "no file"})))
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new()
        .route("/chat", post(chat))
        .route("/ingest", post(ingest));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn new_app(base: &str, store: SharedStorage) -> (App, mpsc::UnboundedReceiver<AppEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let client = ApiClient::new(base).unwrap();
    (App::new(client, store, &Config::default(), tx), rx)
}

fn type_text(app: &mut App, text: &str) {
    for c in text.chars() {
        app.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
    }
}

fn enter(app: &mut App) {
    app.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> AppEvent {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("request should finish")
        .expect("channel open")
}

/// Render one frame and return it as text rows.
fn render(app: &App) -> Vec<String> {
    let width = 120;
    let mut terminal = Terminal::new(TestBackend::new(width, 40)).unwrap();
    terminal.draw(|f| ui::draw(f, app)).unwrap();
    terminal
        .backend()
        .buffer()
        .content()
        .chunks(width as usize)
        .map(|row| row.iter().map(|c| c.symbol()).collect())
        .collect()
}

fn screen_contains(rows: &[String], needle: &str) -> bool {
    rows.iter().any(|r| r.contains(needle))
}

#[tokio::test]
async fn chat_question_round_trip_renders_reference_score() {
    let base = spawn_backend().await;
    let (mut app, mut rx) = new_app(&base, MemoryStorage::shared());

    type_text(&mut app, "What is X?");
    enter(&mut app);
    assert_eq!(app.chat.entries().len(), 1);
    assert_eq!(app.chat.entries()[0].status(), EntryStatus::Pending);
    assert_eq!(app.chat.input(), "");
    assert!(screen_contains(&render(&app), "Thinking..."));

    // A second Enter while waiting is ignored.
    type_text(&mut app, "again");
    enter(&mut app);
    assert_eq!(app.chat.entries().len(), 1);

    let event = next_event(&mut rx).await;
    app.apply(event);
    let entry = &app.chat.entries()[0];
    assert_eq!(entry.status(), EntryStatus::Success);
    assert_eq!(entry.answer(), "X is...");

    let rows = render(&app);
    assert!(screen_contains(&rows, "What is X?"));
    assert!(screen_contains(&rows, "X is..."));
    assert!(screen_contains(&rows, "(0.870)"));
    assert!(screen_contains(&rows, "[1]"));
}

#[tokio::test]
async fn empty_upload_shows_status_and_hint() {
    let base = spawn_backend().await;
    let (mut app, mut rx) = new_app(&base, MemoryStorage::shared());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.txt");
    std::fs::write(&path, b"").unwrap();

    app.handle_key(KeyEvent::new(KeyCode::F(2), KeyModifiers::NONE));
    type_text(&mut app, path.to_str().unwrap());
    enter(&mut app);
    assert!(app.upload.is_uploading());

    let event = next_event(&mut rx).await;
    app.apply(event);
    let error = app.upload.error().expect("upload should fail");
    assert!(error.message.contains("400"));

    let rows = render(&app);
    assert!(screen_contains(&rows, "HTTP 400"));
    assert!(screen_contains(&rows, "UTF-8"));
}

#[tokio::test]
async fn successful_upload_renders_json() {
    let base = spawn_backend().await;
    let (mut app, mut rx) = new_app(&base, MemoryStorage::shared());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.txt");
    std::fs::write(&path, "hello world").unwrap();

    app.shell.select(Tab::Upload);
    app.upload_path = path.display().to_string();
    assert!(app.submit_upload());
    assert!(!app.submit_upload(), "second upload while one is running");

    let event = next_event(&mut rx).await;
    app.apply(event);
    assert_eq!(app.upload.progress(), 100);
    let rows = render(&app);
    assert!(screen_contains(&rows, "\"chunks\": 2"));
    assert!(screen_contains(&rows, "100%"));
}

#[tokio::test]
async fn stored_upload_tab_opens_upload_view() {
    let dir = tempfile::tempdir().unwrap();
    let store: SharedStorage = Arc::new(FileStorage::new(dir.path()));
    store.set_item(TAB_KEY, "upload").unwrap();

    let (app, _rx) = new_app("http://127.0.0.1:9", store.clone());
    assert_eq!(app.shell.active(), Tab::Upload);
    assert!(screen_contains(&render(&app), "File path"));

    // Switching back is remembered for the next start.
    let (mut app, _rx) = new_app("http://127.0.0.1:9", store.clone());
    app.handle_key(KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE));
    let (app, _rx) = new_app("http://127.0.0.1:9", store);
    assert_eq!(app.shell.active(), Tab::Chat);
    assert!(screen_contains(&render(&app), "Ask a question to start"));
}

#[tokio::test]
async fn chat_history_is_restored_on_restart() {
    let base = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let store: SharedStorage = Arc::new(FileStorage::new(dir.path()));

    let (mut app, mut rx) = new_app(&base, store.clone());
    type_text(&mut app, "What is X?");
    enter(&mut app);
    let event = next_event(&mut rx).await;
    app.apply(event);
    drop(app);

    let (app, _rx) = new_app(&base, store);
    assert_eq!(app.chat.entries().len(), 1);
    assert_eq!(app.chat.entries()[0].answer(), "X is...");
    assert!(screen_contains(&render(&app), "(0.870)"));
}
