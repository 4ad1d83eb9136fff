//! RAG chatbot client library (HTTP client, chat/upload/shell view state, local store, config).
//! Used by the headless `rag-ui` binary and the `rag-ui-tui` terminal shell.

pub mod chat;
pub mod client;
pub mod config;
pub mod messages;
pub mod render;
pub mod shell;
pub mod storage;
pub mod upload;

pub use chat::{ChatView, ConversationEntry, EntryId, EntryState, EntryStatus, PendingQuestion};
pub use client::{ApiClient, ChatBackend, ClientError, IngestBackend, DEFAULT_BASE_URL};
pub use config::{default_config_path, Config, ConfigError};
pub use messages::{ChatResponse, Reference};
pub use shell::{Shell, Tab};
pub use storage::{FileStorage, MemoryStorage, SharedStorage, Storage, StorageError};
pub use upload::{SelectedFile, UploadError, UploadJob, UploadView};
