//! Chat view state: conversation entries, the in-flight guard and history persistence.
//!
//! History is loaded from the store once when the view is created and written
//! back after every change to the entry list.

use serde::{Deserialize, Serialize};

use crate::client::{ChatBackend, ClientError};
use crate::messages::{null_as_default, ChatResponse, Reference, DEFAULT_TOP_K};
use crate::storage::{SharedStorage, HISTORY_KEY};

/// Shown when neither the backend nor the transport says what went wrong.
pub const FALLBACK_ERROR: &str = "Request failed";
/// Error given to entries that were still pending when the history was saved.
pub const INTERRUPTED_ERROR: &str = "The request was interrupted before an answer arrived";

/// Opaque unique entry id.
pub type EntryId = String;

fn new_entry_id() -> EntryId {
    uuid::Uuid::new_v4().to_string()
}

/// Entry lifecycle. Pending entries move to exactly one terminal state.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryState {
    Pending,
    Success {
        answer: String,
        references: Vec<Reference>,
    },
    Error {
        message: String,
    },
}

/// Status tag of an entry, as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Success,
    Error,
}

/// One question and its answer (or error).
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationEntry {
    pub id: EntryId,
    pub question: String,
    pub state: EntryState,
}

impl ConversationEntry {
    pub fn status(&self) -> EntryStatus {
        match self.state {
            EntryState::Pending => EntryStatus::Pending,
            EntryState::Success { .. } => EntryStatus::Success,
            EntryState::Error { .. } => EntryStatus::Error,
        }
    }

    /// Answer text; empty unless the entry succeeded.
    pub fn answer(&self) -> &str {
        match &self.state {
            EntryState::Success { answer, .. } => answer,
            _ => "",
        }
    }

    pub fn references(&self) -> &[Reference] {
        match &self.state {
            EntryState::Success { references, .. } => references,
            _ => &[],
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            EntryState::Error { message } => Some(message),
            _ => None,
        }
    }
}

/// Flat on-disk shape of an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    id: String,
    #[serde(default)]
    question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    references: Vec<Reference>,
    status: EntryStatus,
    #[serde(
        rename = "errorMessage",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    error_message: Option<String>,
}

impl From<&ConversationEntry> for StoredEntry {
    fn from(entry: &ConversationEntry) -> Self {
        Self {
            id: entry.id.clone(),
            question: entry.question.clone(),
            answer: entry.answer().to_string(),
            references: entry.references().to_vec(),
            status: entry.status(),
            error_message: entry.error_message().map(str::to_string),
        }
    }
}

impl From<StoredEntry> for ConversationEntry {
    fn from(stored: StoredEntry) -> Self {
        let state = match stored.status {
            EntryStatus::Success => EntryState::Success {
                answer: stored.answer,
                references: stored.references,
            },
            EntryStatus::Error => EntryState::Error {
                message: stored
                    .error_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| FALLBACK_ERROR.to_string()),
            },
            // Nothing will ever complete a request from a previous run.
            EntryStatus::Pending => EntryState::Error {
                message: INTERRUPTED_ERROR.to_string(),
            },
        };
        Self {
            id: stored.id,
            question: stored.question,
            state,
        }
    }
}

/// Decode stored history. Corrupt data yields an empty history and a warning.
pub fn decode_history(raw: &str) -> Vec<ConversationEntry> {
    match serde_json::from_str::<Vec<StoredEntry>>(raw) {
        Ok(stored) => stored.into_iter().map(ConversationEntry::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "discarding corrupt chat history");
            Vec::new()
        }
    }
}

/// Encode history in its flat stored shape, in display order.
pub fn encode_history(entries: &[ConversationEntry]) -> Result<String, serde_json::Error> {
    let stored: Vec<StoredEntry> = entries.iter().map(StoredEntry::from).collect();
    serde_json::to_string(&stored)
}

/// Load history from the store. Read failures are logged and yield an empty history.
pub fn load_history(store: &SharedStorage) -> Vec<ConversationEntry> {
    match store.get_item(HISTORY_KEY) {
        Ok(Some(raw)) => decode_history(&raw),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to read chat history");
            Vec::new()
        }
    }
}

/// Message shown for a failed request: backend `detail`, then the transport
/// message, then [`FALLBACK_ERROR`].
pub fn error_message(err: &ClientError) -> String {
    if let Some(detail) = err.detail().filter(|d| !d.trim().is_empty()) {
        return detail.to_string();
    }
    let text = err.to_string();
    if text.trim().is_empty() {
        FALLBACK_ERROR.to_string()
    } else {
        text
    }
}

/// A question accepted for sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuestion {
    pub id: EntryId,
    pub question: String,
}

/// Chat panel state.
pub struct ChatView {
    store: SharedStorage,
    entries: Vec<ConversationEntry>,
    input: String,
    in_flight: Option<EntryId>,
    top_k: u32,
}

impl std::fmt::Debug for ChatView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatView")
            .field("entries", &self.entries)
            .field("input", &self.input)
            .field("in_flight", &self.in_flight)
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl ChatView {
    /// Create the view and rehydrate its history from `store`.
    pub fn new(store: SharedStorage) -> Self {
        Self::with_top_k(store, DEFAULT_TOP_K)
    }

    pub fn with_top_k(store: SharedStorage, top_k: u32) -> Self {
        let entries = load_history(&store);
        tracing::debug!(entries = entries.len(), "chat history loaded");
        Self {
            store,
            entries,
            input: String::new(),
            in_flight: None,
            top_k,
        }
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn top_k(&self) -> u32 {
        self.top_k
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn push_input(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn pop_input(&mut self) {
        self.input.pop();
    }

    /// True when the most recent entry ended in an error.
    pub fn last_failed(&self) -> bool {
        self.entries
            .last()
            .is_some_and(|e| e.status() == EntryStatus::Error)
    }

    /// Submit the current input buffer. See [`ChatView::begin`].
    pub fn begin_submit(&mut self) -> Option<PendingQuestion> {
        let question = self.input.clone();
        self.begin(&question)
    }

    /// Append a pending entry for `question` and clear the input. `None` (and no
    /// state change) for blank questions or while another request is in flight.
    pub fn begin(&mut self, question: &str) -> Option<PendingQuestion> {
        let question = question.trim();
        if question.is_empty() || self.in_flight.is_some() {
            return None;
        }
        let id = new_entry_id();
        self.entries.push(ConversationEntry {
            id: id.clone(),
            question: question.to_string(),
            state: EntryState::Pending,
        });
        self.input.clear();
        self.in_flight = Some(id.clone());
        self.persist();
        Some(PendingQuestion {
            id,
            question: question.to_string(),
        })
    }

    /// Apply the outcome of the request for entry `id`.
    pub fn complete(&mut self, id: &str, result: Result<ChatResponse, ClientError>) {
        if self.in_flight.as_deref() == Some(id) {
            self.in_flight = None;
        }
        let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.id == id && e.state == EntryState::Pending)
        else {
            tracing::warn!(%id, "chat completion for unknown or finished entry");
            return;
        };
        entry.state = match result {
            Ok(response) => EntryState::Success {
                answer: response.answer,
                references: response.references,
            },
            Err(err) => {
                tracing::debug!(error = %err, "chat request failed");
                EntryState::Error {
                    message: error_message(&err),
                }
            }
        };
        self.persist();
    }

    /// Send `question` to `backend` and apply the outcome. Returns `false` when
    /// the submit was a no-op.
    pub async fn submit<B: ChatBackend>(&mut self, backend: &B, question: &str) -> bool {
        let Some(pending) = self.begin(question) else {
            return false;
        };
        let result = backend.chat(&pending.question, self.top_k).await;
        self.complete(&pending.id, result);
        true
    }

    /// Drop all entries. Ignored while a request is in flight.
    pub fn clear_history(&mut self) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        self.entries.clear();
        if let Err(e) = self.store.remove_item(HISTORY_KEY) {
            tracing::warn!(error = %e, "failed to remove chat history");
        }
        true
    }

    fn persist(&self) {
        let encoded = match encode_history(&self.entries) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode chat history");
                return;
            }
        };
        if let Err(e) = self.store.set_item(HISTORY_KEY, &encoded) {
            tracing::warn!(error = %e, "failed to save chat history");
        }
    }
}
