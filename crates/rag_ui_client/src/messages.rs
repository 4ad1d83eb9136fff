//! HTTP message types for the `/chat` and `/ingest` endpoints. Client ↔ backend JSON.

use serde::{Deserialize, Deserializer, Serialize};

/// Number of chunks the backend should retrieve per question.
pub const DEFAULT_TOP_K: u32 = 6;

/// Client → backend: `POST /chat` body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub question: &'a str,
    pub top_k: u32,
}

impl<'a> ChatRequest<'a> {
    pub fn new(question: &'a str, top_k: u32) -> Self {
        Self { question, top_k }
    }
}

/// One retrieved chunk the answer was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub document_id: i64,
    pub filename: String,
    pub score: f64,
    pub chunk_ord: i64,
    pub preview: String,
}

/// Backend → client: `POST /chat` response. Missing or null fields fall back to empty values.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub references: Vec<Reference>,
}

/// Error body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// `detail` as display text. Strings are used as-is, anything else is serialized to JSON.
    /// Empty strings and nulls count as absent.
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
