//! HTTP client: `POST /chat` (JSON) and `POST /ingest` (multipart, with upload progress).

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use std::future::Future;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;

use crate::messages::{ChatRequest, ChatResponse, ErrorBody};
use crate::upload::SelectedFile;

/// Base URL used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8010";

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Request error. Views turn these into display state; they never propagate further.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// No response was received (connection refused, DNS, TLS, ...).
    #[error("{0}")]
    Transport(String),
    /// The backend answered with a non-2xx status.
    #[error("request failed with status code {status}")]
    Status { status: u16, detail: Option<String> },
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("failed to read {path:?}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// HTTP status code, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Structured `detail` from the backend's error body.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ClientError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Decode(e.to_string())
    }
}

/// Anything that can answer a chat question. Implemented by [`ApiClient`].
pub trait ChatBackend {
    fn chat(
        &self,
        question: &str,
        top_k: u32,
    ) -> impl Future<Output = Result<ChatResponse, ClientError>> + Send;
}

/// Anything that can ingest a document. `on_progress(loaded, total)` is called
/// as body bytes are handed to the transport.
pub trait IngestBackend {
    fn ingest<F>(
        &self,
        file: &SelectedFile,
        on_progress: F,
    ) -> impl Future<Output = Result<serde_json::Value, ClientError>> + Send
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static;
}

/// Configured request issuer shared by both views.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `http://localhost:8010`). Trailing slashes are dropped.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Ask a question. The answer and references default to empty when absent.
    pub async fn chat(&self, question: &str, top_k: u32) -> Result<ChatResponse, ClientError> {
        let url = self.url("/chat");
        tracing::debug!(%url, top_k, "sending chat request");
        let response = self
            .http
            .post(&url)
            .json(&ChatRequest::new(question, top_k))
            .send()
            .await?;
        let body = check_status(response).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Upload one file as multipart field `file`. Returns the backend's JSON verbatim.
    pub async fn ingest<F>(
        &self,
        file: &SelectedFile,
        on_progress: F,
    ) -> Result<serde_json::Value, ClientError>
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static,
    {
        let file_err = |source: std::io::Error| ClientError::File {
            path: file.path.clone(),
            source,
        };
        let handle = tokio::fs::File::open(&file.path).await.map_err(file_err)?;
        let total = handle.metadata().await.map_err(file_err)?.len();
        let chunks = ReaderStream::with_capacity(handle, UPLOAD_CHUNK_SIZE);
        let part = reqwest::multipart::Part::stream_with_length(
            progress_body(chunks, total, on_progress),
            total,
        )
        .file_name(file.name.clone())
        .mime_str(file.mime_type())?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = self.url("/ingest");
        tracing::debug!(%url, file = %file.name, bytes = total, "uploading document");
        let response = self.http.post(&url).multipart(form).send().await?;
        let body = check_status(response).await?.bytes().await?;
        if body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

impl ChatBackend for ApiClient {
    fn chat(
        &self,
        question: &str,
        top_k: u32,
    ) -> impl Future<Output = Result<ChatResponse, ClientError>> + Send {
        ApiClient::chat(self, question, top_k)
    }
}

impl IngestBackend for ApiClient {
    fn ingest<F>(
        &self,
        file: &SelectedFile,
        on_progress: F,
    ) -> impl Future<Output = Result<serde_json::Value, ClientError>> + Send
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static,
    {
        ApiClient::ingest(self, file, on_progress)
    }
}

/// Report cumulative bytes as the transport pulls chunks off the file.
fn progress_body<S, F>(chunks: S, total: u64, on_progress: F) -> reqwest::Body
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
    F: Fn(u64, Option<u64>) + Send + Sync + 'static,
{
    let mut loaded = 0u64;
    let stream = chunks.inspect_ok(move |chunk| {
        loaded += chunk.len() as u64;
        on_progress(loaded, Some(total));
    });
    reqwest::Body::wrap_stream(stream)
}

/// Pass 2xx responses through; turn anything else into [`ClientError::Status`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    let detail = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail_text());
    tracing::debug!(status = status.as_u16(), ?detail, "backend returned an error");
    Err(ClientError::Status {
        status: status.as_u16(),
        detail,
    })
}
