//! Upload view state: file selection, byte-level progress, result and classified errors.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::client::{ClientError, IngestBackend};

/// Files above this size get the slow-upload hint (20 MiB).
pub const DEFAULT_SLOW_UPLOAD_THRESHOLD: u64 = 20 * 1024 * 1024;

pub const HINT_EMPTY_OR_NOT_UTF8: &str =
    "Make sure the file is not empty and contains UTF-8 encoded text.";
pub const HINT_TOO_LARGE: &str =
    "The file is too large for the server: split it into smaller parts and upload them separately.";
pub const HINT_UNSUPPORTED_FORMAT: &str =
    "This file format is not supported: check the list of supported formats (plain text, Markdown, HTML).";
pub const HINT_SLOW_UPLOAD: &str =
    "Large files take a while to upload: keep the application open until the upload finishes.";
pub const HINT_RETRY_LATER: &str =
    "Try again later. If the problem persists, check that the backend is running.";

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
}

impl SelectedFile {
    /// Stat `path` and capture its name and size.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();
        let meta = std::fs::metadata(&path).map_err(|source| ClientError::File {
            path: path.clone(),
            source,
        })?;
        if !meta.is_file() {
            return Err(ClientError::File {
                path,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self {
            path,
            name,
            size: meta.len(),
        })
    }

    /// Content type sent with the multipart part, guessed from the extension.
    pub fn mime_type(&self) -> &'static str {
        let ext = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("txt") => "text/plain",
            Some("md") | Some("markdown") => "text/markdown",
            Some("html") | Some("htm") => "text/html",
            Some("json") => "application/json",
            Some("pdf") => "application/pdf",
            _ => "application/octet-stream",
        }
    }
}

/// Failed upload, reconstructed per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadError {
    pub message: String,
    pub hints: Vec<String>,
}

/// Turn a request error into a message plus remediation hints.
pub fn classify_upload_error(err: &ClientError, file_size: u64, slow_threshold: u64) -> UploadError {
    let message = match (err.status(), err.detail()) {
        (Some(status), Some(detail)) => format!("Upload failed (HTTP {}): {}", status, detail),
        (Some(status), None) => format!("Upload failed (HTTP {})", status),
        (None, _) => {
            let text = err.to_string();
            if text.trim().is_empty() {
                "Upload failed".to_string()
            } else {
                format!("Upload failed: {}", text)
            }
        }
    };

    let mut hints = Vec::new();
    let status_hint = match err.status() {
        Some(400) => Some(HINT_EMPTY_OR_NOT_UTF8),
        Some(413) => Some(HINT_TOO_LARGE),
        Some(415) => Some(HINT_UNSUPPORTED_FORMAT),
        _ => None,
    };
    if let Some(hint) = status_hint {
        hints.push(hint.to_string());
    }
    if file_size > slow_threshold {
        hints.push(HINT_SLOW_UPLOAD.to_string());
    }
    if status_hint.is_none() {
        hints.push(HINT_RETRY_LATER.to_string());
    }
    UploadError { message, hints }
}

/// Percentage for `loaded` bytes out of `total` (or `file_size` when the transport
/// reports no total). `None` when neither is known.
pub fn progress_percent(loaded: u64, total: Option<u64>, file_size: u64) -> Option<u8> {
    let denominator = total.filter(|t| *t > 0).unwrap_or(file_size);
    if denominator == 0 {
        return None;
    }
    let pct = (loaded as u128 * 100 / denominator as u128).min(100);
    Some(pct as u8)
}

/// Progress of one upload. Shared between the transport callback and the view;
/// the value only ever grows and stays within `[0, 100]`.
#[derive(Debug)]
pub struct ProgressTracker {
    file_size: u64,
    percent: AtomicU8,
}

impl ProgressTracker {
    pub fn new(file_size: u64) -> Self {
        Self {
            file_size,
            percent: AtomicU8::new(0),
        }
    }

    /// Record a `(loaded, total)` pair and return the current percentage.
    pub fn record(&self, loaded: u64, total: Option<u64>) -> u8 {
        match progress_percent(loaded, total, self.file_size) {
            Some(pct) => self.percent.fetch_max(pct, Ordering::Relaxed).max(pct),
            None => self.percent(),
        }
    }

    pub fn finish(&self) {
        self.percent.store(100, Ordering::Relaxed);
    }

    pub fn percent(&self) -> u8 {
        self.percent.load(Ordering::Relaxed)
    }
}

/// An upload that has been started; hand it to the transport.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub file: SelectedFile,
    pub progress: Arc<ProgressTracker>,
}

impl UploadJob {
    /// Progress callback for [`IngestBackend::ingest`].
    pub fn progress_callback(&self) -> impl Fn(u64, Option<u64>) + Send + Sync + 'static {
        let tracker = Arc::clone(&self.progress);
        move |loaded, total| {
            tracker.record(loaded, total);
        }
    }
}

/// Upload panel state.
#[derive(Debug)]
pub struct UploadView {
    file: Option<SelectedFile>,
    uploading: bool,
    progress: Arc<ProgressTracker>,
    result: Option<String>,
    error: Option<UploadError>,
    slow_threshold: u64,
}

impl Default for UploadView {
    fn default() -> Self {
        Self::new(DEFAULT_SLOW_UPLOAD_THRESHOLD)
    }
}

impl UploadView {
    pub fn new(slow_threshold: u64) -> Self {
        Self {
            file: None,
            uploading: false,
            progress: Arc::new(ProgressTracker::new(0)),
            result: None,
            error: None,
            slow_threshold,
        }
    }

    /// Select a new file (or none). Clears any previous result, error and progress.
    /// Ignored while an upload is running; returns whether the selection changed.
    pub fn select_file(&mut self, file: Option<SelectedFile>) -> bool {
        if self.uploading {
            return false;
        }
        let size = file.as_ref().map(|f| f.size).unwrap_or(0);
        self.file = file;
        self.progress = Arc::new(ProgressTracker::new(size));
        self.result = None;
        self.error = None;
        true
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading
    }

    pub fn progress(&self) -> u8 {
        self.progress.percent()
    }

    /// Pretty-printed JSON of the last successful upload.
    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn error(&self) -> Option<&UploadError> {
        self.error.as_ref()
    }

    /// Start an upload. `None` (and no state change) when no file is selected or
    /// an upload is already running.
    pub fn begin_submit(&mut self) -> Option<UploadJob> {
        if self.uploading {
            return None;
        }
        let file = self.file.clone()?;
        self.uploading = true;
        self.result = None;
        self.error = None;
        self.progress = Arc::new(ProgressTracker::new(file.size));
        Some(UploadJob {
            file,
            progress: Arc::clone(&self.progress),
        })
    }

    /// Finish the running upload with the backend's answer.
    pub fn complete(&mut self, result: Result<serde_json::Value, ClientError>) {
        if !self.uploading {
            tracing::warn!("upload completion received with no upload in flight");
            return;
        }
        self.uploading = false;
        match result {
            Ok(body) => {
                self.progress.finish();
                let pretty = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
                tracing::info!(file = ?self.file.as_ref().map(|f| &f.name), "upload finished");
                self.result = Some(pretty);
            }
            Err(err) => {
                let size = self.file.as_ref().map(|f| f.size).unwrap_or(0);
                let classified = classify_upload_error(&err, size, self.slow_threshold);
                tracing::debug!(error = %err, "upload failed");
                self.error = Some(classified);
            }
        }
    }

    /// Run a full upload against `backend`. Returns `false` when the submit was a no-op.
    pub async fn submit<B: IngestBackend>(&mut self, backend: &B) -> bool {
        let Some(job) = self.begin_submit() else {
            return false;
        };
        let result = backend.ingest(&job.file, job.progress_callback()).await;
        self.complete(result);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(size: u64) -> SelectedFile {
        SelectedFile {
            path: PathBuf::from("/tmp/doc.txt"),
            name: "doc.txt".into(),
            size,
        }
    }

    fn status(status: u16, detail: Option<&str>) -> ClientError {
        ClientError::Status {
            status,
            detail: detail.map(str::to_string),
        }
    }

    #[test]
    fn bad_request_mentions_status_and_utf8_hint() {
        let e = classify_upload_error(&status(400, Some("empty file")), 0, DEFAULT_SLOW_UPLOAD_THRESHOLD);
        assert!(e.message.contains("400"));
        assert!(e.message.contains("empty file"));
        assert_eq!(e.hints, vec![HINT_EMPTY_OR_NOT_UTF8.to_string()]);
    }

    #[test]
    fn too_large_and_unsupported_have_their_own_hints() {
        let e = classify_upload_error(&status(413, None), 10, 100);
        assert_eq!(e.hints, vec![HINT_TOO_LARGE.to_string()]);
        let e = classify_upload_error(&status(415, None), 10, 100);
        assert_eq!(e.hints, vec![HINT_UNSUPPORTED_FORMAT.to_string()]);
    }

    #[test]
    fn large_file_gets_slow_hint_in_addition() {
        let e = classify_upload_error(&status(413, None), 101, 100);
        assert_eq!(
            e.hints,
            vec![HINT_TOO_LARGE.to_string(), HINT_SLOW_UPLOAD.to_string()]
        );
        let e = classify_upload_error(&status(500, None), 101, 100);
        assert_eq!(
            e.hints,
            vec![HINT_SLOW_UPLOAD.to_string(), HINT_RETRY_LATER.to_string()]
        );
    }

    #[test]
    fn transport_failure_falls_back_to_retry_hint() {
        let e = classify_upload_error(
            &ClientError::Transport("connection refused".into()),
            10,
            100,
        );
        assert_eq!(e.message, "Upload failed: connection refused");
        assert_eq!(e.hints, vec![HINT_RETRY_LATER.to_string()]);
    }

    #[test]
    fn progress_is_monotonic_and_bounded() {
        let tracker = ProgressTracker::new(1000);
        let samples = [
            (0, Some(1000)),
            (250, Some(1000)),
            (100, Some(1000)),
            (600, None),
            (5000, Some(1000)),
            (10, Some(0)),
        ];
        let mut last = 0;
        for (loaded, total) in samples {
            let pct = tracker.record(loaded, total);
            assert!(pct >= last, "progress went backwards: {} -> {}", last, pct);
            assert!(pct <= 100);
            last = pct;
        }
        assert_eq!(tracker.percent(), 100);
    }

    #[test]
    fn progress_falls_back_to_file_size() {
        assert_eq!(progress_percent(50, None, 200), Some(25));
        assert_eq!(progress_percent(50, Some(0), 200), Some(25));
        assert_eq!(progress_percent(50, Some(100), 200), Some(50));
        assert_eq!(progress_percent(0, None, 0), None);
    }

    #[test]
    fn selecting_a_file_resets_previous_state() {
        let mut view = UploadView::new(100);
        view.select_file(Some(file(10)));
        let job = view.begin_submit().unwrap();
        job.progress_callback()(5, Some(10));
        assert_eq!(view.progress(), 50);
        job.progress_callback()(6, None);
        assert_eq!(view.progress(), 60);
        view.complete(Err(status(500, None)));
        assert!(view.error().is_some());

        view.select_file(Some(file(20)));
        assert!(view.error().is_none());
        assert!(view.result().is_none());
        assert_eq!(view.progress(), 0);
    }

    #[test]
    fn selection_is_locked_while_uploading() {
        let mut view = UploadView::new(100);
        let small = SelectedFile {
            path: PathBuf::from("/tmp/small.txt"),
            name: "small.txt".into(),
            size: 10,
        };
        let huge = SelectedFile {
            path: PathBuf::from("/tmp/huge.txt"),
            name: "huge.txt".into(),
            size: 1000,
        };
        assert!(view.select_file(Some(small)));
        let job = view.begin_submit().unwrap();

        assert!(!view.select_file(Some(huge.clone())));
        assert!(!view.select_file(None));
        job.progress_callback()(5, Some(10));
        assert_eq!(view.progress(), 50);
        assert_eq!(view.file().map(|f| f.name.as_str()), Some("small.txt"));

        view.complete(Err(status(500, None)));
        let error = view.error().unwrap();
        assert_eq!(error.hints, vec![HINT_RETRY_LATER.to_string()]);

        // Unlocked again once the upload is over.
        assert!(view.select_file(Some(huge)));
        assert_eq!(view.file().map(|f| f.name.as_str()), Some("huge.txt"));
        assert!(view.error().is_none());
    }

    #[test]
    fn submit_guards_against_missing_file_and_concurrent_upload() {
        let mut view = UploadView::default();
        assert!(view.begin_submit().is_none());
        assert!(!view.is_uploading());

        view.select_file(Some(file(10)));
        assert!(view.begin_submit().is_some());
        assert!(view.is_uploading());
        assert!(view.begin_submit().is_none());

        view.complete(Ok(serde_json::json!({"ok": true, "chunks": 3})));
        assert!(!view.is_uploading());
        assert_eq!(view.progress(), 100);
        let result = view.result().unwrap();
        assert!(result.contains("\"chunks\": 3"));
    }

    #[test]
    fn mime_type_from_extension() {
        let mut f = file(1);
        assert_eq!(f.mime_type(), "text/plain");
        f.path = PathBuf::from("notes.MD");
        assert_eq!(f.mime_type(), "text/markdown");
        f.path = PathBuf::from("blob");
        assert_eq!(f.mime_type(), "application/octet-stream");
    }
}
