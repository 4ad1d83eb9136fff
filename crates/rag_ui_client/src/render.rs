//! Plain-text rendering of view state, shared by the headless binary and the TUI.

use crate::chat::{ChatView, ConversationEntry, EntryState};
use crate::messages::Reference;
use crate::upload::{UploadError, UploadView};

/// Maximum number of preview characters shown per reference.
pub const PREVIEW_CHARS: usize = 160;

pub const WAITING_TEXT: &str = "Thinking...";
pub const EMPTY_ANSWER_TEXT: &str = "The answer is empty.";
pub const EMPTY_HISTORY_TEXT: &str =
    "Ask a question to start the conversation. Message history will appear below.";
pub const LAST_FAILED_TEXT: &str = "The last request failed. Check the message above.";

/// Relevance score with three decimals, e.g. `0.870`.
pub fn format_score(score: f64) -> String {
    format!("{:.3}", score)
}

/// First [`PREVIEW_CHARS`] characters of `preview`, with `...` when cut.
pub fn truncate_preview(preview: &str) -> String {
    let mut chars = preview.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

/// `[position] filename: preview (score)`; `index` is zero-based.
pub fn reference_line(index: usize, reference: &Reference) -> String {
    format!(
        "[{}] {}: {} ({})",
        index + 1,
        reference.filename,
        truncate_preview(&reference.preview),
        format_score(reference.score)
    )
}

/// The bot side of an entry: waiting indicator, answer or error message.
pub fn answer_text(entry: &ConversationEntry) -> &str {
    match &entry.state {
        EntryState::Pending => WAITING_TEXT,
        EntryState::Success { answer, .. } if answer.is_empty() => EMPTY_ANSWER_TEXT,
        EntryState::Success { answer, .. } => answer,
        EntryState::Error { message } => message,
    }
}

pub fn render_entry(entry: &ConversationEntry) -> Vec<String> {
    let mut lines = vec![format!("You: {}", entry.question), format!("Bot: {}", answer_text(entry))];
    let references = entry.references();
    if !references.is_empty() {
        lines.push("References:".to_string());
        lines.extend(
            references
                .iter()
                .enumerate()
                .map(|(i, r)| format!("  {}", reference_line(i, r))),
        );
    }
    lines
}

/// Whole conversation in submission order, entries separated by a blank line.
pub fn render_history(view: &ChatView) -> String {
    if view.entries().is_empty() {
        return EMPTY_HISTORY_TEXT.to_string();
    }
    let mut blocks: Vec<String> = view
        .entries()
        .iter()
        .map(|e| render_entry(e).join("\n"))
        .collect();
    if view.last_failed() {
        blocks.push(LAST_FAILED_TEXT.to_string());
    }
    blocks.join("\n\n")
}

pub fn render_upload_error(error: &UploadError) -> Vec<String> {
    let mut lines = vec![error.message.clone()];
    lines.extend(error.hints.iter().map(|h| format!("  - {}", h)));
    lines
}

pub fn render_upload(view: &UploadView) -> String {
    let mut lines = Vec::new();
    match view.file() {
        Some(f) => lines.push(format!("File: {} ({} bytes)", f.name, f.size)),
        None => lines.push("No file selected.".to_string()),
    }
    if view.is_uploading() || view.progress() > 0 {
        lines.push(format!("Progress: {}%", view.progress()));
    }
    if let Some(error) = view.error() {
        lines.extend(render_upload_error(error));
    }
    if let Some(result) = view.result() {
        lines.push(result.to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(state: EntryState) -> ConversationEntry {
        ConversationEntry {
            id: "1".into(),
            question: "What is X?".into(),
            state,
        }
    }

    #[test]
    fn score_has_three_decimals() {
        assert_eq!(format_score(0.87), "0.870");
        assert_eq!(format_score(1.0), "1.000");
        assert_eq!(format_score(0.12345), "0.123");
    }

    #[test]
    fn preview_is_truncated_by_characters() {
        let short = "short preview";
        assert_eq!(truncate_preview(short), short);

        let exact: String = "é".repeat(PREVIEW_CHARS);
        assert_eq!(truncate_preview(&exact), exact);

        let long: String = "é".repeat(PREVIEW_CHARS + 5);
        let cut = truncate_preview(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn entry_renders_answer_and_references() {
        let e = entry(EntryState::Success {
            answer: "X is...".into(),
            references: vec![Reference {
                document_id: 1,
                filename: "a.txt".into(),
                score: 0.87,
                chunk_ord: 0,
                preview: "X is a...".into(),
            }],
        });
        let lines = render_entry(&e);
        assert_eq!(lines[0], "You: What is X?");
        assert_eq!(lines[1], "Bot: X is...");
        assert_eq!(lines[3], "  [1] a.txt: X is a... (0.870)");
    }

    #[test]
    fn pending_and_empty_answers_have_placeholders() {
        assert_eq!(answer_text(&entry(EntryState::Pending)), WAITING_TEXT);
        let empty = entry(EntryState::Success {
            answer: String::new(),
            references: vec![],
        });
        assert_eq!(answer_text(&empty), EMPTY_ANSWER_TEXT);
    }
}
