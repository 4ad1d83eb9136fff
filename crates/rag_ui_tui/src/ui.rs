//! Rendering: tab bar, the active view, and a key-help footer.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Gauge, Paragraph, Tabs, Wrap};
use ratatui::Frame;

use rag_ui_client::render::{self, EMPTY_HISTORY_TEXT, LAST_FAILED_TEXT};
use rag_ui_client::{ConversationEntry, EntryStatus, Tab};

use crate::app::App;

const MUTED: Style = Style::new().fg(Color::DarkGray);
const ERROR: Style = Style::new().fg(Color::Red);

/// Main render function, called on every frame.
pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(f.area());

    draw_tabs(f, chunks[0], app);
    match app.shell.active() {
        Tab::Chat => draw_chat(f, chunks[1], app),
        Tab::Upload => draw_upload(f, chunks[1], app),
    }
    draw_help(f, chunks[2], app);
}

fn draw_tabs(f: &mut Frame, area: Rect, app: &App) {
    let titles: Vec<Line> = Tab::ALL
        .iter()
        .enumerate()
        .map(|(i, t)| Line::from(format!("{} (F{})", t.title(), i + 1)))
        .collect();
    let selected = Tab::ALL
        .iter()
        .position(|t| *t == app.shell.active())
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" RAG Chatbot · {} ", app.base_url())),
        )
        .select(selected)
        .highlight_style(
            Style::default()
                .fg(Color::White)
                .bg(Color::Blue)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, area);
}

fn entry_lines(entry: &ConversationEntry) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled("YOU", MUTED)),
        Line::from(entry.question.clone()),
        Line::from(Span::styled("BOT", MUTED)),
    ];
    let answer = render::answer_text(entry).to_string();
    let answer_style = match entry.status() {
        EntryStatus::Pending => MUTED.add_modifier(Modifier::ITALIC),
        EntryStatus::Error => ERROR,
        EntryStatus::Success => Style::default(),
    };
    lines.extend(
        answer
            .lines()
            .map(|l| Line::from(Span::styled(l.to_string(), answer_style))),
    );
    let references = entry.references();
    if !references.is_empty() {
        lines.push(Line::from(Span::styled(
            "References",
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for (i, r) in references.iter().enumerate() {
            lines.push(Line::from(vec![
                Span::styled(format!("  [{}] ", i + 1), MUTED),
                Span::raw(format!("{}: {} ", r.filename, render::truncate_preview(&r.preview))),
                Span::styled(format!("({})", render::format_score(r.score)), MUTED),
            ]));
        }
    }
    lines.push(Line::default());
    lines
}

/// Conversation lines in submission order, plus the last-failed banner.
pub fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let entries = app.chat.entries();
    if entries.is_empty() {
        return vec![Line::from(Span::styled(EMPTY_HISTORY_TEXT, MUTED))];
    }
    let mut lines: Vec<Line> = entries.iter().flat_map(entry_lines).collect();
    if app.chat.last_failed() {
        lines.push(Line::from(Span::styled(LAST_FAILED_TEXT, ERROR)));
    }
    lines
}

/// Rows `lines` occupy once word-wrapped to `width` columns.
pub fn wrapped_height(lines: &[Line<'static>], width: u16) -> u16 {
    let rows = Paragraph::new(lines.to_vec())
        .wrap(Wrap { trim: false })
        .line_count(width);
    u16::try_from(rows).unwrap_or(u16::MAX)
}

/// Cursor column after `typed` characters in a bordered input starting at `x`.
pub fn input_cursor_x(x: u16, typed: usize) -> u16 {
    let typed = u16::try_from(typed).unwrap_or(u16::MAX);
    x.saturating_add(1).saturating_add(typed)
}

fn draw_chat(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let lines = chat_lines(app);
    let inner_height = chunks[0].height.saturating_sub(2);
    let total = wrapped_height(&lines, chunks[0].width.saturating_sub(2));
    let bottom = total.saturating_sub(inner_height);
    let offset = bottom.saturating_sub(app.chat_scroll);
    let history = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Conversation "))
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    f.render_widget(history, chunks[0]);

    let title = if app.chat.is_loading() {
        " Question (waiting for the answer...) "
    } else {
        " Question (Enter to ask) "
    };
    let input = Paragraph::new(app.chat.input())
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(input, chunks[1]);
    if !app.chat.is_loading() {
        let x = input_cursor_x(chunks[1].x, app.chat.input().chars().count());
        f.set_cursor_position((x.min(chunks[1].right().saturating_sub(2)), chunks[1].y + 1));
    }
}

/// Status, hints and result lines for the upload panel.
pub fn upload_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    match app.upload.file() {
        Some(file) => lines.push(Line::from(format!("File: {} ({} bytes)", file.name, file.size))),
        None => lines.push(Line::from(Span::styled("No file selected.", MUTED))),
    }
    if let Some(notice) = &app.upload_notice {
        lines.push(Line::from(Span::styled(notice.clone(), ERROR)));
    }
    if let Some(error) = app.upload.error() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(error.message.clone(), ERROR)));
        for hint in &error.hints {
            lines.push(Line::from(format!("  - {}", hint)));
        }
    }
    if let Some(result) = app.upload.result() {
        lines.push(Line::default());
        lines.extend(result.lines().map(|l| Line::from(l.to_string())));
    }
    lines
}

fn draw_upload(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(area);

    let title = if app.upload.is_uploading() {
        " File path (uploading...) "
    } else {
        " File path (Enter to upload) "
    };
    let input = Paragraph::new(app.upload_path.as_str())
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(input, chunks[0]);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Progress "))
        .gauge_style(Style::default().fg(Color::Blue))
        .percent(u16::from(app.upload.progress()));
    f.render_widget(gauge, chunks[1]);

    let details = Paragraph::new(upload_lines(app))
        .block(Block::default().borders(Borders::ALL).title(" Result "))
        .wrap(Wrap { trim: false });
    f.render_widget(details, chunks[2]);
}

fn draw_help(f: &mut Frame, area: Rect, app: &App) {
    let keys = match app.shell.active() {
        Tab::Chat => "Tab switch · Enter ask · ↑/↓ scroll · Ctrl+L clear history · Esc quit",
        Tab::Upload => "Tab switch · Enter upload · Esc quit",
    };
    f.render_widget(Paragraph::new(Span::styled(keys, MUTED)), area);
}
