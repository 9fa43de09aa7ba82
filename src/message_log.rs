use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Paragraph, Wrap},
};
use crate::markup;
use crate::widget::USER_LABEL;

/// Markup shown while a request is in flight.
pub const PENDING_MARKUP: &str = "<em>Bot is typing...</em>";

/// Identifies the pending placeholder created for one request.
///
/// Removal goes through the handle, so overlapping requests never remove
/// each other's placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingHandle(u64);

/// One rendered block in the chat log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    pub id: u64,
    /// `None` for the pending placeholder, which has no label
    pub sender: Option<String>,
    /// Markup as inserted into the log (already escaped when the caller asked for it)
    pub body: String,
}

impl MessageEntry {
    pub fn is_pending(&self) -> bool {
        self.sender.is_none()
    }

    /// Styled lines for this entry: the sender label is prefixed to the first line.
    pub fn lines(&self) -> Vec<Line<'static>> {
        let mut lines = markup::to_lines(&self.body);

        if self.is_pending() {
            for line in &mut lines {
                *line = std::mem::take(line).style(Style::default().fg(Color::DarkGray));
            }
            return lines;
        }

        if let (Some(sender), Some(first)) = (&self.sender, lines.first_mut()) {
            let color = if sender == USER_LABEL { Color::Cyan } else { Color::Yellow };
            first.spans.insert(
                0,
                Span::styled(
                    format!("{}: ", sender),
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                ),
            );
        }
        lines
    }
}

/// The log pane paragraph. Row counting and rendering share it so the wrap agrees.
pub fn log_paragraph(entries: &[MessageEntry]) -> Paragraph<'static> {
    let lines: Vec<Line<'static>> = entries.iter().flat_map(MessageEntry::lines).collect();
    Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true })
}

/// Replace the five HTML-significant characters with character references.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// The scrollable output container.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<MessageEntry>,
    next_id: u64,
    pub scroll: u16,
    // Inner size of the log pane, updated on every render
    viewport_width: u16,
    viewport_height: u16,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[MessageEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_pending()).count()
    }

    /// Append an entry and snap the viewport to the bottom.
    ///
    /// Plain text is escaped; markup goes in verbatim.
    pub fn append(&mut self, sender: &str, content: &str, is_markup: bool) -> u64 {
        let body = if is_markup {
            content.to_string()
        } else {
            escape_html(content)
        };
        self.push(Some(sender.to_string()), body)
    }

    pub fn append_pending(&mut self) -> PendingHandle {
        PendingHandle(self.push(None, PENDING_MARKUP.to_string()))
    }

    /// Remove the placeholder created for `handle`. Returns false if it is already gone.
    pub fn remove_pending(&mut self, handle: PendingHandle) -> bool {
        match self.entries.iter().position(|e| e.id == handle.0 && e.is_pending()) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    fn push(&mut self, sender: Option<String>, body: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(MessageEntry { id, sender, body });
        self.scroll_to_bottom();
        id
    }

    pub fn set_viewport(&mut self, width: u16, height: u16) {
        if (width, height) == (self.viewport_width, self.viewport_height) {
            return;
        }
        let was_at_bottom = self.scroll >= self.max_scroll();
        self.viewport_width = width;
        self.viewport_height = height;
        if was_at_bottom {
            self.scroll_to_bottom();
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll());
    }

    fn max_scroll(&self) -> u16 {
        // Fall back to a typical pane size before the first render
        let visible_height = if self.viewport_height > 0 { self.viewport_height } else { 20 };
        self.total_lines().saturating_sub(visible_height)
    }

    /// Number of terminal rows the log occupies once wrapped.
    fn total_lines(&self) -> u16 {
        let wrap_width = if self.viewport_width > 0 { self.viewport_width } else { 50 };
        let rows = log_paragraph(&self.entries).line_count(wrap_width);
        rows.min(u16::MAX as usize) as u16
    }
}
