//! Renders the small markup subset used in the chat log into terminal lines.
//!
//! Supported: `<strong>`/`<b>` (bold), `<em>`/`<i>` (italic), `<div>` and
//! `<br>` (line breaks), and character references. Other tags are dropped,
//! their text is kept. Whitespace collapses the way a browser collapses it.

use ratatui::{
    style::{Modifier, Style},
    text::{Line, Span},
};

/// Decode a single character reference body (the part between `&` and `;`).
fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

struct LineBuilder {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    text: String,
    bold: usize,
    italic: usize,
    pending_space: bool,
}

impl LineBuilder {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            spans: Vec::new(),
            text: String::new(),
            bold: 0,
            italic: 0,
            pending_space: false,
        }
    }

    fn style(&self) -> Style {
        let mut style = Style::default();
        if self.bold > 0 {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic > 0 {
            style = style.add_modifier(Modifier::ITALIC);
        }
        style
    }

    fn line_is_empty(&self) -> bool {
        self.spans.is_empty() && self.text.is_empty()
    }

    /// Emit a collapsed space that precedes a style change.
    fn commit_space(&mut self) {
        if self.pending_space && !self.line_is_empty() {
            self.text.push(' ');
        }
        self.pending_space = false;
    }

    /// Close the current span; called before the style changes.
    fn flush_span(&mut self) {
        if !self.text.is_empty() {
            let style = self.style();
            self.spans.push(Span::styled(std::mem::take(&mut self.text), style));
        }
    }

    fn push_char(&mut self, c: char) {
        if c.is_whitespace() && c != '\u{a0}' {
            self.pending_space = true;
            return;
        }
        if self.pending_space && !self.line_is_empty() {
            self.text.push(' ');
        }
        self.pending_space = false;
        self.text.push(c);
    }

    /// Block boundary: start a new line unless the current one is empty.
    fn break_block(&mut self) {
        if !self.line_is_empty() {
            self.break_line();
        }
        self.pending_space = false;
    }

    fn break_line(&mut self) {
        self.pending_space = false;
        self.flush_span();
        self.lines.push(Line::from(std::mem::take(&mut self.spans)));
    }

    fn tag(&mut self, raw: &str) {
        let raw = raw.trim();
        let closing = raw.starts_with('/');
        let name: String = raw
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match name.as_str() {
            "strong" | "b" => {
                self.commit_space();
                self.flush_span();
                if closing {
                    self.bold = self.bold.saturating_sub(1);
                } else {
                    self.bold += 1;
                }
            }
            "em" | "i" => {
                self.commit_space();
                self.flush_span();
                if closing {
                    self.italic = self.italic.saturating_sub(1);
                } else {
                    self.italic += 1;
                }
            }
            "div" | "p" => self.break_block(),
            "br" => self.break_line(),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if !self.line_is_empty() || self.lines.is_empty() {
            self.break_line();
        }
        self.lines
    }
}

/// Convert markup into styled lines. Always returns at least one line.
pub fn to_lines(markup: &str) -> Vec<Line<'static>> {
    let mut builder = LineBuilder::new();
    let mut rest = markup;

    while let Some(c) = rest.chars().next() {
        match c {
            '<' => match rest.find('>') {
                Some(end) => {
                    builder.tag(&rest[1..end]);
                    rest = &rest[end + 1..];
                }
                None => {
                    // Unterminated tag, keep it as text
                    builder.push_char('<');
                    rest = &rest[1..];
                }
            },
            '&' => {
                let decoded = rest[1..]
                    .find(';')
                    .filter(|&end| end <= 10)
                    .and_then(|end| decode_entity(&rest[1..end + 1]).map(|ch| (ch, end + 2)));
                match decoded {
                    Some((ch, consumed)) => {
                        builder.push_char(ch);
                        rest = &rest[consumed..];
                    }
                    None => {
                        builder.push_char('&');
                        rest = &rest[1..];
                    }
                }
            }
            _ => {
                builder.push_char(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    builder.finish()
}

/// Flatten markup to plain text, one line per block.
pub fn to_plain(markup: &str) -> String {
    to_lines(markup)
        .iter()
        .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
