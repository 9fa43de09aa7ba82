//! The UI affordances the chat widget binds to.
//!
//! These are created once at startup and handed to `ChatWidget::attach`.

use ratatui::layout::{Position, Rect};
use ratatui::widgets::ListState;
use crate::message_log::MessageLog;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Single-line text input with a character cursor.
#[derive(Debug, Default, Clone)]
pub struct InputField {
    value: String,
    cursor: usize,
}

impl InputField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[cfg(test)]
    pub fn set_value(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        let char_count = self.value.chars().count();
        self.cursor = (self.cursor + 1).min(char_count);
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.value.chars().count();
    }
}

/// The `[ Send ]` control. Its area is recorded at render time for mouse hit-testing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SendButton {
    pub area: Option<Rect>,
}

impl SendButton {
    pub fn contains(&self, x: u16, y: u16) -> bool {
        self.area.is_some_and(|r| r.contains(Position::new(x, y)))
    }
}

/// A list of model names with one selected value.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    options: Vec<String>,
    value: String,
    /// Highlight state for the picker popup
    pub picker_state: ListState,
}

impl ModelSelector {
    /// `selected` need not be one of `options`; it is added if missing.
    pub fn new(mut options: Vec<String>, selected: &str) -> Self {
        if !options.iter().any(|o| o == selected) {
            options.push(selected.to_string());
        }
        Self {
            options,
            value: selected.to_string(),
            picker_state: ListState::default(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn open_picker(&mut self) {
        let idx = self.options.iter().position(|o| *o == self.value).unwrap_or(0);
        self.picker_state.select(Some(idx));
    }

    pub fn picker_down(&mut self) {
        let len = self.options.len();
        if len > 0 {
            let i = self.picker_state.selected().unwrap_or(0);
            self.picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn picker_up(&mut self) {
        let i = self.picker_state.selected().unwrap_or(0);
        self.picker_state.select(Some(i.saturating_sub(1)));
    }

    /// Commit the highlighted option; returns the new value if it changed.
    pub fn commit_picker(&mut self) -> Option<&str> {
        let picked = self.picker_state.selected().and_then(|i| self.options.get(i))?;
        if *picked == self.value {
            return None;
        }
        self.value = picked.clone();
        Some(&self.value)
    }
}

/// Everything the widget binds to.
#[derive(Debug)]
pub struct ChatElements {
    pub input: InputField,
    pub send: SendButton,
    pub model: ModelSelector,
    pub log: MessageLog,
}

impl ChatElements {
    pub fn new(models: Vec<String>, selected_model: &str) -> Self {
        Self {
            input: InputField::new(),
            send: SendButton::default(),
            model: ModelSelector::new(models, selected_model),
            log: MessageLog::new(),
        }
    }
}
