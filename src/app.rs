use std::path::PathBuf;
use ratatui::layout::Rect;
use tracing::{info, warn};
use crate::config::Config;
use crate::widget::ChatWidget;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub widget: ChatWidget,

    // Model picker state
    pub show_model_picker: bool,

    // Log pane area for mouse hit-testing (updated during render)
    pub log_area: Option<Rect>,

    // Where a newly picked model is remembered
    config_path: Option<PathBuf>,
}

impl App {
    pub fn new(widget: ChatWidget, config_path: Option<PathBuf>) -> Self {
        Self {
            should_quit: false,
            widget,
            show_model_picker: false,
            log_area: None,
            config_path,
        }
    }

    pub fn open_model_picker(&mut self) {
        self.widget.elements.model.open_picker();
        self.show_model_picker = true;
    }

    pub fn close_model_picker(&mut self) {
        self.show_model_picker = false;
    }

    /// Commit the highlighted model and remember it as the default.
    pub fn pick_model(&mut self) {
        self.show_model_picker = false;
        let Some(model) = self.widget.elements.model.commit_picker().map(str::to_string) else {
            return;
        };
        info!(model = %model, "model selected");

        let Some(path) = &self.config_path else {
            return;
        };
        let mut config = Config::load_from(path).unwrap_or_else(|_| Config::new());
        config.default_model = Some(model);
        if let Err(err) = config.save_to(path) {
            warn!(error = %err, path = %path.display(), "could not save default model");
        }
    }

    pub fn scroll_log_up(&mut self, lines: u16) {
        self.widget.elements.log.scroll_up(lines);
    }

    pub fn scroll_log_down(&mut self, lines: u16) {
        self.widget.elements.log.scroll_down(lines);
    }

    /// Rows to move on PageUp/PageDown
    pub fn page_size(&self) -> u16 {
        self.log_area
            .map(|r| r.height.saturating_sub(3))
            .unwrap_or(10)
            .max(1)
    }
}
