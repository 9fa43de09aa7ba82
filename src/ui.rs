use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Position, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};
use crate::app::App;
use crate::message_log;
use crate::widget::MarkupTrust;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, log, input row, footer
    let [header_area, log_area, input_row, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_log(app, frame, log_area);
    render_input_row(app, frame, input_row);
    render_footer(frame, footer_area);

    if app.show_model_picker {
        render_model_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let trust = match app.widget.trust() {
        MarkupTrust::TrustServer => "",
        MarkupTrust::AlwaysEscape => " [escaping server markup]",
    };

    let title = Line::from(vec![
        Span::styled(" Intent Chat ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("model: {}", app.widget.elements.model.value()),
            Style::default().fg(Color::White),
        ),
        Span::styled(trust, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_log(app: &mut App, frame: &mut Frame, area: Rect) {
    app.log_area = Some(area);

    let log = &mut app.widget.elements.log;
    // Inner size minus borders
    log.set_viewport(area.width.saturating_sub(2), area.height.saturating_sub(2));

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Chat ");

    let paragraph = if log.is_empty() {
        Paragraph::new(Span::styled(
            "Type a message and press Enter...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        message_log::log_paragraph(log.entries())
    };

    let paragraph = paragraph.block(block).scroll((log.scroll, 0));

    frame.render_widget(paragraph, area);
}

fn render_input_row(app: &mut App, frame: &mut Frame, area: Rect) {
    let [input_area, send_area] =
        Layout::horizontal([Constraint::Min(10), Constraint::Length(10)]).areas(area);
    app.widget.elements.send.area = Some(send_area);

    let input = &app.widget.elements.input;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Message ");

    // Scroll horizontally so the cursor stays visible
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = input.cursor();
    let scroll_offset = if inner_width == 0 {
        0
    } else {
        cursor_pos.saturating_sub(inner_width.saturating_sub(1))
    };
    let visible: String = input.value().chars().skip(scroll_offset).take(inner_width).collect();

    frame.render_widget(Paragraph::new(visible).block(input_block), input_area);

    if !app.show_model_picker && inner_width > 0 {
        frame.set_cursor_position(Position::new(
            input_area.x + 1 + (cursor_pos - scroll_offset) as u16,
            input_area.y + 1,
        ));
    }

    let send = Paragraph::new(Span::styled("Send", Style::default().fg(Color::Green).bold()))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Green)));
    frame.render_widget(send, send_area);
}

fn render_footer(frame: &mut Frame, area: Rect) {
    let hints = Line::from(vec![
        Span::styled(" Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" send  "),
        Span::styled("Ctrl+O", Style::default().fg(Color::Yellow)),
        Span::raw(" model  "),
        Span::styled("Ctrl+R", Style::default().fg(Color::Yellow)),
        Span::raw(" reset  "),
        Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)),
        Span::raw(" scroll  "),
        Span::styled("Esc", Style::default().fg(Color::Yellow)),
        Span::raw(" quit"),
    ]);
    frame.render_widget(Paragraph::new(hints), area);
}

fn render_model_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let model = &mut app.widget.elements.model;

    // Calculate popup size and position (centered)
    let popup_width = 40.min(area.width.saturating_sub(4));
    let popup_height = (model.options().len() as u16 + 2).min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Model (Enter to select, Esc to cancel) ");

    let items: Vec<ListItem> = model
        .options()
        .iter()
        .map(|option| {
            let style = if option == model.value() {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!(" {} ", option)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut model.picker_state);
}
