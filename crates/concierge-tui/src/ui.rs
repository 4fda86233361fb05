use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use concierge_core::session::is_local_notice;
use concierge_core::{Affordance, Role};

use crate::app::{App, FocusPane, InputMode};

pub const CONNECTION_LOST: &str = "Connection lost. Press Ctrl+R to reconnect.";
pub const NO_AGENTS: &str = "No agents available";
const NOTICE_LABEL: &str = "Notice:";

// Tallest the choice list gets before it scrolls
const MAX_CHOICE_ROWS: usize = 6;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;
            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

fn speaker_color(role: Role) -> Color {
    match role {
        Role::User => Color::Cyan,
        Role::Assistant => Color::Yellow,
        Role::System => Color::Magenta,
    }
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let affordance = app.affordance();

    let mut banners: Vec<Line> = Vec::new();
    if !app.session.connection().is_connected() {
        banners.push(Line::from(Span::styled(
            format!(" {CONNECTION_LOST} "),
            Style::default().bg(Color::Red).fg(Color::White).bold(),
        )));
    }
    if app.session.no_agents_warning() {
        banners.push(Line::from(Span::styled(
            format!(" {NO_AGENTS} "),
            Style::default().bg(Color::Yellow).fg(Color::Black),
        )));
    }

    let choices = affordance.choices().len();
    let choices_height = if choices == 0 {
        0
    } else {
        (choices.min(MAX_CHOICE_ROWS) + 2) as u16 // +2 for borders
    };

    let [header_area, banner_area, chat_area, choices_area, composer_area, footer_area] =
        Layout::vertical([
            Constraint::Length(1),
            Constraint::Length(banners.len() as u16),
            Constraint::Min(0),
            Constraint::Length(choices_height),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(area);

    render_header(app, frame, header_area);
    if !banners.is_empty() {
        frame.render_widget(Paragraph::new(banners), banner_area);
    }
    render_chat(app, frame, chat_area);
    if choices_height > 0 {
        render_choices(app, &affordance, frame, choices_area);
    }
    render_composer(app, &affordance, frame, composer_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mode = if app.session.is_ai_response() {
        "AI"
    } else {
        "Agent"
    };
    let (status, status_color) = if app.session.connection().is_connected() {
        ("connected", Color::Green)
    } else {
        ("disconnected", Color::Red)
    };

    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", app.session.view().display_name()),
            Style::default().fg(Color::Cyan).bold(),
        ),
        Span::styled(format!("[{mode}] "), Style::default().fg(Color::White)),
        Span::styled(status, Style::default().fg(status_color)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store chat area for mouse hit-testing and scroll calculations
    app.chat_area = Some(area);
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);
    if app.follow_tail {
        app.scroll_to_bottom();
    }

    let view = app.session.view();
    let border_color = if app.focus == FocusPane::Composer {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Conversation ");

    let waiting = app.session.is_waiting();
    let chat_text = if app.session.messages().is_empty() && !waiting {
        let hint = match view {
            concierge_core::View::Customer => "Say hello to start the conversation...",
            concierge_core::View::Agent => "Waiting for customer messages...",
        };
        Text::from(Span::styled(hint, Style::default().fg(Color::DarkGray)))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in app.session.messages() {
            let (label, color) = if is_local_notice(msg) {
                (NOTICE_LABEL, Color::Red)
            } else {
                (view.label(msg.role), speaker_color(msg.role))
            };
            lines.push(Line::from(Span::styled(
                label,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));
            for line in msg.content.lines() {
                if msg.role == Role::Assistant {
                    lines.push(parse_markdown_line(line));
                } else {
                    lines.push(Line::from(line.to_string()));
                }
            }
            lines.push(Line::default());
        }

        if waiting {
            lines.push(Line::from(Span::styled(
                view.label(Role::Assistant),
                Style::default()
                    .fg(speaker_color(Role::Assistant))
                    .add_modifier(Modifier::BOLD),
            )));
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{dots}"),
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn render_choices(app: &mut App, affordance: &Affordance, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Choices;
    let border_color = if focused {
        Color::Cyan
    } else {
        Color::Magenta
    };
    let title = match affordance {
        Affordance::Composer { .. } => " Quick replies (Tab to focus) ",
        Affordance::Buttons(_) => " Choose one ",
        Affordance::Dropdown(_) => " Select an option ",
    };

    let items: Vec<ListItem> = affordance
        .choices()
        .iter()
        .map(|choice| ListItem::new(format!(" {choice} ")))
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color))
                .title(title),
        )
        .highlight_style(
            Style::default()
                .bg(if focused { Color::Magenta } else { Color::DarkGray })
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut app.choice_state);
}

fn render_composer(app: &App, affordance: &Affordance, frame: &mut Frame, area: Rect) {
    let accepts_text = affordance.accepts_text();
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing {
        Color::Yellow
    } else {
        Color::DarkGray
    };
    let title = if accepts_text {
        " Message (Enter to send) "
    } else {
        " Pick an option above "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Visible portion of the composer, scrolled to keep the cursor in view
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.composer_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .composer
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_color = if accepts_text {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(text_color))
        .block(block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " EDIT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![Span::styled(mode_text, mode_style)];
    match (app.input_mode, app.focus) {
        (InputMode::Editing, _) => hints.extend(vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
            Span::styled(" Esc ", key_style),
            Span::styled(" stop editing ", label_style),
        ]),
        (InputMode::Normal, FocusPane::Choices) => hints.extend(vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" choose ", label_style),
        ]),
        (InputMode::Normal, FocusPane::Composer) => hints.extend(vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" scroll ", label_style),
            Span::styled(" i ", key_style),
            Span::styled(" type ", label_style),
            Span::styled(" q ", key_style),
            Span::styled(" quit ", label_style),
        ]),
    }

    if !app.affordance().choices().is_empty() {
        hints.extend(vec![
            Span::styled(" Tab ", key_style),
            Span::styled(" focus ", label_style),
        ]);
    }
    if app.session.in_flow() {
        hints.extend(vec![
            Span::styled(" ^X ", key_style),
            Span::styled(" cancel flow ", label_style),
        ]);
    }
    if !app.session.connection().is_connected() {
        hints.extend(vec![
            Span::styled(" ^R ", key_style),
            Span::styled(" reconnect ", label_style),
        ]);
    }

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
