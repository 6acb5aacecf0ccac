use chrono::Utc;
use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
};
use ragchat_core::{ChatRole, DirectoryStatus, UploadPhase};

use crate::app::{App, FocusPane, InputMode, Popup, TextInput, WelcomeField};
use crate::markdown::render_markdown;

const SIDEBAR_WIDTH: u16 = 34;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let banner_height = banner_height(app);

    // Main layout: header, banner, body, input, footer
    let [header_area, banner_area, body_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(banner_height),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    if banner_height > 0 {
        render_banner(app, frame, banner_area);
    }

    if app.show_sidebar {
        let [chat_area, sidebar_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(SIDEBAR_WIDTH),
        ])
        .areas(body_area);
        app.chat_area = Some(chat_area);
        app.sidebar_area = Some(sidebar_area);
        render_chat(app, frame, chat_area);
        render_sidebar(app, frame, sidebar_area);
    } else {
        app.chat_area = Some(body_area);
        app.sidebar_area = None;
        render_chat(app, frame, body_area);
    }

    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    // Render popups
    match app.popup {
        Some(Popup::Welcome) => render_welcome(app, frame, area),
        Some(Popup::UploadPath) => render_upload_prompt(app, frame, area),
        Some(Popup::ConfirmClear) => render_confirm_clear(frame, area),
        None => {}
    }
}

fn banner_height(app: &App) -> u16 {
    let upload = match app.uploads.current() {
        Some(task) if !task.phase.is_finished() => 3,
        Some(_) => 1,
        None => 0,
    };
    let notice = u16::from(app.notice.is_some() || app.directory.failure().is_some());
    upload + notice
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let company = match &app.profile {
        Some(profile) => format!(" {} ", profile.name),
        None => String::new(),
    };
    let (status_text, status_color) = match app.backend_online {
        Some(true) => ("● online", Color::Green),
        Some(false) => ("● offline", Color::Red),
        None => ("● connecting", Color::Yellow),
    };

    let title = Line::from(vec![
        Span::styled(" Domain-Specific RAG Chatbot ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(company, Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_banner(app: &App, frame: &mut Frame, area: Rect) {
    let mut remaining = area;

    if let Some(task) = app.uploads.current() {
        match task.phase {
            UploadPhase::Transferring | UploadPhase::Pending => {
                let [gauge_area, rest] =
                    Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(remaining);
                let gauge = Gauge::default()
                    .block(
                        Block::default()
                            .borders(Borders::ALL)
                            .border_style(Style::default().fg(Color::Blue))
                            .title(format!(" Uploading {} ", task.filename)),
                    )
                    .gauge_style(Style::default().fg(Color::Blue).bg(Color::Black))
                    .percent(u16::from(task.progress_percent));
                frame.render_widget(gauge, gauge_area);
                remaining = rest;
            }
            UploadPhase::Succeeded => {
                let [line_area, rest] =
                    Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(remaining);
                let text = format!(
                    " Successfully processed {}. You can now ask questions about it!  [x] dismiss",
                    task.filename
                );
                frame.render_widget(
                    Paragraph::new(text).style(Style::default().bg(Color::Green).fg(Color::Black)),
                    line_area,
                );
                remaining = rest;
            }
            UploadPhase::Failed => {
                let [line_area, rest] =
                    Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(remaining);
                let text = format!(
                    " {}: {}  [x] dismiss",
                    task.filename,
                    task.error_message.as_deref().unwrap_or("upload failed")
                );
                frame.render_widget(
                    Paragraph::new(text).style(Style::default().bg(Color::Red).fg(Color::White)),
                    line_area,
                );
                remaining = rest;
            }
        }
    }

    let notice = app
        .notice
        .clone()
        .or_else(|| {
            app.directory
                .failure()
                .map(|reason| format!("Could not load documents: {} (press r to retry)", reason))
        });
    if let Some(text) = notice {
        frame.render_widget(
            Paragraph::new(format!(" {}", text)).style(Style::default().bg(Color::Yellow).fg(Color::Black)),
            remaining,
        );
    }
}

/// Build the full chat transcript as styled lines.
fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for msg in app.conversation.messages() {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                for line in msg.content.lines() {
                    lines.push(Line::from(line.to_string()));
                }
            }
            ChatRole::Assistant => {
                let (label, color) = if msg.is_error {
                    ("Assistant (error):", Color::Red)
                } else {
                    ("Assistant:", Color::Yellow)
                };
                lines.push(Line::from(Span::styled(
                    label,
                    Style::default().fg(color).add_modifier(Modifier::BOLD),
                )));
                if msg.is_error {
                    lines.push(Line::from(Span::styled(msg.content.clone(), Style::default().fg(Color::Red))));
                } else {
                    lines.extend(render_markdown(&msg.content));
                }
                if !msg.sources.is_empty() {
                    let sources: Vec<String> = msg.sources.iter().map(|s| s.display()).collect();
                    lines.push(Line::from(Span::styled(
                        format!("Sources: {}", sources.join(", ")),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                }
            }
            ChatRole::System => {
                for line in msg.content.lines() {
                    lines.push(
                        Line::from(Span::styled(
                            line.to_string(),
                            Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
                        ))
                        .centered(),
                    );
                }
            }
        }
        lines.push(Line::default());
    }

    if app.conversation.is_waiting() {
        lines.push(Line::from(Span::styled(
            "Assistant:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}  (Esc to cancel)", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let title = match app.conversation.active_document() {
        Some(doc) => format!(" Chat · {} ", doc.name),
        None => " Chat · all documents ".to_string(),
    };
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);
    if !app.follow_output {
        block = block.title_bottom(Line::from(" ↓ more below (G to follow) ").right_aligned());
    }

    // Measured without the block so the count is rows of wrapped text only
    let chat = Paragraph::new(Text::from(chat_lines(app))).wrap(Wrap { trim: false });
    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    let rows = chat.line_count(inner_width).min(usize::from(u16::MAX)) as u16;
    app.update_chat_layout(rows, inner_height);

    let chat = chat.block(block).scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_sidebar(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Documents;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Documents ({}) ", app.directory.len()));

    let placeholder = match app.directory.status() {
        DirectoryStatus::Unloaded => Some("Loading documents...".to_string()),
        DirectoryStatus::Failed(_) => Some("Document list unavailable.\nPress r to retry.".to_string()),
        DirectoryStatus::Ready if app.directory.is_empty() => {
            Some("No documents yet.\nPress u to upload a PDF or TXT file.".to_string())
        }
        DirectoryStatus::Ready => None,
    };
    if let Some(text) = placeholder {
        let paragraph = Paragraph::new(text)
            .block(block)
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let now = Utc::now();
    let active_id = app.conversation.active_document().map(|doc| doc.id.clone());
    let items: Vec<ListItem> = app
        .directory
        .documents()
        .iter()
        .map(|doc| {
            let is_active = active_id.as_deref() == Some(doc.id.as_str());
            let marker = if is_active { "● " } else { "  " };
            let name_style = if is_active {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(vec![
                Line::from(vec![
                    Span::styled(marker, Style::default().fg(Color::Green)),
                    Span::styled(doc.name.clone(), name_style),
                ]),
                Line::from(Span::styled(
                    format!("    {} · {}", doc.display_size(), doc.display_age(now)),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        );

    frame.render_stateful_widget(list, area, &mut app.documents_state);
}

fn char_width(c: char) -> usize {
    let mut buf = [0u8; 4];
    Span::raw(&*c.encode_utf8(&mut buf)).width()
}

/// Visible slice of a text field and the cursor column within it, both in
/// terminal cells so wide characters keep the cursor aligned.
fn visible_input(input: &TextInput, width: u16) -> (String, u16) {
    let width = usize::from(width.max(1));
    let chars: Vec<(char, usize)> = input.text.chars().map(|c| (c, char_width(c))).collect();
    let cursor = input.cursor.min(chars.len());

    // Leave one cell for the cursor itself
    let mut offset = 0;
    let mut before_cursor: usize = chars[..cursor].iter().map(|(_, w)| w).sum();
    while offset < cursor && before_cursor + 1 > width {
        before_cursor -= chars[offset].1;
        offset += 1;
    }

    let mut used = 0;
    let visible: String = chars[offset..]
        .iter()
        .take_while(|(_, w)| {
            used += w;
            used <= width
        })
        .map(|(c, _)| c)
        .collect();
    (visible, before_cursor as u16)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing && app.popup.is_none();
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let title = match app.conversation.active_document() {
        Some(doc) => format!(" Ask about {} ", doc.name),
        None => " Ask a question about your documents ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2);
    let (visible, cursor_col) = visible_input(&app.input, inner_width);
    let content = if app.input.text.is_empty() && !editing {
        Span::styled("Press i to type a question...", Style::default().fg(Color::DarkGray))
    } else {
        Span::raw(visible)
    };

    frame.render_widget(Paragraph::new(Line::from(content)).block(block), area);

    if editing {
        frame.set_cursor_position((area.x + 1 + cursor_col, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match app.input_mode {
        InputMode::Normal => " NORMAL ",
        InputMode::Editing => " TYPING ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let hint = |key: &'static str, label: &'static str| {
        [Span::styled(key, key_style), Span::styled(label, label_style)]
    };

    let mut hints: Vec<Span> = Vec::new();
    match (app.popup, app.input_mode) {
        (Some(Popup::ConfirmClear), _) => {
            hints.extend(hint(" y ", " clear "));
            hints.extend(hint(" n ", " keep "));
        }
        (Some(Popup::UploadPath), _) => {
            hints.extend(hint(" Enter ", " upload "));
            hints.extend(hint(" Esc ", " cancel "));
        }
        (Some(Popup::Welcome), _) => {
            hints.extend(hint(" Tab ", " next field "));
            hints.extend(hint(" Enter ", " get started "));
            hints.extend(hint(" Esc ", " skip "));
        }
        (None, InputMode::Editing) => {
            hints.extend(hint(" Enter ", " send "));
            if app.conversation.is_waiting() {
                hints.extend(hint(" Esc ", " cancel "));
            } else {
                hints.extend(hint(" Esc ", " stop typing "));
            }
        }
        (None, InputMode::Normal) => {
            match app.focus {
                FocusPane::Chat => hints.extend(hint(" j/k ", " scroll ")),
                FocusPane::Documents => {
                    hints.extend(hint(" j/k ", " nav "));
                    hints.extend(hint(" Enter ", " select "));
                    hints.extend(hint(" a ", " all docs "));
                }
            }
            hints.extend(hint(" i ", " type "));
            hints.extend(hint(" u ", " upload "));
            hints.extend(hint(" r ", " refresh "));
            hints.extend(hint(" d ", " sidebar "));
            hints.extend(hint(" Tab ", " focus "));
            if app.uploads.current().is_some_and(|task| task.phase.is_finished()) {
                hints.extend(hint(" x ", " dismiss "));
            }
            hints.extend(hint(" c ", " clear "));
            hints.extend(hint(" q ", " quit "));
        }
    }

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let [area] = Layout::horizontal([Constraint::Length(width.min(area.width))])
        .flex(Flex::Center)
        .areas(area);
    let [area] = Layout::vertical([Constraint::Length(height.min(area.height))])
        .flex(Flex::Center)
        .areas(area);
    area
}

fn render_upload_prompt(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 70, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Upload a PDF or TXT file ");
    let inner_width = popup_area.width.saturating_sub(2);
    let (visible, cursor_col) = visible_input(&app.upload_path, inner_width);

    let text = vec![
        Line::from(visible),
        Line::from(Span::styled(
            "Type or drop a file path, then press Enter",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(Paragraph::new(text).block(block), popup_area);
    frame.set_cursor_position((popup_area.x + 1 + cursor_col, popup_area.y + 1));
}

fn render_confirm_clear(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 52, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Clear conversation? ");
    let text = vec![
        Line::from("This removes every message and cannot be undone."),
        Line::from(Span::styled(
            "Press y to clear, n to keep the conversation",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: true }), popup_area);
}

fn render_welcome(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(area, 64, 12);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Welcome to Your AI Assistant ");
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let [name_area, purpose_area, help_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(0),
    ])
    .areas(inner);

    let fields = [
        (WelcomeField::Name, " Company Name ", &app.welcome.name, name_area),
        (WelcomeField::Purpose, " What is your company about? ", &app.welcome.purpose, purpose_area),
    ];
    for (field, title, input, field_area) in fields {
        let active = app.welcome.field == field;
        let border = if active { Color::Yellow } else { Color::DarkGray };
        let field_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(title);
        let (visible, cursor_col) = visible_input(input, field_area.width.saturating_sub(2));
        frame.render_widget(Paragraph::new(visible).block(field_block), field_area);
        if active {
            frame.set_cursor_position((field_area.x + 1 + cursor_col, field_area.y + 1));
        }
    }

    let help = match &app.welcome.error {
        Some(error) => Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))),
        None => Line::from(Span::styled(
            "Tab switches fields · Enter gets started · Esc skips for now",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(help), help_area);
}
