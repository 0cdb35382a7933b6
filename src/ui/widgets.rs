use ratatui::{
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use crate::app::App;
use crate::content::ParsedContent;
use crate::models::MessageRole;

const KEY_SECTIONS: [(&str, &[(&str, &str)]); 3] = [
    (
        "General",
        &[
            ("Ctrl+H", "toggle this window"),
            ("Ctrl+Q", "quit"),
            ("Ctrl+C Ctrl+C", "quit"),
        ],
    ),
    (
        "Chat",
        &[
            ("Enter", "ask the documents"),
            ("Esc", "stop the streaming reply"),
            ("Tab", "show or hide model thoughts"),
        ],
    ),
    (
        "History",
        &[
            ("Up / Down", "scroll one line"),
            ("PgUp / PgDn", "scroll a page"),
            ("Home / End", "first or latest message"),
        ],
    ),
];

pub fn render_help_window(frame: &mut Frame, area: Rect) {
    let accent = Style::default().fg(Color::Cyan);
    let mut help_text = vec![
        Line::from(Span::styled(
            "DocStream - Keyboard Shortcuts",
            accent.add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    for (section, bindings) in KEY_SECTIONS {
        help_text.push(Line::from(Span::styled(
            section,
            Style::default().add_modifier(Modifier::BOLD),
        )));
        for (keys, action) in bindings {
            help_text.push(Line::from(vec![
                Span::styled(format!("  {keys:<15}"), accent),
                Span::raw(*action),
            ]));
        }
        help_text.push(Line::from(""));
    }
    help_text.push(Line::from(Span::styled(
        "Ctrl+H or Esc closes this window",
        Style::default().fg(Color::DarkGray),
    )));

    #[allow(clippy::cast_possible_truncation)]
    let popup = Rect {
        width: area.width.min(56),
        height: area.height.min(help_text.len() as u16 + 2),
        ..area
    };
    let popup = Rect {
        x: area.x + (area.width - popup.width) / 2,
        y: area.y + (area.height - popup.height) / 2,
        ..popup
    };

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(help_text).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .border_style(accent),
        ),
        popup,
    );
}

pub fn render_bottom_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (text, style) = if app.exit_pending {
        (
            "Press Ctrl+C again to exit, Esc to cancel",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )
    } else if app.is_loading() {
        (
            "Esc: Cancel reply | Tab: Thoughts | Ctrl+H: Help",
            Style::default().fg(Color::DarkGray),
        )
    } else {
        (
            "Ctrl+C: Quit | Tab: Thoughts | Ctrl+H: Help",
            Style::default().fg(Color::DarkGray),
        )
    };

    let bar = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(style);

    frame.render_widget(bar, area);
}

pub fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    if let Some(status) = &app.status {
        let status = Paragraph::new(status.as_str())
            .alignment(Alignment::Left)
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD));
        frame.render_widget(status, area);
        return;
    }

    let indicator = if app.is_thinking() {
        " [Thinking...]"
    } else if app.is_loading() {
        " [Streaming...]"
    } else {
        ""
    };
    let model = app.model.as_deref().unwrap_or("default model");

    let status = Paragraph::new(format!(
        "{} | {model}{indicator}",
        app.conversation_title
    ))
    .alignment(Alignment::Right)
    .style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD));

    frame.render_widget(status, area);
}

fn push_header(lines: &mut Vec<Line<'static>>, role: &MessageRole) {
    let (label, color) = match role {
        MessageRole::User => ("User", Color::Cyan),
        MessageRole::Assistant => ("Assistant", Color::Green),
        MessageRole::System => ("System", Color::Magenta),
    };

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("## {label}"),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));
}

fn push_response_lines(lines: &mut Vec<Line<'static>>, response: &str) {
    let mut in_code_block = false;

    for content_line in response.lines() {
        let trimmed = content_line.trim();
        if let Some(lang) = trimmed.strip_prefix("```") {
            if in_code_block {
                lines.push(Line::from(Span::styled(
                    "└──────────────────────────────────────────────",
                    Style::default().fg(Color::DarkGray),
                )));
            } else {
                let lang = if lang.trim().is_empty() { "code" } else { lang.trim() };
                lines.push(Line::from(Span::styled(
                    format!("┌─ {lang} ───────────────────────────────────────────"),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            in_code_block = !in_code_block;
        } else if in_code_block {
            lines.push(Line::from(Span::styled(
                format!("  {content_line}"),
                Style::default().fg(Color::Green),
            )));
        } else {
            lines.push(Line::from(content_line.to_string()));
        }
    }
}

fn push_assistant_lines(lines: &mut Vec<Line<'static>>, parsed: &ParsedContent, show_thinking: bool) {
    let faded = Style::default().fg(Color::DarkGray);

    if let Some(think) = &parsed.think_process {
        let label = if parsed.is_thinking {
            "    | Thinking..."
        } else if show_thinking {
            "    | Thoughts"
        } else {
            "    | Thoughts (hidden, Tab to show)"
        };
        lines.push(Line::from(Span::styled(
            label,
            faded.add_modifier(Modifier::ITALIC),
        )));
        if show_thinking {
            for think_line in think.lines() {
                lines.push(Line::from(Span::styled(format!("        {think_line}"), faded)));
            }
        }
    }

    push_response_lines(lines, &parsed.response);

    if !parsed.notes.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  Notes",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        for note in &parsed.notes {
            lines.push(Line::from(vec![
                Span::styled(format!("  • {}", note.keyword), Style::default().fg(Color::Yellow)),
                Span::raw(format!(": {}", note.content)),
            ]));
        }
    }
}

pub fn render_chat_history(frame: &mut Frame, app: &mut App, area: Rect) {
    if app.messages.is_empty() && app.stream.is_none() {
        let welcome_text = vec![
            Line::from(Span::styled(
                "Welcome to DocStream",
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Ask anything about the documents in this conversation",
                Style::default().fg(Color::Cyan),
            )),
        ];

        let welcome_height = 2;
        let welcome_area = Rect {
            x: area.x,
            y: area.y + area.height.saturating_sub(welcome_height),
            width: area.width,
            height: welcome_height.min(area.height),
        };

        frame.render_widget(
            Paragraph::new(welcome_text).alignment(Alignment::Center),
            welcome_area,
        );
        return;
    }

    let mut lines = Vec::new();

    for (role, parsed) in app.rendered_messages() {
        push_header(&mut lines, role);
        match role {
            MessageRole::Assistant => push_assistant_lines(&mut lines, &parsed, app.show_thinking),
            _ => push_response_lines(&mut lines, &parsed.response),
        }
    }

    if let Some(stream) = &app.stream {
        push_header(&mut lines, &MessageRole::Assistant);
        if stream.content.is_empty() {
            lines.push(Line::from(Span::styled("...", Style::default().fg(Color::DarkGray))));
        } else {
            push_assistant_lines(&mut lines, &stream.parsed, app.show_thinking);
        }
    }

    // Account for wrapping to find the true visual height
    let available_width = (area.width as usize).max(1);
    let total_visual_lines: usize = lines
        .iter()
        .map(|line| line.width().div_ceil(available_width).max(1))
        .sum();

    let max_scroll = total_visual_lines.saturating_sub(area.height as usize);
    let actual_scroll = app.scroll_offset.min(max_scroll);
    app.scroll_offset = actual_scroll;

    let chat_history = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((u16::try_from(actual_scroll).unwrap_or(u16::MAX), 0));

    frame.render_widget(chat_history, area);
}

pub fn render_input_field(frame: &mut Frame, app: &App, area: Rect) {
    let (input_text, input_style) = if app.input_buffer.is_empty() {
        ("Ask about your documents...", Style::default().fg(Color::Gray))
    } else {
        (
            app.input_buffer.as_str(),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )
    };

    let input = Paragraph::new(input_text)
        .style(input_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .wrap(Wrap { trim: false });

    frame.render_widget(input, area);
}
