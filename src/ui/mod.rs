pub mod widgets;

use crate::app::App;
use ratatui::{
    layout::{Constraint, Direction, Layout},
    Frame,
};

pub fn render(frame: &mut Frame, app: &mut App) {
    // Width available for text is total width - 2 (for borders)
    let available_width = (frame.area().width.saturating_sub(2) as usize).max(1);

    let input_lines = if app.input_buffer.is_empty() {
        1
    } else {
        app.input_buffer.chars().count().div_ceil(available_width)
    };

    // Min 1, max about half the screen
    let max_lines = (frame.area().height as usize / 2).saturating_sub(2).max(1);
    let actual_lines = input_lines.clamp(1, max_lines);

    #[allow(clippy::cast_possible_truncation)]
    let input_height = (actual_lines + 2) as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),               // Chat history
            Constraint::Length(1),            // Gap
            Constraint::Length(1),            // Status line
            Constraint::Length(input_height), // Input field
            Constraint::Length(1),            // Keymap bar
        ])
        .split(frame.area());

    widgets::render_chat_history(frame, app, chunks[0]);
    widgets::render_status_bar(frame, app, chunks[2]);
    widgets::render_input_field(frame, app, chunks[3]);
    widgets::render_bottom_bar(frame, app, chunks[4]);

    if app.show_help {
        widgets::render_help_window(frame, frame.area());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AppEvent;
    use ratatui::{backend::TestBackend, Terminal};

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(ratatui::buffer::Cell::symbol)
            .collect()
    }

    #[test]
    fn test_render_streaming_reply() {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let mut app = App::new(1, None);
        app.input_buffer = "What is attention?".to_string();
        let (_, control) = app.begin_stream().unwrap();
        app.handle_event(AppEvent::StreamDelta {
            stream_id: control.id,
            text: "<think>checking".to_string(),
        });

        terminal.draw(|f| render(f, &mut app)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("What is attention?"));
        assert!(text.contains("Thinking"));
    }

    #[test]
    fn test_render_notes() {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let mut app = App::new(1, None);
        app.messages
            .push(crate::models::ChatMessage::assistant("Done<note>term:meaning</note>"));

        terminal.draw(|f| render(f, &mut app)).unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains("term: meaning"));
        assert!(!text.contains("<note>"));
    }

    #[test]
    fn test_render_help_window() {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        let mut app = App::new(1, None);
        app.show_help = true;

        terminal.draw(|f| render(f, &mut app)).unwrap();

        assert!(buffer_text(&terminal).contains("Keyboard Shortcuts"));
    }
}
