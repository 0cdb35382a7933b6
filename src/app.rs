use crate::api::Notification;
use crate::content::ParsedContent;
use crate::events::AppEvent;
use crate::models::{ChatMessage, MessageRole};
use crate::stream::StreamControl;

/// The assistant reply currently being streamed
#[derive(Debug)]
pub struct ActiveStream {
    pub control: StreamControl,
    pub content: String,
    pub parsed: ParsedContent,
}

impl ActiveStream {
    fn new(control: StreamControl) -> Self {
        Self {
            control,
            content: String::new(),
            parsed: ParsedContent::default(),
        }
    }

    fn append(&mut self, text: &str) {
        self.content.push_str(text);
        self.parsed = ParsedContent::parse(&self.content);
    }
}

#[derive(Debug)]
pub struct App {
    pub should_quit: bool,
    pub conversation_id: i64,
    pub conversation_title: String,
    pub messages: Vec<ChatMessage>,
    pub stream: Option<ActiveStream>,
    pub input_buffer: String,
    pub scroll_offset: usize,
    pub show_help: bool,
    pub exit_pending: bool,
    pub model: Option<String>,
    pub status: Option<String>,
    pub show_thinking: bool,
}

impl App {
    pub fn new(conversation_id: i64, model: Option<String>) -> Self {
        Self {
            should_quit: false,
            conversation_id,
            conversation_title: format!("Conversation {conversation_id}"),
            messages: Vec::new(),
            stream: None,
            input_buffer: String::new(),
            scroll_offset: 0,
            show_help: false,
            exit_pending: false,
            model,
            status: None,
            show_thinking: false,
        }
    }

    pub const fn is_loading(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_thinking(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.parsed.is_thinking)
    }

    pub const fn quit(&mut self) {
        self.should_quit = true;
    }

    pub const fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub const fn toggle_thinking(&mut self) {
        self.show_thinking = !self.show_thinking;
    }

    pub const fn scroll_up(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(amount);
    }

    pub const fn scroll_down(&mut self, amount: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(amount);
    }

    pub const fn scroll_to_top(&mut self) {
        self.scroll_offset = 0;
    }

    pub const fn scroll_to_bottom(&mut self) {
        // Clamped to the real maximum while rendering
        self.scroll_offset = usize::MAX;
    }

    /// Move the typed input into history and open a new stream for the reply.
    ///
    /// Returns the request history and the control handle for the new stream,
    /// or `None` when there is nothing to send or a reply is still streaming.
    pub fn begin_stream(&mut self) -> Option<(Vec<ChatMessage>, StreamControl)> {
        if self.is_loading() || self.input_buffer.trim().is_empty() {
            return None;
        }

        let text = std::mem::take(&mut self.input_buffer);
        self.messages.push(ChatMessage::user(text));

        let control = StreamControl::new();
        self.stream = Some(ActiveStream::new(control.clone()));
        self.status = None;
        self.scroll_to_bottom();

        let history = self
            .messages
            .iter()
            .filter(|message| !message.interrupted)
            .cloned()
            .collect();
        Some((history, control))
    }

    /// Cancel the running stream, keeping whatever text already arrived.
    pub fn cancel_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.control.cancel();
            if !stream.content.is_empty() {
                self.messages.push(ChatMessage::interrupted(stream.content));
            }
            self.status = Some("Response cancelled".to_string());
        }
    }

    fn is_current(&self, stream_id: uuid::Uuid) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|s| s.control.id == stream_id)
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::StreamDelta { stream_id, text } => {
                if !self.is_current(stream_id) {
                    return;
                }
                if let Some(stream) = self.stream.as_mut() {
                    stream.append(&text);
                }
                self.scroll_to_bottom();
            }
            AppEvent::StreamDone { stream_id } => {
                if !self.is_current(stream_id) {
                    return;
                }
                if let Some(stream) = self.stream.take() {
                    self.messages.push(ChatMessage::assistant(stream.content));
                }
                self.scroll_to_bottom();
            }
            AppEvent::StreamFailed { stream_id, message } => {
                if !self.is_current(stream_id) {
                    return;
                }
                if let Some(stream) = self.stream.take() {
                    if !stream.content.is_empty() {
                        self.messages.push(ChatMessage::interrupted(stream.content));
                    }
                }
                self.status = Some(format!("Error: {message}"));
                self.scroll_to_bottom();
            }
            AppEvent::Notice(Notification::AuthExpired) => {
                self.status =
                    Some("Session expired, run `docstream set-token` and reconnect".to_string());
            }
        }
    }

    /// Messages that were sent as the assistant, parsed for display.
    pub fn rendered_messages(&self) -> impl Iterator<Item = (&MessageRole, ParsedContent)> + '_ {
        self.messages.iter().map(|message| match message.role {
            MessageRole::Assistant => (&message.role, ParsedContent::parse(&message.content)),
            _ => (
                &message.role,
                ParsedContent {
                    response: message.content.clone(),
                    ..ParsedContent::default()
                },
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app_with_stream() -> (App, uuid::Uuid) {
        let mut app = App::new(1, None);
        app.input_buffer = "question".to_string();
        let (history, control) = app.begin_stream().unwrap();
        assert_eq!(history, vec![ChatMessage::user("question")]);
        (app, control.id)
    }

    #[test]
    fn test_app_new() {
        let app = App::new(3, Some("advanced".to_string()));
        assert!(!app.should_quit);
        assert!(!app.is_loading());
        assert_eq!(app.conversation_id, 3);
    }

    #[test]
    fn test_app_quit() {
        let mut app = App::new(1, None);
        app.quit();
        assert!(app.should_quit);
    }

    #[test]
    fn test_begin_stream_requires_input() {
        let mut app = App::new(1, None);
        app.input_buffer = "   ".to_string();
        assert!(app.begin_stream().is_none());
        assert!(app.messages.is_empty());
    }

    #[test]
    fn test_begin_stream_rejects_concurrent_streams() {
        let (mut app, _) = app_with_stream();
        app.input_buffer = "again".to_string();
        assert!(app.begin_stream().is_none());
        assert_eq!(app.input_buffer, "again");
    }

    #[test]
    fn test_deltas_update_parsed_view() {
        let (mut app, id) = app_with_stream();
        app.handle_event(AppEvent::StreamDelta {
            stream_id: id,
            text: "<think>reading".to_string(),
        });
        assert!(app.is_thinking());

        app.handle_event(AppEvent::StreamDelta {
            stream_id: id,
            text: "</think>Answer".to_string(),
        });
        assert!(!app.is_thinking());
        let parsed = &app.stream.as_ref().unwrap().parsed;
        assert_eq!(parsed.response, "Answer");
        assert_eq!(parsed.think_process.as_deref(), Some("reading"));
    }

    #[test]
    fn test_done_moves_reply_into_history() {
        let (mut app, id) = app_with_stream();
        app.handle_event(AppEvent::StreamDelta {
            stream_id: id,
            text: "Hi<note>kw:v</note>".to_string(),
        });
        app.handle_event(AppEvent::StreamDone { stream_id: id });

        assert!(!app.is_loading());
        assert_eq!(app.messages.len(), 2);
        let (_, parsed) = app.rendered_messages().last().unwrap();
        assert_eq!(parsed.response, "Hi");
        assert_eq!(parsed.notes.len(), 1);
    }

    #[test]
    fn test_events_from_stale_streams_are_ignored() {
        let (mut app, _) = app_with_stream();
        app.handle_event(AppEvent::StreamDelta {
            stream_id: uuid::Uuid::new_v4(),
            text: "stale".to_string(),
        });
        assert!(app.stream.as_ref().unwrap().content.is_empty());
    }

    #[test]
    fn test_cancel_stream_fires_token() {
        let (mut app, id) = app_with_stream();
        let control = app.stream.as_ref().unwrap().control.clone();
        app.handle_event(AppEvent::StreamDelta {
            stream_id: id,
            text: "partial".to_string(),
        });

        app.cancel_stream();

        assert!(control.is_cancelled());
        assert!(!app.is_loading());
        assert_eq!(app.messages.last().unwrap().content, "partial");

        // The cancelled task still reports back; it must not touch state
        app.handle_event(AppEvent::StreamFailed {
            stream_id: id,
            message: "Stream cancelled".to_string(),
        });
        assert_eq!(app.status.as_deref(), Some("Response cancelled"));
    }

    #[test]
    fn test_interrupted_replies_are_not_sent_again() {
        let (mut app, id) = app_with_stream();
        app.handle_event(AppEvent::StreamDelta {
            stream_id: id,
            text: "<think>half".to_string(),
        });
        app.cancel_stream();
        assert!(app.messages.last().unwrap().interrupted);

        app.input_buffer = "retry".to_string();
        let (history, control) = app.begin_stream().unwrap();
        assert_eq!(
            history,
            vec![ChatMessage::user("question"), ChatMessage::user("retry")]
        );

        app.handle_event(AppEvent::StreamDelta {
            stream_id: control.id,
            text: "partial".to_string(),
        });
        app.handle_event(AppEvent::StreamFailed {
            stream_id: control.id,
            message: "reset".to_string(),
        });
        app.input_buffer = "once more".to_string();
        let (history, _) = app.begin_stream().unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|m| m.role == MessageRole::User));
        // Still shown in the view
        assert_eq!(app.rendered_messages().count(), 5);
    }

    #[test]
    fn test_failure_sets_status() {
        let (mut app, id) = app_with_stream();
        app.handle_event(AppEvent::StreamFailed {
            stream_id: id,
            message: "x".to_string(),
        });
        assert_eq!(app.status.as_deref(), Some("Error: x"));
        assert_eq!(app.messages.len(), 1);
    }

    #[test]
    fn test_auth_notice_sets_status() {
        let mut app = App::new(1, None);
        app.handle_event(AppEvent::Notice(Notification::AuthExpired));
        assert!(app.status.unwrap().contains("set-token"));
    }

    #[test]
    fn test_scroll_up() {
        let mut app = App::new(1, None);
        app.scroll_offset = 10;
        app.scroll_up(3);
        assert_eq!(app.scroll_offset, 7);
        app.scroll_up(10);
        assert_eq!(app.scroll_offset, 0);
    }

    #[test]
    fn test_scroll_to_top_and_bottom() {
        let mut app = App::new(1, None);
        app.scroll_to_bottom();
        assert!(app.scroll_offset > 0);
        app.scroll_to_top();
        assert_eq!(app.scroll_offset, 0);
    }

    #[test]
    fn test_toggles() {
        let mut app = App::new(1, None);
        app.toggle_help();
        assert!(app.show_help);
        app.toggle_thinking();
        assert!(app.show_thinking);
    }
}
