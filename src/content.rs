// Extraction of think blocks, notes and fenced JSON from accumulated stream text

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::FinalDecodeError;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";
const NOTE_OPEN: &str = "<note>";
const NOTE_CLOSE: &str = "</note>";
const JSON_FENCE_OPEN: &str = "```json";
const FENCE: &str = "```";

/// A `<note>keyword:content</note>` tag pulled out of a response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub keyword: String,
    pub content: String,
}

impl Note {
    /// Split on the first colon; everything after it stays joined.
    fn from_span(span: &str) -> Self {
        let (keyword, content) = span.split_once(':').unwrap_or((span, ""));
        Self {
            keyword: keyword.trim().to_string(),
            content: content.trim().to_string(),
        }
    }
}

/// Read-only view over an accumulated response buffer.
///
/// Recomputing it from the same buffer always yields the same value, so
/// callers can re-parse after every delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedContent {
    pub think_process: Option<String>,
    pub is_thinking: bool,
    pub response: String,
    pub notes: Vec<Note>,
}

impl ParsedContent {
    pub fn parse(buffer: &str) -> Self {
        let think = split_think(buffer);
        let (response, notes) = extract_notes(&think.remainder);

        Self {
            think_process: think.process,
            is_thinking: think.open,
            response,
            notes,
        }
    }
}

struct ThinkSplit {
    remainder: String,
    process: Option<String>,
    open: bool,
}

/// Only the first `<think>` region counts. Once closed, later tags are plain text.
fn split_think(buffer: &str) -> ThinkSplit {
    let Some(open_at) = buffer.find(THINK_OPEN) else {
        return ThinkSplit {
            remainder: buffer.to_string(),
            process: None,
            open: false,
        };
    };

    let before = &buffer[..open_at];
    let body_start = open_at + THINK_OPEN.len();
    let tail = &buffer[body_start..];

    match tail.find(THINK_CLOSE) {
        Some(close_at) => {
            let after = &tail[close_at + THINK_CLOSE.len()..];
            let mut remainder = String::with_capacity(before.len() + after.len());
            remainder.push_str(before);
            remainder.push_str(after);
            ThinkSplit {
                remainder,
                process: Some(collapse_lines(&tail[..close_at])),
                open: false,
            }
        }
        None => ThinkSplit {
            remainder: before.to_string(),
            process: Some(collapse_lines(tail)),
            open: true,
        },
    }
}

fn collapse_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    Outside,
    InsideNote { tag_start: usize },
}

fn extract_notes(text: &str) -> (String, Vec<Note>) {
    let mut response = String::with_capacity(text.len());
    let mut notes = Vec::new();
    let mut state = ScanState::Outside;
    let mut cursor = 0;

    loop {
        match state {
            ScanState::Outside => {
                let Some(found) = text[cursor..].find(NOTE_OPEN) else {
                    response.push_str(&text[cursor..]);
                    break;
                };
                let tag_start = cursor + found;
                response.push_str(&text[cursor..tag_start]);
                cursor = tag_start + NOTE_OPEN.len();
                state = ScanState::InsideNote { tag_start };
            }
            ScanState::InsideNote { tag_start } => {
                let Some(found) = text[cursor..].find(NOTE_CLOSE) else {
                    // Unclosed tag: not a note yet, keep it verbatim
                    response.push_str(&text[tag_start..]);
                    break;
                };
                notes.push(Note::from_span(&text[cursor..cursor + found]));
                cursor += found + NOTE_CLOSE.len();
                state = ScanState::Outside;
            }
        }
    }

    (response, notes)
}

/// Drop the first "```json" marker and then the first remaining "```".
pub fn strip_json_fence(text: &str) -> String {
    text.replacen(JSON_FENCE_OPEN, "", 1).replacen(FENCE, "", 1)
}

pub fn decode_fenced_json<T: DeserializeOwned>(text: &str) -> Result<T, FinalDecodeError> {
    let payload = strip_json_fence(text);
    serde_json::from_str(&payload).map_err(|source| FinalDecodeError { payload, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        let deltas = ["Hello", ", ", "world", "!"];
        let buffer: String = deltas.concat();
        let parsed = ParsedContent::parse(&buffer);
        assert_eq!(parsed.response, "Hello, world!");
        assert!(parsed.think_process.is_none());
        assert!(!parsed.is_thinking);
        assert!(parsed.notes.is_empty());
    }

    #[test]
    fn test_closed_think_block() {
        let parsed = ParsedContent::parse("A<think>B\nC</think>D");
        assert_eq!(parsed.think_process.as_deref(), Some("B\nC"));
        assert_eq!(parsed.response, "AD");
        assert!(!parsed.is_thinking);
    }

    #[test]
    fn test_open_think_block() {
        let parsed = ParsedContent::parse("A<think>B");
        assert_eq!(parsed.think_process.as_deref(), Some("B"));
        assert_eq!(parsed.response, "A");
        assert!(parsed.is_thinking);
    }

    #[test]
    fn test_think_collapses_blank_lines_and_trims() {
        let parsed = ParsedContent::parse("<think>\n  first  \n\n\n second\n</think>answer");
        assert_eq!(parsed.think_process.as_deref(), Some("first\nsecond"));
        assert_eq!(parsed.response, "answer");
    }

    #[test]
    fn test_closed_think_never_reopens() {
        let parsed = ParsedContent::parse("<think>x</think>y<think>z");
        assert_eq!(parsed.think_process.as_deref(), Some("x"));
        assert!(!parsed.is_thinking);
        assert_eq!(parsed.response, "y<think>z");
    }

    #[test]
    fn test_stray_close_tag_is_left_alone() {
        let parsed = ParsedContent::parse("a</think>b");
        assert!(parsed.think_process.is_none());
        assert_eq!(parsed.response, "a</think>b");
    }

    #[test]
    fn test_note_extraction() {
        let parsed = ParsedContent::parse("X<note>kw:val</note>Y");
        assert_eq!(
            parsed.notes,
            vec![Note {
                keyword: "kw".to_string(),
                content: "val".to_string()
            }]
        );
        assert_eq!(parsed.response, "XY");
    }

    #[test]
    fn test_note_with_multiple_colons() {
        let parsed = ParsedContent::parse("<note>kw:a:b</note>");
        assert_eq!(parsed.notes[0].keyword, "kw");
        assert_eq!(parsed.notes[0].content, "a:b");
        assert_eq!(parsed.response, "");
    }

    #[test]
    fn test_multiple_notes_in_discovery_order() {
        let parsed = ParsedContent::parse("<note>one:1</note>mid<note>two:2</note>end");
        let keywords: Vec<_> = parsed.notes.iter().map(|n| n.keyword.as_str()).collect();
        assert_eq!(keywords, vec!["one", "two"]);
        assert_eq!(parsed.response, "midend");
    }

    #[test]
    fn test_note_without_colon() {
        let parsed = ParsedContent::parse("<note>loose</note>");
        assert_eq!(parsed.notes[0].keyword, "loose");
        assert_eq!(parsed.notes[0].content, "");
    }

    #[test]
    fn test_unclosed_note_stays_in_response() {
        let parsed = ParsedContent::parse("a<note>kw:partial");
        assert!(parsed.notes.is_empty());
        assert_eq!(parsed.response, "a<note>kw:partial");
    }

    #[test]
    fn test_think_and_notes_together() {
        let parsed =
            ParsedContent::parse("<think>plan</think>Answer <note>term:definition</note>done");
        assert_eq!(parsed.think_process.as_deref(), Some("plan"));
        assert_eq!(parsed.response, "Answer done");
        assert_eq!(parsed.notes.len(), 1);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let buffer = "pre<think>a\n\nb</think>x<note>k:v:w</note>y<note>open";
        assert_eq!(ParsedContent::parse(buffer), ParsedContent::parse(buffer));
    }

    #[test]
    fn test_strip_json_fence() {
        assert_eq!(strip_json_fence("```json\n{}\n```"), "\n{}\n");
        assert_eq!(strip_json_fence("{}"), "{}");
    }

    #[test]
    fn test_decode_fenced_json() {
        let value: serde_json::Value = decode_fenced_json("```json\n{\"a\":1}\n```").unwrap();
        assert_eq!(value, serde_json::json!({"a": 1}));
    }

    #[test]
    fn test_decode_fenced_json_failure_is_reported() {
        let err = decode_fenced_json::<serde_json::Value>("```json\n{\"a\":\n```").unwrap_err();
        assert_eq!(err.payload, "\n{\"a\":\n");
    }
}
