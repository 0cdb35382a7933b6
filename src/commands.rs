// One-shot commands: generation streams and conversation management

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write as _;

use crate::api::DocClient;
use crate::models::{Conversation, FlowSummary, KeywordKind, Quiz};
use crate::stream::StreamControl;

/// A control that is cancelled when the user hits Ctrl+C.
fn interruptible() -> StreamControl {
    let control = StreamControl::new();
    let on_interrupt = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });
    control
}

/// Echo generated text to stderr so stdout stays clean for the result.
fn progress(delta: &str) {
    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(delta.as_bytes());
    let _ = stderr.flush();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

pub async fn flow(client: &DocClient, document_id: i64, json: bool) -> Result<()> {
    let flow = client
        .flow(document_id, &interruptible(), progress)
        .await
        .context("Flow generation failed")?;
    eprintln!();

    if json {
        print_json(&flow)
    } else {
        print!("{}", format_flow(&flow));
        Ok(())
    }
}

pub async fn quiz(client: &DocClient, document_id: i64, page: u32, json: bool) -> Result<()> {
    let quiz = client
        .quiz(document_id, page, &interruptible(), progress)
        .await
        .context("Quiz generation failed")?;
    eprintln!();

    if json {
        print_json(&quiz)
    } else {
        print!("{}", format_quiz(&quiz));
        Ok(())
    }
}

pub async fn list(client: &DocClient, json: bool) -> Result<()> {
    let conversations = client
        .list_conversations()
        .await
        .context("Failed to list conversations")?;

    if json {
        return print_json(&conversations);
    }
    if conversations.is_empty() {
        println!("No conversations yet");
    }
    for conversation in &conversations {
        println!("{}", format_conversation_row(conversation));
    }
    Ok(())
}

pub async fn create(client: &DocClient, title: String, documents: Vec<i64>, json: bool) -> Result<()> {
    let conversation = client
        .create_conversation(title, documents)
        .await
        .context("Failed to create conversation")?;

    if json {
        print_json(&conversation)
    } else {
        println!("Created {}", format_conversation_row(&conversation));
        Ok(())
    }
}

pub async fn delete(client: &DocClient, conversation_id: i64) -> Result<()> {
    client
        .delete_conversation(conversation_id)
        .await
        .context("Failed to delete conversation")?;
    println!("Deleted conversation {conversation_id}");
    Ok(())
}

fn format_conversation_row(conversation: &Conversation) -> String {
    let row = format!("{:>6}  {}", conversation.id, conversation.title);
    if conversation.documents.is_empty() {
        return row;
    }
    let documents: Vec<_> = conversation
        .documents
        .iter()
        .map(|d| d.filename.as_str())
        .collect();
    format!("{row}  [{}]", documents.join(", "))
}

const fn keyword_marker(kind: KeywordKind) -> &'static str {
    match kind {
        KeywordKind::Disruptive => "!",
        KeywordKind::Innovative => "+",
        KeywordKind::Potential => "~",
        KeywordKind::Other => "-",
    }
}

pub fn format_flow(flow: &FlowSummary) -> String {
    let mut out = format!("# {}\n", flow.title);
    if !flow.authors.is_empty() {
        out.push_str(&flow.authors.join(", "));
        out.push('\n');
    }

    let sections = [
        ("Core contributions", &flow.core_contributions),
        ("Open questions", &flow.questions),
    ];
    for (heading, items) in sections {
        if items.is_empty() {
            continue;
        }
        out.push_str(&format!("\n## {heading}\n"));
        for item in items {
            out.push_str(&format!("- {item}\n"));
        }
    }

    if !flow.application.is_empty() {
        out.push_str(&format!("\n## Application\n{}\n", flow.application));
    }
    if !flow.keywords.is_empty() {
        let keywords: Vec<_> = flow
            .keywords
            .iter()
            .map(|k| format!("{}{}", keyword_marker(k.kind), k.text))
            .collect();
        out.push_str(&format!("\nKeywords: {}\n", keywords.join("  ")));
    }
    out
}

pub fn format_quiz(quiz: &Quiz) -> String {
    let mut out = format!("Quiz for page {}\n", quiz.page);

    for (index, question) in quiz.questions.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n", index + 1, question.text));
        for option in &question.options {
            out.push_str(&format!("   {}) {}\n", option.id, option.text));
        }
        let answer = question
            .correct_option()
            .map_or(question.correct_option_id.as_str(), |o| o.text.as_str());
        out.push_str(&format!("   Answer: {answer}\n"));
        if !question.explanation.is_empty() {
            out.push_str(&format!("   {}\n", question.explanation));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentRef, Keyword, QuizOption, QuizQuestion};

    #[test]
    fn test_format_flow() {
        let flow = FlowSummary {
            title: "Attention Is All You Need".to_string(),
            authors: vec!["Vaswani".to_string()],
            core_contributions: vec!["Transformer".to_string()],
            questions: Vec::new(),
            application: "Translation".to_string(),
            keywords: vec![Keyword {
                text: "attention".to_string(),
                kind: KeywordKind::Disruptive,
            }],
        };

        let text = format_flow(&flow);
        assert!(text.starts_with("# Attention Is All You Need\nVaswani\n"));
        assert!(text.contains("## Core contributions\n- Transformer"));
        assert!(!text.contains("Open questions"));
        assert!(text.contains("Keywords: !attention"));
    }

    #[test]
    fn test_format_flow_with_only_a_title() {
        let flow = FlowSummary {
            title: "Untitled".to_string(),
            authors: Vec::new(),
            core_contributions: Vec::new(),
            questions: vec!["Why?".to_string()],
            application: String::new(),
            keywords: Vec::new(),
        };
        assert_eq!(format_flow(&flow), "# Untitled\n\n## Open questions\n- Why?\n");
    }

    #[test]
    fn test_format_quiz_shows_answer_text() {
        let quiz = Quiz {
            questions: vec![QuizQuestion {
                id: "1".to_string(),
                text: "Capital of France?".to_string(),
                options: vec![
                    QuizOption {
                        id: "a".to_string(),
                        text: "Lyon".to_string(),
                    },
                    QuizOption {
                        id: "b".to_string(),
                        text: "Paris".to_string(),
                    },
                ],
                correct_option_id: "b".to_string(),
                explanation: String::new(),
            }],
            page: 2,
            created_at: None,
        };

        let text = format_quiz(&quiz);
        assert!(text.starts_with("Quiz for page 2"));
        assert!(text.contains("   b) Paris"));
        assert!(text.contains("Answer: Paris"));
    }

    #[test]
    fn test_format_conversation_row() {
        let conversation = Conversation {
            id: 4,
            title: "Reading".to_string(),
            messages: Vec::new(),
            documents: vec![DocumentRef {
                id: 1,
                filename: "paper.pdf".to_string(),
            }],
            created_at: String::new(),
            updated_at: String::new(),
        };
        assert_eq!(
            format_conversation_row(&conversation),
            "     4  Reading  [paper.pdf]"
        );
    }
}
