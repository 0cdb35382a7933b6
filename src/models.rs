use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    /// Partial reply from a cancelled or failed stream, shown but never sent
    #[serde(skip)]
    pub interrupted: bool,
}

impl ChatMessage {
    pub const fn new(role: MessageRole, content: String) -> Self {
        Self {
            role,
            content,
            interrupted: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into())
    }

    pub fn interrupted(content: impl Into<String>) -> Self {
        Self {
            interrupted: true,
            ..Self::assistant(content)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FlowRequest {
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuizRequest {
    pub page_number: u32,
    pub stream: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateConversationRequest {
    pub title: String,
    pub document_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: i64,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl From<StoredMessage> for ChatMessage {
    fn from(message: StoredMessage) -> Self {
        Self::new(message.role, message.content)
    }
}

/// Server-side conversation. Timestamps are kept as the server formats them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeywordKind {
    Disruptive,
    Innovative,
    Potential,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Keyword {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: KeywordKind,
}

/// Reading-flow card generated for a whole document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FlowSummary {
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub core_contributions: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub application: String,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuizOption {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestion {
    pub id: String,
    pub text: String,
    pub options: Vec<QuizOption>,
    pub correct_option_id: String,
    #[serde(default)]
    pub explanation: String,
}

impl QuizQuestion {
    pub fn correct_option(&self) -> Option<&QuizOption> {
        self.options
            .iter()
            .find(|option| option.id == self.correct_option_id)
    }
}

/// Quiz for one page. `page` and `created_at` are stamped by the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub base_url: String,
    pub default_model: String,
    #[serde(default = "default_timeout")]
    pub request_timeout: u64,
    #[serde(default)]
    pub show_thinking: bool,
}

const fn default_timeout() -> u64 {
    600
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            default_model: "standard".to_string(),
            request_timeout: default_timeout(),
            show_thinking: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            messages: vec![ChatMessage::user("Hello")],
            stream: true,
            model: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messages": [{"role": "user", "content": "Hello"}],
                "stream": true
            })
        );
    }

    #[test]
    fn test_flow_summary_uses_camel_case() {
        let json = r#"{
            "title": "Attention",
            "authors": ["A", "B"],
            "coreContributions": ["transformer"],
            "questions": ["scaling?"],
            "application": "NLP",
            "keywords": [{"text": "attention", "type": "disruptive"}, {"text": "x", "type": "weird"}]
        }"#;
        let flow: FlowSummary = serde_json::from_str(json).unwrap();
        assert_eq!(flow.core_contributions, vec!["transformer"]);
        assert_eq!(flow.keywords[0].kind, KeywordKind::Disruptive);
        assert_eq!(flow.keywords[1].kind, KeywordKind::Other);
    }

    #[test]
    fn test_quiz_correct_option() {
        let json = r#"{"questions": [{
            "id": "q1",
            "text": "2 + 2?",
            "options": [{"id": "a", "text": "3"}, {"id": "b", "text": "4"}],
            "correctOptionId": "b",
            "explanation": "arithmetic"
        }]}"#;
        let quiz: Quiz = serde_json::from_str(json).unwrap();
        assert_eq!(quiz.page, 0);
        assert!(quiz.created_at.is_none());
        assert_eq!(quiz.questions[0].correct_option().unwrap().text, "4");
    }

    #[test]
    fn test_conversation_tolerates_missing_fields() {
        let json = r#"{"id": 3, "title": "Paper", "messages": [{"role": "assistant", "content": "hi"}]}"#;
        let conversation: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert!(conversation.documents.is_empty());
        let message: ChatMessage = conversation.messages[0].clone().into();
        assert_eq!(message, ChatMessage::assistant("hi"));
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000/api");
        assert_eq!(config.request_timeout, 600);
        assert!(!config.show_thinking);
    }
}
