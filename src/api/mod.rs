// Document backend API client

pub mod session;

pub use session::{
    ChannelNotifier, CredentialProvider, FileCredentials, LogNotifier, Notification,
    NotificationSink, StaticCredentials,
};

use anyhow::Context;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::content::decode_fenced_json;
use crate::error::{ApiError, Result, StreamError};
use crate::models::{
    ChatMessage, ChatRequest, Conversation, CreateConversationRequest, FlowRequest, FlowSummary,
    Quiz, QuizRequest,
};
use crate::stream::{StreamControl, StreamingResponseReader};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

impl ErrorBody {
    fn into_detail(self) -> Option<String> {
        match self.detail? {
            serde_json::Value::String(detail) => Some(detail),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct DocClient {
    base_url: String,
    client: Client,
    credentials: Arc<dyn CredentialProvider>,
    notifier: Arc<dyn NotificationSink>,
}

impl fmt::Debug for DocClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DocClient {
    pub fn new(
        base_url: String,
        request_timeout: u64,
        credentials: Arc<dyn CredentialProvider>,
        notifier: Arc<dyn NotificationSink>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credentials,
            notifier,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match self.credentials.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        self.check_status(response).await
    }

    async fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(%status, "Request rejected, clearing credentials");
            self.credentials.clear();
            self.notifier.notify(Notification::AuthExpired);
            return Err(ApiError::Auth(status));
        }

        if !status.is_success() {
            let detail = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(ErrorBody::into_detail)
                .unwrap_or_else(|| "Request failed".to_string());
            return Err(ApiError::Status { status, detail });
        }

        Ok(response)
    }

    /// POST `body` to a streaming endpoint and read the response to completion.
    async fn stream_text<T, F>(
        &self,
        path: &str,
        body: &T,
        control: &StreamControl,
        on_delta: F,
    ) -> Result<String>
    where
        T: Serialize + Sync,
        F: FnMut(&str),
    {
        let request = self.client.post(self.url(path)).json(body);

        let response = tokio::select! {
            biased;
            () = control.cancelled() => return Err(StreamError::Cancelled.into()),
            response = self.send(request) => response?,
        };

        let text = StreamingResponseReader::new(control.clone())
            .read(response.bytes_stream(), on_delta)
            .await?;
        Ok(text)
    }

    /// Stream an assistant reply for `messages` in a conversation.
    pub async fn chat<F: FnMut(&str)>(
        &self,
        conversation_id: i64,
        messages: Vec<ChatMessage>,
        model: Option<String>,
        control: &StreamControl,
        on_delta: F,
    ) -> Result<String> {
        info!(conversation_id, stream_id = %control.id, "Starting chat stream");
        let request = ChatRequest {
            messages,
            stream: true,
            model,
        };
        self.stream_text(
            &format!("/conversations/{conversation_id}/chat"),
            &request,
            control,
            on_delta,
        )
        .await
    }

    /// Generate the reading-flow card for a document.
    pub async fn flow<F: FnMut(&str)>(
        &self,
        document_id: i64,
        control: &StreamControl,
        on_delta: F,
    ) -> Result<FlowSummary> {
        info!(document_id, stream_id = %control.id, "Generating flow");
        let text = self
            .stream_text(
                &format!("/conversations/documents/{document_id}/flow"),
                &FlowRequest { stream: true },
                control,
                on_delta,
            )
            .await?;
        Ok(decode_fenced_json(&text)?)
    }

    /// Generate a quiz for one page of a document.
    pub async fn quiz<F: FnMut(&str)>(
        &self,
        document_id: i64,
        page_number: u32,
        control: &StreamControl,
        on_delta: F,
    ) -> Result<Quiz> {
        info!(document_id, page_number, stream_id = %control.id, "Generating quiz");
        let text = self
            .stream_text(
                &format!("/conversations/documents/{document_id}/quiz"),
                &QuizRequest {
                    page_number,
                    stream: true,
                },
                control,
                on_delta,
            )
            .await?;

        let mut quiz: Quiz = decode_fenced_json(&text)?;
        quiz.page = page_number;
        quiz.created_at = Some(Utc::now());
        Ok(quiz)
    }

    pub async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let response = self.send(self.client.get(self.url("/conversations"))).await?;
        Ok(response.json().await?)
    }

    pub async fn get_conversation(&self, conversation_id: i64) -> Result<Conversation> {
        let response = self
            .send(
                self.client
                    .get(self.url(&format!("/conversations/{conversation_id}"))),
            )
            .await?;
        Ok(response.json().await?)
    }

    pub async fn create_conversation(
        &self,
        title: String,
        document_ids: Vec<i64>,
    ) -> Result<Conversation> {
        let request = CreateConversationRequest {
            title,
            document_ids,
        };
        let response = self
            .send(self.client.post(self.url("/conversations")).json(&request))
            .await?;
        Ok(response.json().await?)
    }

    pub async fn delete_conversation(&self, conversation_id: i64) -> Result<()> {
        self.send(
            self.client
                .delete(self.url(&format!("/conversations/{conversation_id}"))),
        )
        .await?;
        debug!(conversation_id, "Conversation deleted");
        Ok(())
    }
}
