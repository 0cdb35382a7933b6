// Credential and notification collaborators injected into the client

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

use crate::events::AppEvent;

/// Source of the bearer token attached to every request.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Option<String>;

    /// Forget the token after the server rejected it.
    fn clear(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The server answered 401/403; a new token is needed.
    AuthExpired,
}

/// Receiver for cross-cutting user-facing notices.
#[cfg_attr(test, mockall::automock)]
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredCredentials {
    #[serde(default)]
    token: Option<String>,
}

/// Token persisted in `credentials.toml` under the config directory.
#[derive(Debug)]
pub struct FileCredentials {
    path: PathBuf,
    token: Mutex<Option<String>>,
}

impl FileCredentials {
    pub fn load(path: PathBuf) -> Result<Self> {
        let token = if path.exists() {
            let contents = fs::read_to_string(&path).context("Failed to read credentials file")?;
            toml::from_str::<StoredCredentials>(&contents)
                .context("Failed to parse credentials file")?
                .token
        } else {
            None
        };

        Ok(Self {
            path,
            token: Mutex::new(token),
        })
    }

    pub fn store(&self, token: Option<String>) -> Result<()> {
        let contents = toml::to_string_pretty(&StoredCredentials {
            token: token.clone(),
        })
        .context("Failed to serialize credentials")?;
        fs::write(&self.path, contents).context("Failed to write credentials file")?;

        *self.lock() = token;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CredentialProvider for FileCredentials {
    fn token(&self) -> Option<String> {
        self.lock().clone()
    }

    fn clear(&self) {
        if let Err(err) = self.store(None) {
            warn!(error = %err, "Failed to clear stored token");
        }
    }
}

/// Token given on the command line or through the environment. Never persisted.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: Mutex<Option<String>>,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) {
        *self
            .token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = None;
    }
}

/// Notices go to the log; used by the one-shot commands.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl NotificationSink for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::AuthExpired => warn!("Session expired, stored token was cleared"),
        }
    }
}

/// Forwards notices into the chat view's event loop.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelNotifier {
    pub const fn new(tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        let _ = self.tx.send(AppEvent::Notice(notification));
    }
}
