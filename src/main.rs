mod api;
mod app;
mod cli;
mod commands;
mod config;
mod content;
mod error;
mod events;
mod models;
mod stream;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::Backend, prelude::*};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use api::{
    ChannelNotifier, CredentialProvider, DocClient, FileCredentials, LogNotifier, NotificationSink,
    StaticCredentials,
};
use app::App;
use cli::{Cli, Commands};
use events::AppEvent;
use models::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Always log to a file: the chat view owns the terminal
    let file_appender = tracing_appender::rolling::daily(config::get_log_dir()?, "docstream.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DOCSTREAM_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();

    let config = config::load_config()?;
    let stored = Arc::new(FileCredentials::load(config::get_credentials_path()?)?);

    let credentials: Arc<dyn CredentialProvider> = match cli.token.clone() {
        Some(token) => Arc::new(StaticCredentials::new(token)),
        None => stored.clone(),
    };
    let base_url = cli.base_url.clone().unwrap_or_else(|| config.base_url.clone());

    match cli.command {
        Commands::SetToken { token } => {
            stored.store(Some(token))?;
            println!("Token saved");
            Ok(())
        }
        Commands::Chat {
            conversation_id,
            model,
        } => {
            let model = model.or_else(|| Some(config.default_model.clone()));
            run_chat(&config, base_url, credentials, conversation_id, model).await
        }
        Commands::Flow { document_id } => {
            let client = one_shot_client(base_url, &config, credentials)?;
            commands::flow(&client, document_id, cli.json).await
        }
        Commands::Quiz { document_id, page } => {
            let client = one_shot_client(base_url, &config, credentials)?;
            commands::quiz(&client, document_id, page, cli.json).await
        }
        Commands::List => {
            let client = one_shot_client(base_url, &config, credentials)?;
            commands::list(&client, cli.json).await
        }
        Commands::New { title, documents } => {
            let client = one_shot_client(base_url, &config, credentials)?;
            commands::create(&client, title, documents, cli.json).await
        }
        Commands::Delete { conversation_id } => {
            let client = one_shot_client(base_url, &config, credentials)?;
            commands::delete(&client, conversation_id).await
        }
    }
}

// Outside the chat view notices only go to the log
fn one_shot_client(
    base_url: String,
    config: &AppConfig,
    credentials: Arc<dyn CredentialProvider>,
) -> Result<DocClient> {
    DocClient::new(
        base_url,
        config.request_timeout,
        credentials,
        Arc::new(LogNotifier),
    )
}

async fn run_chat(
    config: &AppConfig,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    conversation_id: i64,
    model: Option<String>,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();
    let notifier: Arc<dyn NotificationSink> = Arc::new(ChannelNotifier::new(tx.clone()));
    let client = DocClient::new(base_url, config.request_timeout, credentials, notifier)?;

    info!(conversation_id, base_url = client.base_url(), "Opening chat view");

    let mut app = App::new(conversation_id, model);
    app.show_thinking = config.show_thinking;

    match client.get_conversation(conversation_id).await {
        Ok(conversation) => {
            app.conversation_title = conversation.title;
            app.messages = conversation.messages.into_iter().map(Into::into).collect();
            app.scroll_to_bottom();
        }
        Err(err) => {
            warn!(conversation_id, error = %err, "Failed to load conversation history");
            // Auth failures arrive as a notice through the event channel
            if !err.is_auth() {
                app.status = Some(format!("Could not load history: {err}"));
            }
        }
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let res = run_app(&mut terminal, &mut app, &client, &tx, &mut rx);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.cancel_stream();
    info!(conversation_id, "Chat view closed");
    res.context("Chat view failed")
}

/// Spawn the read loop for the reply that `app` just opened.
fn send_message(app: &mut App, client: &DocClient, event_tx: &mpsc::UnboundedSender<AppEvent>) {
    let Some((history, control)) = app.begin_stream() else {
        return;
    };

    let client = client.clone();
    let conversation_id = app.conversation_id;
    let model = app.model.clone();
    let tx = event_tx.clone();

    tokio::spawn(async move {
        let stream_id = control.id;
        let result = client
            .chat(conversation_id, history, model, &control, |text| {
                let _ = tx.send(AppEvent::StreamDelta {
                    stream_id,
                    text: text.to_string(),
                });
            })
            .await;

        let event = match result {
            Ok(_) => AppEvent::StreamDone { stream_id },
            Err(err) => AppEvent::StreamFailed {
                stream_id,
                message: err.to_string(),
            },
        };
        let _ = tx.send(event);
    });
}

fn handle_key(
    app: &mut App,
    key: KeyCode,
    modifiers: KeyModifiers,
    client: &DocClient,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
) {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);

    if app.show_help {
        if key == KeyCode::Esc || (ctrl && key == KeyCode::Char('h')) {
            app.show_help = false;
        }
        return;
    }

    match key {
        KeyCode::Char('c') if ctrl => {
            if app.exit_pending {
                app.quit();
            } else {
                app.exit_pending = true;
            }
            return;
        }
        KeyCode::Esc if app.exit_pending => {
            app.exit_pending = false;
            return;
        }
        KeyCode::Esc if app.is_loading() => {
            app.cancel_stream();
            return;
        }
        _ if app.exit_pending => {
            // Any other key cancels pending exit
            app.exit_pending = false;
        }
        _ => {}
    }

    match key {
        KeyCode::Char('q') if ctrl => app.quit(),
        KeyCode::Char('h') if ctrl => app.toggle_help(),
        KeyCode::Tab => app.toggle_thinking(),

        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::PageDown => app.scroll_down(10),
        KeyCode::Home => app.scroll_to_top(),
        KeyCode::End => app.scroll_to_bottom(),

        KeyCode::Backspace => {
            app.input_buffer.pop();
        }
        KeyCode::Enter => send_message(app, client, event_tx),
        KeyCode::Char(c) if !ctrl => app.input_buffer.push(c),
        _ => {}
    }
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    client: &DocClient,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
    event_rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        while let Ok(app_event) = event_rx.try_recv() {
            app.handle_event(app_event);
        }

        // ~60fps for smooth streaming
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code, key.modifiers, client, event_tx);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
