//! Main chat loop orchestration.
//!
//! Resolves who is signed in and where the transcript lives (the local store
//! or a saved conversation), then runs the input loop against a
//! `SessionManager`: slash commands, a thinking spinner while the completion
//! is outstanding, and rendering of replies and errors.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use parley_core::chat::service::ConversationFeed;
use parley_core::chat::session::{SendOutcome, SessionManager};
use parley_core::llm::client::CompletionClient;
use parley_core::storage::transcript::{KvTranscriptStore, LOCAL_SCOPE, TranscriptStore};
use parley_types::chat::Conversation;
use parley_types::identity::Identity;

use crate::cli::auth;
use crate::cli::history::{not_found_context, parse_conversation_id};
use crate::state::AppState;

use super::banner::{print_welcome_banner, short_id};
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::ChatRenderer;

/// Options for `parley chat`.
pub struct ChatOptions {
    /// Use the local key-value transcript instead of a saved conversation.
    pub local: bool,
    /// Resume this conversation id.
    pub conversation: Option<String>,
    /// Sign in with this email first.
    pub email: Option<String>,
}

/// How a session loop ended.
#[derive(Debug, PartialEq, Eq)]
enum LoopExit {
    Quit,
    NewConversation,
}

/// Run an interactive chat.
pub async fn run_chat(state: &AppState, options: ChatOptions) -> Result<()> {
    // Prompt for credentials before the readline takes over the terminal.
    if options.email.is_some() {
        auth::login(state, options.email.clone()).await?;
    }

    let binding = state.identity_binding().await;
    let user = binding.current_user();
    let model = state.config.completion.model.clone();

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut input, _writer) =
        ChatInput::new(prompt).map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;
    let renderer = ChatRenderer::new();
    let email = user.as_ref().map(|u| u.email.as_str());

    if options.local {
        let store = KvTranscriptStore::new(
            state.kv_store.clone(),
            local_scope(user.as_ref()),
            state.config.chat.storage_key.clone(),
        );
        let manager = SessionManager::new(state.completion_client()?, store, &state.config.chat)
            .with_identity(user.clone());

        print_welcome_banner(&model, "local", email);
        run_session(&manager, &mut input, &renderer, false).await?;
    } else {
        let user = binding
            .require_user()
            .map_err(|e| anyhow::anyhow!("{e}. Sign in with --email, or use --local."))?;
        let service = &state.conversation_service;

        let mut conversation = match options.conversation.as_deref() {
            Some(id) => service
                .open_conversation(&user, &parse_conversation_id(id)?)
                .await
                .map_err(not_found_context(id))?,
            None => service.create_conversation(&user).await?,
        };

        loop {
            let exit = run_conversation(state, &conversation, &user, &mut input, &renderer).await?;
            if exit == LoopExit::Quit {
                break;
            }
            conversation = service.create_conversation(&user).await?;
            println!(
                "\n  {} Started a new conversation.\n",
                style("*").cyan().bold()
            );
        }
    }

    input.flush();
    Ok(())
}

/// Scope for the local transcript: the signed-in user, or the shared local scope.
fn local_scope(user: Option<&Identity>) -> String {
    user.map(|u| u.id.to_string())
        .unwrap_or_else(|| LOCAL_SCOPE.to_string())
}

async fn run_conversation(
    state: &AppState,
    conversation: &Conversation,
    user: &Identity,
    input: &mut ChatInput,
    renderer: &ChatRenderer,
) -> Result<LoopExit> {
    let store = state.conversation_service.transcript_store(conversation);
    let manager = SessionManager::new(state.completion_client()?, store, &state.config.chat)
        .with_identity(Some(user.clone()));

    let label = format!(
        "conversation {} ({})",
        short_id(&conversation.id.to_string()),
        conversation.display_title()
    );
    print_welcome_banner(&state.config.completion.model, &label, Some(&user.email));

    let feed = spawn_feed_logger(state.conversation_service.watch(conversation.id));
    let exit = run_session(&manager, input, renderer, true).await;
    feed.cancel();
    exit
}

/// Log every message row persisted to the watched conversation.
fn spawn_feed_logger(mut feed: ConversationFeed) -> CancellationToken {
    let cancellation = CancellationToken::new();
    let token = cancellation.clone();
    let chat_id = feed.chat_id();

    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = token.cancelled() => break,
                message = feed.next() => message,
            };
            match message {
                Some(message) => debug!(
                    %chat_id,
                    message_id = %message.id,
                    role = ?message.role,
                    "Message persisted"
                ),
                None => break,
            }
        }
    });

    cancellation
}

async fn run_session<C, S>(
    manager: &SessionManager<C, S>,
    input: &mut ChatInput,
    renderer: &ChatRenderer,
    can_start_new: bool,
) -> Result<LoopExit>
where
    C: CompletionClient,
    S: TranscriptStore,
{
    manager.hydrate().await;
    let restored = manager.state().transcript;
    if !restored.is_empty() {
        info!(messages = restored.len(), "Restored transcript");
        renderer.print_transcript(&restored);
    }

    // Surface a missing API key before the first message.
    if let Err(e) = manager.client().check_ready() {
        renderer.print_error(&e.to_string());
    }

    loop {
        let text = match input.read_line().await {
            InputEvent::Eof => {
                println!("\n  {}", style("Session ended.").dim());
                return Ok(LoopExit::Quit);
            }
            InputEvent::Interrupted => {
                println!("\n  {}", style("Press Ctrl+D to exit, or keep chatting.").dim());
                continue;
            }
            InputEvent::Message(text) if text.is_empty() => continue,
            InputEvent::Message(text) => text,
        };

        let Some(command) = commands::parse(&text) else {
            let outcome = with_spinner(manager.send(&text)).await;
            report(manager, renderer, outcome);
            continue;
        };

        match command {
            ChatCommand::Help => commands::print_help(),
            ChatCommand::Retry => match with_spinner(manager.retry()).await {
                Some(outcome) => report(manager, renderer, outcome),
                None => println!("\n  {}\n", style("Nothing to retry.").dim()),
            },
            ChatCommand::Clear => {
                manager.clear().await;
                input.clear();
                println!("  {}\n", style("Conversation cleared.").dim());
            }
            ChatCommand::New if can_start_new => return Ok(LoopExit::NewConversation),
            ChatCommand::New => {
                manager.clear().await;
                println!("\n  {} Started a new chat.\n", style("*").cyan().bold());
            }
            ChatCommand::History => renderer.print_transcript(&manager.state().transcript),
            ChatCommand::Exit => {
                println!("\n  {}", style("Session ended.").dim());
                return Ok(LoopExit::Quit);
            }
            ChatCommand::Unknown(name) => println!(
                "\n  {} Unknown command: {}. Type /help for available commands.\n",
                style("?").yellow().bold(),
                style(name).dim()
            ),
        }
    }
}

/// Show what a send produced.
fn report<C, S>(manager: &SessionManager<C, S>, renderer: &ChatRenderer, outcome: SendOutcome)
where
    C: CompletionClient,
    S: TranscriptStore,
{
    match outcome {
        SendOutcome::Replied(message) => renderer.print_reply(&message.content),
        SendOutcome::Failed | SendOutcome::Rejected => {
            if let Some(error) = manager.state().error {
                renderer.print_error(&error);
            }
        }
        SendOutcome::Discarded => debug!("Reply arrived after the session moved on"),
    }
}

/// Await `fut` behind a "thinking..." spinner.
async fn with_spinner<F: Future>(fut: F) -> F::Output {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));

    let output = fut.await;
    spinner.finish_and_clear();
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_local_scope_is_per_user() {
        assert_eq!(local_scope(None), "local");

        let user = Identity {
            id: Uuid::now_v7(),
            email: "ada@example.com".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(local_scope(Some(&user)), user.id.to_string());
    }

    #[tokio::test]
    async fn test_with_spinner_returns_output() {
        assert_eq!(with_spinner(async { 42 }).await, 42);
    }
}
