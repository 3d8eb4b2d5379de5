//! Conversation history commands: list and delete.
//!
//! Lists the signed-in user's saved conversations in a table (newest first)
//! and deletes a conversation after a confirmation prompt.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use uuid::Uuid;

use parley_types::chat::Conversation;
use parley_types::error::ChatError;

use crate::state::AppState;

/// List the signed-in user's conversations.
///
/// # Examples
///
/// ```bash
/// parley history
/// parley history --json
/// ```
pub async fn list_history(state: &AppState, json: bool) -> Result<()> {
    let user = state.require_user().await?;
    let conversations = state
        .conversation_service
        .list_conversations(&user)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!();
        println!(
            "  {} No conversations yet. Start one with: {}",
            style("i").blue().bold(),
            style("parley chat").yellow()
        );
        println!();
        return Ok(());
    }

    println!();
    println!("  Conversations for {}", style(&user.email).cyan().bold());
    println!();
    println!("{}", history_table(&conversations));
    println!();
    println!(
        "  {} conversation{}",
        style(conversations.len()).bold(),
        if conversations.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// Delete a conversation with confirmation.
///
/// # Examples
///
/// ```bash
/// parley delete <conversation-id>
/// parley delete <conversation-id> --force
/// ```
pub async fn delete_conversation(state: &AppState, id: &str, force: bool, json: bool) -> Result<()> {
    let user = state.require_user().await?;
    let chat_id = parse_conversation_id(id)?;
    let conversation = state
        .conversation_service
        .open_conversation(&user, &chat_id)
        .await
        .map_err(not_found_context(id))?;

    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete conversation '{}'?",
                style(conversation.display_title()).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state
        .conversation_service
        .delete_conversation(&user, &chat_id)
        .await?;

    if json {
        println!(
            "{}",
            serde_json::json!({"deleted": true, "conversation_id": chat_id.to_string()})
        );
    } else {
        println!(
            "  {} Conversation '{}' deleted.",
            style("x").red().bold(),
            conversation.display_title()
        );
    }

    Ok(())
}

/// Parse a conversation id argument.
pub fn parse_conversation_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).with_context(|| format!("'{id}' is not a valid conversation id"))
}

/// Turn `ChatError::NotFound` into an error naming the id the user typed.
pub fn not_found_context(id: &str) -> impl FnOnce(ChatError) -> anyhow::Error + '_ {
    move |e| match e {
        ChatError::NotFound => anyhow::anyhow!("Conversation '{id}' not found"),
        other => other.into(),
    }
}

/// Timestamp shown in the history list, in local time.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn history_table(conversations: &[Conversation]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Title").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
        Cell::new("Id").fg(Color::White),
    ]);

    for conversation in conversations {
        table.add_row(vec![
            Cell::new(conversation.display_title()).fg(Color::Cyan),
            Cell::new(format_timestamp(&conversation.updated_at)).fg(Color::White),
            Cell::new(conversation.id.to_string()).fg(Color::DarkGrey),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_conversation_id() {
        let id = Uuid::now_v7();
        assert_eq!(parse_conversation_id(&format!(" {id} ")).unwrap(), id);
        let err = parse_conversation_id("nope").unwrap_err();
        assert_eq!(err.to_string(), "'nope' is not a valid conversation id");
    }

    #[test]
    fn test_format_timestamp_shape() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        let formatted = format_timestamp(&at);
        // Local offset varies; the shape does not.
        assert_eq!(formatted.len(), "2024-03-09 14:05".len());
        assert_eq!(&formatted[4..5], "-");
        assert_eq!(&formatted[13..14], ":");
    }

    #[test]
    fn test_not_found_names_the_id() {
        let err = not_found_context("abc")(ChatError::NotFound);
        assert_eq!(err.to_string(), "Conversation 'abc' not found");

        let err = not_found_context("abc")(ChatError::Unauthenticated);
        assert_eq!(err.to_string(), ChatError::Unauthenticated.to_string());
    }

    #[test]
    fn test_history_table_lists_untitled_conversations() {
        let conversation = Conversation::new(Uuid::now_v7());
        let rendered = history_table(std::slice::from_ref(&conversation)).to_string();
        assert!(rendered.contains(conversation.display_title()));
        assert!(rendered.contains(&conversation.id.to_string()));
    }
}
