//! CLI command definitions and dispatch for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod auth;
pub mod chat;
pub mod history;
pub mod key;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Chat with an AI assistant from your terminal.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Write log lines to stderr as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat.
    Chat {
        /// Keep the transcript in the local store instead of a saved conversation.
        #[arg(long, conflicts_with = "conversation")]
        local: bool,

        /// Resume a saved conversation by id.
        #[arg(short, long)]
        conversation: Option<String>,

        /// Sign in with this email before chatting.
        #[arg(long)]
        email: Option<String>,
    },

    /// List your saved conversations, newest first.
    #[command(alias = "ls")]
    History,

    /// Delete a saved conversation and its messages.
    #[command(alias = "rm")]
    Delete {
        /// Conversation id (as shown by `parley history`).
        id: String,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        force: bool,
    },

    /// Create an account and sign in.
    Signup {
        /// Account email. Prompted for when omitted.
        #[arg(long)]
        email: Option<String>,
    },

    /// Sign in to an existing account.
    Login {
        /// Account email. Prompted for when omitted.
        #[arg(long)]
        email: Option<String>,
    },

    /// Sign out.
    Logout,

    /// Manage the API key stored in the OS keychain.
    Key {
        #[command(subcommand)]
        action: KeyCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum KeyCommand {
    /// Validate and save an API key. Prompted for (hidden) when omitted.
    Set {
        /// The key (`sk-...`). Prefer the prompt; flags end up in shell history.
        #[arg(long)]
        key: Option<String>,
    },

    /// Show which source supplies the API key.
    Status,

    /// Remove the stored API key.
    Delete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_chat_flags() {
        let cli = Cli::parse_from(["parley", "chat", "--conversation", "abc", "--email", "a@b.co"]);
        match cli.command {
            Commands::Chat {
                local,
                conversation,
                email,
            } => {
                assert!(!local);
                assert_eq!(conversation.as_deref(), Some("abc"));
                assert_eq!(email.as_deref(), Some("a@b.co"));
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_local_conflicts_with_conversation() {
        let result = Cli::try_parse_from(["parley", "chat", "--local", "--conversation", "abc"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_key_commands() {
        let cli = Cli::parse_from(["parley", "key", "set", "--key", "sk-abc"]);
        match cli.command {
            Commands::Key {
                action: KeyCommand::Set { key },
            } => assert_eq!(key.as_deref(), Some("sk-abc")),
            _ => panic!("expected key set"),
        }

        let cli = Cli::parse_from(["parley", "key", "set"]);
        assert!(matches!(
            cli.command,
            Commands::Key {
                action: KeyCommand::Set { key: None }
            }
        ));

        let cli = Cli::parse_from(["parley", "key", "status", "--json"]);
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Key {
                action: KeyCommand::Status
            }
        ));

        assert!(Cli::try_parse_from(["parley", "key"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["parley", "history", "--json", "-vv"]);
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::History));
    }
}
