//! Command-line surface.

pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

pub use commands::run;

/// Atlas assistant backend
#[derive(Parser, Debug)]
#[command(name = "atlas", version, about = "Atlas assistant backend CLI")]
pub struct Cli {
    /// Config file (defaults to ~/.atlas/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Act as this user; conversations are scoped to it
    #[arg(long, global = true)]
    pub user: Option<Uuid>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a message and print the response stream as NDJSON
    Chat(ChatArgs),
    /// Manage conversations
    #[command(subcommand)]
    Conversations(ConversationCommands),
}

/// Arguments for the `chat` subcommand.
#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Continue this conversation instead of starting a new one
    #[arg(long)]
    pub checkpoint: Option<String>,

    /// Display name added to the assistant's user profile
    #[arg(long)]
    pub name: Option<String>,

    /// Email added to the assistant's user profile
    #[arg(long)]
    pub email: Option<String>,

    /// The message to send
    pub message: String,
}

#[derive(Subcommand, Debug)]
pub enum ConversationCommands {
    /// List conversations, most recent first
    List,
    /// Create an empty conversation
    Create {
        #[arg(long)]
        title: Option<String>,
    },
    /// Show a conversation with its history
    Show { id: Uuid },
    /// Delete a conversation and its stored state
    Delete { id: Uuid },
}
