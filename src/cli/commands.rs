//! Command handlers.

use std::io::Write;

use futures::StreamExt;
use serde::Serialize;

use super::{ChatArgs, Cli, Commands, ConversationCommands};
use crate::agent::UserProfile;
use crate::config::AtlasConfig;
use crate::error::{AtlasError, Result};
use crate::service::{AppContext, Caller};
use crate::types::{ChatRequest, WireEvent};

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => AtlasConfig::load_from(path)?,
        None => AtlasConfig::load()?,
    };
    let ctx = AppContext::open(config)?;
    let caller = Caller {
        user_id: cli.user,
        profile: None,
    };

    let result = match cli.command {
        Commands::Chat(args) => handle_chat(&ctx, caller, args).await,
        Commands::Conversations(command) => handle_conversations(&ctx, &caller, command).await,
    };
    ctx.shutdown().await;
    result
}

async fn handle_chat(ctx: &AppContext, mut caller: Caller, args: ChatArgs) -> Result<()> {
    if args.name.is_some() || args.email.is_some() {
        caller.profile = Some(UserProfile {
            name: args.name,
            username: None,
            email: args.email,
        });
    }
    let mut request = ChatRequest::new(args.message);
    request.checkpoint_id = args.checkpoint;

    let mut frames = ctx.chat().stream_responses(&caller, request);
    let mut failure = None;
    let mut stdout = std::io::stdout();
    while let Some(frame) = frames.next().await {
        stdout.write_all(frame.to_ndjson()?.as_bytes())?;
        stdout.flush()?;
        if let WireEvent::Error { message } = frame.event {
            failure = Some(message);
        }
    }

    match failure {
        Some(message) => Err(AtlasError::Stream(message)),
        None => Ok(()),
    }
}

async fn handle_conversations(
    ctx: &AppContext,
    caller: &Caller,
    command: ConversationCommands,
) -> Result<()> {
    let service = ctx.conversations();
    match command {
        ConversationCommands::List => print_json(&service.list(caller).await?),
        ConversationCommands::Create { title } => {
            print_json(&service.create(caller, title.as_deref()).await?)
        }
        ConversationCommands::Show { id } => print_json(&service.get(caller, id).await?),
        ConversationCommands::Delete { id } => {
            service.delete(caller, id).await?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
